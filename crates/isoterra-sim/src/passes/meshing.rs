//! Marching-cubes extraction of one chunk into the shared geometry store.

use std::sync::Arc;

use glam::IVec3;
use isoterra_core::constants::ISO_LEVEL;
use isoterra_core::math::{chunk_index, chunk_local_to_world};
use isoterra_core::types::{ChunkCoord, Vertex};
use isoterra_tables::McTables;

use crate::buffers::{DrawEntry, TerrainStores};
use crate::device::Device;
use crate::error::{DeviceError, MeshError};

/// Configuration index of the cell whose minimum corner is `cell`: bit i is
/// set when corner i is inside. `None` when the cell leaves the grid.
pub fn cell_configuration(stores: &TerrainStores, cell: IVec3) -> Option<u8> {
    if !stores.layout.contains_voxel(cell + IVec3::ONE) {
        return None;
    }
    let mut configuration = 0u8;
    for corner in 0..8 {
        if stores.field.sample(cell + McTables::corner_offset(corner)) < ISO_LEVEL {
            configuration |= 1 << corner;
        }
    }
    Some(configuration)
}

/// Surface crossing on `edge` of the cell at `cell`, in grid voxel units.
fn edge_vertex(stores: &TerrainStores, cell: IVec3, edge: usize) -> Vertex {
    let [a, b] = McTables::edge_corners(edge);
    let pa = cell + McTables::corner_offset(a);
    let pb = cell + McTables::corner_offset(b);
    let va = stores.field.sample(pa);
    let vb = stores.field.sample(pb);

    let t = if (vb - va).abs() <= f32::EPSILON {
        0.5
    } else {
        ((ISO_LEVEL - va) / (vb - va)).clamp(0.0, 1.0)
    };
    let p = pa.as_vec3().lerp(pb.as_vec3(), t);
    [p.x, p.y, p.z, 1.0]
}

/// Mesh one chunk: count its vertices, take one contiguous page run, write
/// the triangles and record the draw entry. The chunk's previous run is
/// released only after the new entry is in place.
pub fn mesh_chunk(
    stores: &TerrainStores,
    tables: &McTables,
    chunk: ChunkCoord,
) -> Result<DrawEntry, MeshError> {
    let layout = stores.layout;
    let voxels = layout.voxels;

    let mut cells = Vec::with_capacity(layout.voxels_per_chunk() as usize);
    let mut total = 0u32;
    for z in 0..voxels.z {
        for y in 0..voxels.y {
            for x in 0..voxels.x {
                let cell = chunk_local_to_world(&layout, chunk, IVec3::new(x, y, z));
                match cell_configuration(stores, cell) {
                    Some(0) | Some(255) | None => {}
                    Some(configuration) => {
                        let count = tables.vertex_count(configuration);
                        if count > 0 {
                            total += count;
                            cells.push((cell, configuration));
                        }
                    }
                }
            }
        }
    }

    let mut entry = DrawEntry::default();
    if total > 0 {
        let page_size = stores.geometry.page_size();
        let page_count = total.div_ceil(page_size);
        let first_page = stores
            .allocator
            .acquire_pages(page_count)
            .map_err(|source| MeshError::Allocation { chunk, source })?;

        let vertex_offset = first_page * page_size;
        let mut cursor = vertex_offset;
        for &(cell, configuration) in &cells {
            for edge in tables.edges(configuration) {
                stores
                    .geometry
                    .write_vertex(cursor, edge_vertex(stores, cell, edge))
                    .map_err(|source| MeshError::Allocation { chunk, source })?;
                cursor += 1;
            }
        }

        entry = DrawEntry {
            vertex_offset,
            vertex_count: total,
            first_page,
            page_count,
        };
    }

    let index = chunk_index(&layout, chunk);
    let previous = stores.draw_table.get(index);
    stores.draw_table.set(index, entry);
    if previous.page_count > 0 {
        stores
            .allocator
            .release_pages(previous.first_page, previous.page_count)
            .map_err(|source| MeshError::Release { chunk, source })?;
    }
    Ok(entry)
}

/// Mesh `chunks` in one dispatch, one invocation per chunk. Returns the
/// chunks that failed.
pub fn mesh_chunks(
    device: &Device,
    stores: &Arc<TerrainStores>,
    tables: &Arc<McTables>,
    chunks: &[ChunkCoord],
) -> Result<Vec<MeshError>, DeviceError> {
    let stores = Arc::clone(stores);
    let tables = Arc::clone(tables);
    let chunks = chunks.to_vec();
    device.dispatch("meshing", chunks.len(), move |invocation| {
        mesh_chunk(&stores, &tables, chunks[invocation]).map(|_| ())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use isoterra_core::config::PipelineConfig;
    use isoterra_core::math::world_field_index;

    fn stores_with(chunks: u32, voxels: u32, max_pages: u32) -> TerrainStores {
        TerrainStores::new(&PipelineConfig {
            chunks_per_axis: [chunks; 3],
            voxels_per_axis: [voxels; 3],
            max_pages,
            ..Default::default()
        })
    }

    fn fill(stores: &TerrainStores, f: impl Fn(IVec3) -> f32) {
        let dims = stores.layout.grid_voxels();
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let w = IVec3::new(x, y, z);
                    stores.field.write(world_field_index(&stores.layout, w), f(w));
                }
            }
        }
    }

    #[test]
    fn test_uniform_field_never_touches_allocator() {
        let stores = stores_with(2, 4, 8);
        let tables = McTables::builtin();
        for value in [1.0, -1.0] {
            fill(&stores, |_| value);
            let entry = mesh_chunk(&stores, &tables, IVec3::ZERO).expect("mesh");
            assert_eq!(entry, DrawEntry::default());
            assert_eq!(stores.allocator.free_count(), 8);
        }
    }

    #[test]
    fn test_single_inside_corner_is_one_triangle() {
        let stores = stores_with(2, 4, 8);
        let tables = McTables::builtin();
        fill(&stores, |w| if w == IVec3::ZERO { -1.0 } else { 1.0 });

        assert_eq!(cell_configuration(&stores, IVec3::ZERO), Some(1));
        let entry = mesh_chunk(&stores, &tables, IVec3::ZERO).expect("mesh");
        assert_eq!(entry.vertex_count, tables.vertex_count(1));
        assert_eq!(entry.vertex_count, 3);
        assert_eq!(entry.page_count, 1);

        // Edges 0, 8, 3 cross halfway between -1 and +1.
        let verts = stores
            .geometry
            .read_range(entry.vertex_offset, entry.vertex_count)
            .expect("in range");
        assert_eq!(verts[0], [0.5, 0.0, 0.0, 1.0]);
        assert_eq!(verts[1], [0.0, 0.0, 0.5, 1.0]);
        assert_eq!(verts[2], [0.0, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_interpolation_follows_sample_values() {
        let stores = stores_with(1, 4, 4);
        let tables = McTables::builtin();
        // Crossing at x = 0.25 along edge 0.
        fill(&stores, |w| if w == IVec3::ZERO { -1.0 } else { 3.0 });
        let entry = mesh_chunk(&stores, &tables, IVec3::ZERO).expect("mesh");
        let v = stores.geometry.read_vertex(entry.vertex_offset).expect("in range");
        assert_eq!(v, [0.25, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_cells_leaving_grid_are_skipped() {
        let stores = stores_with(1, 4, 4);
        // Only the last voxel inside: every cell touching it needs x = 4.
        fill(&stores, |w| if w == IVec3::splat(3) { -1.0 } else { 1.0 });
        assert_eq!(cell_configuration(&stores, IVec3::splat(3)), None);
        assert_eq!(cell_configuration(&stores, IVec3::splat(2)), Some(1 << 6));
        let entry = mesh_chunk(&stores, &McTables::builtin(), IVec3::ZERO).expect("mesh");
        assert_eq!(entry.vertex_count, 3);
    }

    #[test]
    fn test_chunk_reads_neighbour_samples() {
        let stores = stores_with(2, 4, 8);
        let tables = McTables::builtin();
        // Inside voxel sits in chunk (1, 0, 0); cell (3, 0, 0) of chunk 0 sees it.
        fill(&stores, |w| if w == IVec3::new(4, 0, 0) { -1.0 } else { 1.0 });
        let entry = mesh_chunk(&stores, &tables, IVec3::ZERO).expect("mesh");
        assert_eq!(entry.vertex_count, 3);
        let neighbour = mesh_chunk(&stores, &tables, IVec3::new(1, 0, 0)).expect("mesh");
        assert_eq!(neighbour.vertex_count, 3);
        assert_ne!(entry.first_page, neighbour.first_page);
    }

    #[test]
    fn test_vertex_count_matches_table_sum() {
        let stores = stores_with(1, 6, 4);
        let tables = McTables::builtin();
        let center = Vec3::splat(2.5);
        fill(&stores, |w| w.as_vec3().distance(center) - 2.0);

        let mut expected = 0;
        for z in 0..6 {
            for y in 0..6 {
                for x in 0..6 {
                    if let Some(c) = cell_configuration(&stores, IVec3::new(x, y, z)) {
                        expected += tables.vertex_count(c);
                    }
                }
            }
        }
        let entry = mesh_chunk(&stores, &tables, IVec3::ZERO).expect("mesh");
        assert!(expected > 0);
        assert_eq!(entry.vertex_count, expected);
        assert_eq!(entry.vertex_count % 3, 0);
    }

    #[test]
    fn test_allocation_failure_names_chunk() {
        let stores = stores_with(2, 4, 1);
        let tables = McTables::builtin();
        fill(&stores, |w| if w.x % 4 == 0 { -1.0 } else { 1.0 });
        mesh_chunk(&stores, &tables, IVec3::ZERO).expect("first chunk fits");
        let err = mesh_chunk(&stores, &tables, IVec3::new(0, 1, 0)).unwrap_err();
        assert!(matches!(
            err,
            MeshError::Allocation { chunk, .. } if chunk == IVec3::new(0, 1, 0)
        ));
    }

    #[test]
    fn test_remesh_releases_previous_run_after_write() {
        let stores = stores_with(1, 4, 4);
        let tables = McTables::builtin();
        fill(&stores, |w| if w == IVec3::ZERO { -1.0 } else { 1.0 });
        let first = mesh_chunk(&stores, &tables, IVec3::ZERO).expect("mesh");
        assert_eq!(stores.allocator.free_count(), 3);

        let second = mesh_chunk(&stores, &tables, IVec3::ZERO).expect("remesh");
        // The new run was taken while the old one was still owned.
        assert_ne!(second.first_page, first.first_page);
        assert_eq!(stores.allocator.free_count(), 3);

        fill(&stores, |_| 1.0);
        let empty = mesh_chunk(&stores, &tables, IVec3::ZERO).expect("remesh");
        assert_eq!(empty, DrawEntry::default());
        assert_eq!(stores.allocator.free_count(), 4);
    }
}
