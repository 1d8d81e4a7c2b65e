use crate::types::{ChunkCoord, GridLayout, VoxelCoord};
use glam::IVec3;

/// Flatten `pos` inside a box of `dims` (x fastest, then y, then z).
#[inline]
pub fn flatten_dims(pos: IVec3, dims: IVec3) -> u32 {
    (pos.x + pos.y * dims.x + pos.z * dims.x * dims.y) as u32
}

/// Flatten `pos` inside a cube with `dimension` samples per axis.
#[inline]
pub fn flatten(pos: IVec3, dimension: i32) -> u32 {
    flatten_dims(pos, IVec3::splat(dimension))
}

/// Index of a chunk-local voxel within its chunk.
#[inline]
pub fn voxel_index(layout: &GridLayout, local: VoxelCoord) -> u32 {
    flatten_dims(local, layout.voxels)
}

/// Index of a chunk within the grid (chunk draw table order).
#[inline]
pub fn chunk_index(layout: &GridLayout, chunk: ChunkCoord) -> u32 {
    flatten_dims(chunk, layout.chunks)
}

/// Scalar field store index of a voxel: every chunk owns one contiguous
/// block of `voxels_per_chunk` samples, blocks ordered by `chunk_index`.
#[inline]
pub fn field_index(layout: &GridLayout, local: VoxelCoord, chunk: ChunkCoord) -> u32 {
    voxel_index(layout, local) + chunk_index(layout, chunk) * layout.voxels_per_chunk()
}

/// Convert a grid-global voxel coordinate to its containing chunk coordinate.
pub fn world_to_chunk(layout: &GridLayout, world: VoxelCoord) -> ChunkCoord {
    let vs = layout.voxels;
    IVec3::new(
        world.x.div_euclid(vs.x),
        world.y.div_euclid(vs.y),
        world.z.div_euclid(vs.z),
    )
}

/// Convert a grid-global voxel coordinate to its local offset within a chunk.
pub fn world_to_local(layout: &GridLayout, world: VoxelCoord) -> VoxelCoord {
    let vs = layout.voxels;
    IVec3::new(
        world.x.rem_euclid(vs.x),
        world.y.rem_euclid(vs.y),
        world.z.rem_euclid(vs.z),
    )
}

/// Convert a chunk coordinate and local offset back to grid-global voxels.
pub fn chunk_local_to_world(
    layout: &GridLayout,
    chunk: ChunkCoord,
    local: VoxelCoord,
) -> VoxelCoord {
    chunk * layout.voxels + local
}

/// Scalar field store index of a grid-global voxel.
pub fn world_field_index(layout: &GridLayout, world: VoxelCoord) -> u32 {
    field_index(
        layout,
        world_to_local(layout, world),
        world_to_chunk(layout, world),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_index_matches_reference_layout() {
        // x + y*VX + z*VX*VY + cx*V + cy*V*CX + cz*V*CX*CY with V = VX*VY*VZ.
        let layout = GridLayout::default();
        let local = IVec3::new(3, 5, 7);
        let chunk = IVec3::new(1, 2, 4);
        let v = 512;
        let expected = 3 + 5 * 8 + 7 * 64 + v + 2 * v * 8 + 4 * v * 64;
        assert_eq!(field_index(&layout, local, chunk), expected);
    }

    #[test]
    fn test_field_index_covers_store_without_gaps() {
        let layout = GridLayout::new(IVec3::new(2, 3, 1), IVec3::new(4, 2, 3));
        let mut seen = vec![false; layout.total_voxels() as usize];
        for chunk in layout.chunks_in_order() {
            for z in 0..3 {
                for y in 0..2 {
                    for x in 0..4 {
                        let idx = field_index(&layout, IVec3::new(x, y, z), chunk) as usize;
                        assert!(!seen[idx], "index {idx} produced twice");
                        seen[idx] = true;
                    }
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_chunk_index_follows_progress_order() {
        let layout = GridLayout::new(IVec3::new(3, 4, 5), IVec3::splat(8));
        for (expected, chunk) in layout.chunks_in_order().enumerate() {
            assert_eq!(chunk_index(&layout, chunk), expected as u32);
        }
    }

    #[test]
    fn test_world_chunk_local_conversions() {
        let layout = GridLayout::default();
        let world = IVec3::new(17, 8, 63);
        let chunk = world_to_chunk(&layout, world);
        let local = world_to_local(&layout, world);
        assert_eq!(chunk, IVec3::new(2, 1, 7));
        assert_eq!(local, IVec3::new(1, 0, 7));
        assert_eq!(chunk_local_to_world(&layout, chunk, local), world);
        assert_eq!(
            world_field_index(&layout, world),
            field_index(&layout, local, chunk)
        );
    }

    #[test]
    fn test_flatten_cube() {
        assert_eq!(flatten(IVec3::new(1, 2, 3), 8), 1 + 16 + 192);
    }
}
