use glam::{IVec3, Vec3};

/// Chunk coordinate in chunk-space (each unit = one chunk of voxels).
pub type ChunkCoord = IVec3;

/// Voxel coordinate, either chunk-local or grid-global depending on context.
pub type VoxelCoord = IVec3;

/// Index of a page in the geometry store.
pub type PageIndex = u32;

/// One geometry-store vertex: position in grid voxel units plus w = 1.
pub type Vertex = [f32; 4];

/// Picking ray carried by modification requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }
}

/// Dimensions of the chunk grid and of each chunk.
///
/// Both extents are strictly positive; `PipelineConfig::validate` guarantees
/// that every flattened voxel index fits in a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Chunks along x, y, z.
    pub chunks: IVec3,
    /// Voxels per chunk along x, y, z.
    pub voxels: IVec3,
}

impl Default for GridLayout {
    fn default() -> Self {
        use crate::constants::{CHUNKS_PER_AXIS, VOXELS_PER_AXIS};
        Self {
            chunks: IVec3::splat(CHUNKS_PER_AXIS as i32),
            voxels: IVec3::splat(VOXELS_PER_AXIS as i32),
        }
    }
}

impl GridLayout {
    pub fn new(chunks: IVec3, voxels: IVec3) -> Self {
        Self { chunks, voxels }
    }

    /// Number of chunks in the grid.
    pub fn chunk_count(&self) -> u32 {
        (self.chunks.x * self.chunks.y * self.chunks.z) as u32
    }

    /// Number of voxels in one chunk.
    pub fn voxels_per_chunk(&self) -> u32 {
        (self.voxels.x * self.voxels.y * self.voxels.z) as u32
    }

    /// Number of voxels in the whole grid.
    pub fn total_voxels(&self) -> u64 {
        self.chunk_count() as u64 * self.voxels_per_chunk() as u64
    }

    /// Voxels along each axis of the whole grid.
    pub fn grid_voxels(&self) -> IVec3 {
        self.chunks * self.voxels
    }

    /// Check if a grid-global voxel coordinate lies inside the grid.
    pub fn contains_voxel(&self, world: VoxelCoord) -> bool {
        world.cmpge(IVec3::ZERO).all() && world.cmplt(self.grid_voxels()).all()
    }

    /// Iterate chunk coordinates in progress order: z outer, y middle, x inner.
    pub fn chunks_in_order(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        let dims = self.chunks;
        (0..dims.z).flat_map(move |z| {
            (0..dims.y).flat_map(move |y| (0..dims.x).map(move |x| IVec3::new(x, y, z)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_counts() {
        let layout = GridLayout::default();
        assert_eq!(layout.chunk_count(), 512);
        assert_eq!(layout.voxels_per_chunk(), 512);
        assert_eq!(layout.total_voxels(), 262_144);
        assert_eq!(layout.grid_voxels(), IVec3::splat(64));
    }

    #[test]
    fn test_contains_voxel_bounds() {
        let layout = GridLayout::default();
        assert!(layout.contains_voxel(IVec3::ZERO));
        assert!(layout.contains_voxel(IVec3::new(63, 63, 63)));
        assert!(!layout.contains_voxel(IVec3::new(64, 0, 0)));
        assert!(!layout.contains_voxel(IVec3::new(0, -1, 0)));
    }

    #[test]
    fn test_chunks_in_order_is_z_outer_x_inner() {
        let layout = GridLayout::new(IVec3::new(2, 2, 2), IVec3::splat(4));
        let order: Vec<ChunkCoord> = layout.chunks_in_order().collect();
        assert_eq!(order.len(), 8);
        assert_eq!(order[0], IVec3::new(0, 0, 0));
        assert_eq!(order[1], IVec3::new(1, 0, 0));
        assert_eq!(order[2], IVec3::new(0, 1, 0));
        assert_eq!(order[4], IVec3::new(0, 0, 1));
        assert_eq!(order[7], IVec3::new(1, 1, 1));
    }
}
