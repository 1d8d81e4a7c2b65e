//! Single source of truth for shared constants.
//! Layout values here describe the shared stores; every crate sizes its
//! buffers from them (or from a `PipelineConfig` that defaults to them).

/// Voxels per chunk along each axis.
pub const VOXELS_PER_AXIS: u32 = 8;

/// Chunks per grid axis.
pub const CHUNKS_PER_AXIS: u32 = 8;

/// Total voxels per chunk (8^3).
pub const VOXELS_PER_CHUNK: u32 = VOXELS_PER_AXIS * VOXELS_PER_AXIS * VOXELS_PER_AXIS;

/// Floats per vertex in the geometry store (x, y, z, w).
pub const VERTEX_STRIDE: usize = 4;

/// Vertices per geometry page.
pub const PAGE_SIZE: u32 = 8192;

/// Addressable elements of one store (2^31 - 1).
pub const ADDRESS_SPACE: u32 = i32::MAX as u32;

/// Maximum allocatable pages: floor((2^31 - 1) / PAGE_SIZE) = 262143.
pub const MAX_PAGES: u32 = ADDRESS_SPACE / PAGE_SIZE;

/// Number of marching-cubes corner configurations.
pub const CONFIGURATION_COUNT: usize = 256;

/// Edge indices stored per configuration row (5 triangles max).
pub const MAX_CONFIGURATION_EDGES: usize = 15;

/// Terminator value in a configuration row.
pub const NO_EDGE: i32 = -1;

/// A sample is inside the surface when it is strictly below this level.
pub const ISO_LEVEL: f32 = 0.0;

/// Chunks generated per generation event.
pub const DEFAULT_GENERATION_BATCH: u32 = 1;

/// (y, z) rows meshed per meshing event.
pub const DEFAULT_MESHING_ROWS: u32 = 1;

/// Bound on a single batch-completion wait.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Seed for the default density generator.
pub const DEFAULT_SEED: u64 = 42;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_pages_matches_address_space() {
        assert_eq!(MAX_PAGES, 262_143);
        assert!(MAX_PAGES as u64 * PAGE_SIZE as u64 <= ADDRESS_SPACE as u64);
    }

    #[test]
    fn test_chunk_fits_in_one_page() {
        // Worst case: every cell emits a full configuration row.
        let worst = VOXELS_PER_CHUNK as usize * MAX_CONFIGURATION_EDGES;
        assert!(worst <= PAGE_SIZE as usize);
    }
}
