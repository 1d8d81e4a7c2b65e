//! Device-side half of the terrain pipeline: the executor, the shared
//! stores, the page allocator and the generation, meshing and
//! draw-collection passes.

pub mod allocator;
pub mod buffers;
pub mod device;
pub mod error;
pub mod passes;

pub use allocator::PageAllocator;
pub use buffers::{DrawEntry, DrawIndirectCommand, TerrainStores};
pub use device::Device;
pub use error::{AllocError, DeviceError, MeshError};
pub use passes::generation::DensitySource;
