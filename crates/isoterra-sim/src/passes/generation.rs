use std::convert::Infallible;
use std::sync::Arc;

use glam::IVec3;
use isoterra_core::math::{chunk_local_to_world, field_index};
use isoterra_core::types::{ChunkCoord, VoxelCoord};

use crate::buffers::TerrainStores;
use crate::device::Device;
use crate::error::DeviceError;

/// Scalar density function sampled by the generation pass. Negative values
/// are inside the surface.
pub trait DensitySource: Send + Sync {
    fn density(&self, world: VoxelCoord) -> f32;
}

impl<F> DensitySource for F
where
    F: Fn(VoxelCoord) -> f32 + Send + Sync,
{
    fn density(&self, world: VoxelCoord) -> f32 {
        self(world)
    }
}

/// Fill every sample of `chunks`. One invocation per (chunk, z-slice);
/// all writes are complete when this returns.
pub fn generate_chunks(
    device: &Device,
    stores: &Arc<TerrainStores>,
    source: &Arc<dyn DensitySource>,
    chunks: &[ChunkCoord],
) -> Result<(), DeviceError> {
    let layout = stores.layout;
    let slices = layout.voxels.z as usize;
    let invocations = chunks.len() * slices;

    let stores = Arc::clone(stores);
    let source = Arc::clone(source);
    let chunks = chunks.to_vec();
    device.dispatch::<Infallible, _>("generation", invocations, move |invocation| {
        let chunk = chunks[invocation / slices];
        let z = (invocation % slices) as i32;
        for y in 0..layout.voxels.y {
            for x in 0..layout.voxels.x {
                let local = IVec3::new(x, y, z);
                let world = chunk_local_to_world(&layout, chunk, local);
                stores
                    .field
                    .write(field_index(&layout, local, chunk), source.density(world));
            }
        }
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoterra_core::config::PipelineConfig;
    use isoterra_core::math::world_field_index;
    use std::time::Duration;

    fn small_stores() -> Arc<TerrainStores> {
        let config = PipelineConfig {
            chunks_per_axis: [2, 2, 2],
            voxels_per_axis: [4, 4, 4],
            max_pages: 16,
            ..Default::default()
        };
        Arc::new(TerrainStores::new(&config))
    }

    #[test]
    fn test_generation_defines_requested_chunks_only() {
        let device = Device::new(2, Duration::from_secs(10)).expect("pool");
        let stores = small_stores();
        let source: Arc<dyn DensitySource> = Arc::new(|w: VoxelCoord| w.x as f32);

        generate_chunks(&device, &stores, &source, &[IVec3::new(1, 0, 0)]).expect("dispatch");

        let layout = stores.layout;
        let per_chunk = layout.voxels_per_chunk();
        let chunk1 = isoterra_core::math::chunk_index(&layout, IVec3::new(1, 0, 0));
        for i in 0..stores.field.len() as u32 {
            let in_chunk1 = i / per_chunk == chunk1;
            assert_eq!(stores.field.is_defined(i), in_chunk1, "sample {i}");
        }
        assert_eq!(stores.field.sample(IVec3::new(6, 3, 2)), 6.0);
        assert_eq!(
            stores.field.read(world_field_index(&layout, IVec3::new(4, 0, 0))),
            4.0
        );
    }
}
