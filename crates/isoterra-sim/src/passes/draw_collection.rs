use std::convert::Infallible;
use std::sync::Arc;

use crate::buffers::{DrawIndirectCommand, TerrainStores};
use crate::device::Device;
use crate::error::DeviceError;

/// Compact the draw table into the indirect command store.
///
/// One invocation per chunk; each non-empty chunk claims a slot with an
/// atomic increment, so slot order is unspecified. Returns the draw count.
pub fn collect_draws(device: &Device, stores: &Arc<TerrainStores>) -> Result<u32, DeviceError> {
    stores.counters.reset();

    let chunk_count = stores.draw_table.len();
    let kernel_stores = Arc::clone(stores);
    device.dispatch::<Infallible, _>("draw-collection", chunk_count, move |chunk| {
        let entry = kernel_stores.draw_table.get(chunk as u32);
        if entry.vertex_count > 0 {
            let slot = kernel_stores.counters.claim_draw_slot();
            kernel_stores
                .commands
                .write(slot, DrawIndirectCommand::for_entry(&entry));
        }
        Ok(())
    })?;

    let draw_count = stores.counters.draw_count();
    log::debug!("Draw collection: {draw_count} of {chunk_count} chunks non-empty");
    Ok(draw_count)
}
