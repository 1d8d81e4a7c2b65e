//! Batch planning: which chunks the next dispatch covers.

use glam::IVec3;
use isoterra_core::types::{ChunkCoord, GridLayout};

use crate::state_machine::ProgressCursor;

/// Up to `batch` chunks starting at the cursor, advancing it past them.
pub fn plan_generation_batch(cursor: &mut ProgressCursor, batch: u32) -> Vec<ChunkCoord> {
    let mut chunks = Vec::with_capacity(batch as usize);
    while chunks.len() < batch as usize && !cursor.is_done() {
        chunks.push(cursor.position());
        cursor.advance_chunk();
    }
    chunks
}

/// One (y, z) row of chunks, meshed by a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRow {
    pub y: i32,
    pub z: i32,
}

impl MeshRow {
    /// Chunks of the row from x = 0 across the grid.
    pub fn chunks(&self, layout: &GridLayout) -> Vec<ChunkCoord> {
        (0..layout.chunks.x)
            .map(|x| IVec3::new(x, self.y, self.z))
            .collect()
    }
}

/// Up to `rows` rows starting at the cursor's row, advancing it past them.
pub fn plan_meshing_rows(cursor: &mut ProgressCursor, rows: u32) -> Vec<MeshRow> {
    let mut planned = Vec::with_capacity(rows as usize);
    while planned.len() < rows as usize && !cursor.is_done() {
        let p = cursor.position();
        planned.push(MeshRow { y: p.y, z: p.z });
        cursor.advance_row();
    }
    planned
}
