use std::cmp::Ordering;

use glam::IVec3;

/// Lifecycle of one stage of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// No event received since the cycle began.
    Idle,
    /// At least one batch done, more remain.
    Running,
    Done,
}

/// Position of the next unprocessed chunk, advancing x fastest, then y,
/// then z. Equals the grid dimensions once every chunk is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressCursor {
    position: IVec3,
    dims: IVec3,
}

impl ProgressCursor {
    pub fn new(dims: IVec3) -> Self {
        Self {
            position: IVec3::ZERO,
            dims,
        }
    }

    pub fn position(&self) -> IVec3 {
        self.position
    }

    pub fn is_done(&self) -> bool {
        self.position == self.dims
    }

    /// Step past one chunk.
    pub fn advance_chunk(&mut self) {
        if self.is_done() {
            return;
        }
        self.position.x += 1;
        if self.position.x == self.dims.x {
            self.position.x = 0;
            self.advance_row();
        }
    }

    /// Step past the rest of the current (y, z) row.
    pub fn advance_row(&mut self) {
        if self.is_done() {
            return;
        }
        self.position.x = 0;
        self.position.y += 1;
        if self.position.y == self.dims.y {
            self.position.y = 0;
            self.position.z += 1;
            if self.position.z == self.dims.z {
                self.position = self.dims;
            }
        }
    }

    pub fn reset(&mut self) {
        self.position = IVec3::ZERO;
    }
}

/// Order two cursors by progress: z first, then y, then x.
pub fn compare_progress(a: IVec3, b: IVec3) -> Ordering {
    (a.z, a.y, a.x).cmp(&(b.z, b.y, b.x))
}

/// State and cursor of one stage.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub state: StageState,
    pub cursor: ProgressCursor,
}

impl Stage {
    pub fn new(dims: IVec3) -> Self {
        Self {
            state: StageState::Idle,
            cursor: ProgressCursor::new(dims),
        }
    }

    pub fn reset(&mut self) {
        self.state = StageState::Idle;
        self.cursor.reset();
    }

    /// Update the state after the cursor moved.
    pub fn settle(&mut self) {
        self.state = if self.cursor.is_done() {
            StageState::Done
        } else {
            StageState::Running
        };
    }
}
