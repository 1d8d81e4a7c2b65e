use std::collections::VecDeque;

use glam::IVec3;
use isoterra_core::types::Ray;

/// Events consumed by the terrain controller. Progress events carry the
/// cursor of the next unprocessed chunk (generation) or row (meshing).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerrainEvent {
    GenerationProgress { cursor: IVec3 },
    MeshingProgress { cursor: IVec3 },
    ModificationRequest { ray: Ray },
}

impl TerrainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TerrainEvent::GenerationProgress { .. } => "generation-progress",
            TerrainEvent::MeshingProgress { .. } => "meshing-progress",
            TerrainEvent::ModificationRequest { .. } => "modification-request",
        }
    }
}

/// FIFO of pending events, including the controller's own continuations.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<TerrainEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TerrainEvent) {
        self.pending.push_back(event);
    }

    pub fn pop(&mut self) -> Option<TerrainEvent> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = EventQueue::new();
        queue.push(TerrainEvent::GenerationProgress { cursor: IVec3::ZERO });
        queue.push(TerrainEvent::MeshingProgress { cursor: IVec3::X });
        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.pop(),
            Some(TerrainEvent::GenerationProgress { cursor: IVec3::ZERO })
        );
        assert_eq!(queue.pop(), Some(TerrainEvent::MeshingProgress { cursor: IVec3::X }));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }
}
