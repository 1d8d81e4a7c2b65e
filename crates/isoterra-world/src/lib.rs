//! Host-side orchestration of the terrain pipeline: progress events, stage
//! state machines, batch planning and the density generator.

pub mod controller;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod state_machine;
pub mod terrain;

pub use controller::{CycleStats, StepOutcome, TerrainController};
pub use error::TerrainError;
pub use events::{EventQueue, TerrainEvent};
pub use state_machine::StageState;
pub use terrain::TerrainDensity;
