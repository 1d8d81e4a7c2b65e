pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod types;

pub use config::PipelineConfig;
pub use error::ConfigError;
pub use types::{ChunkCoord, GridLayout, PageIndex, Ray, Vertex, VoxelCoord};
