//! Render-facing upload of terrain geometry and its indirect draw list.

pub mod indirect;

pub use indirect::{plan_upload, TerrainDrawBuffers, UploadPlan, VertexRegion};
