use glam::IVec3;
use isoterra_core::ConfigError;
use isoterra_sim::{DeviceError, MeshError};
use isoterra_tables::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tables(#[from] TableError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("Meshing failed for {} chunks, first: {}", .failures.len(), first_failure(.failures))]
    Meshing { failures: Vec<MeshError> },
    #[error("{stage} event cursor {received} is ahead of the controller cursor {expected}")]
    CursorMismatch {
        stage: &'static str,
        expected: IVec3,
        received: IVec3,
    },
    #[error("{0} is not yet supported")]
    Unsupported(&'static str),
}

fn first_failure(failures: &[MeshError]) -> String {
    failures.first().map(ToString::to_string).unwrap_or_default()
}
