use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a `PipelineConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config RON: {0}")]
    Parse(String),

    #[error("{field} must be non-zero on every axis, got {value:?}")]
    ZeroDimension { field: &'static str, value: [u32; 3] },

    #[error("{field} must not exceed {} on any axis, got {value:?}", i32::MAX)]
    DimensionTooLarge { field: &'static str, value: [u32; 3] },

    #[error("{what} of {count} exceeds {}", i32::MAX)]
    ExtentTooLarge { what: &'static str, count: u64 },

    #[error("{0} must be non-zero")]
    ZeroValue(&'static str),

    #[error("scalar field needs {voxels} samples, more than u32 indexing allows")]
    FieldTooLarge { voxels: u64 },

    #[error("{pages} pages of {page_size} vertices exceed the {limit}-element address space")]
    GeometryTooLarge { pages: u32, page_size: u32, limit: u32 },
}
