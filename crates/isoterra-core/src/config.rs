use std::path::{Path, PathBuf};

use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;
use crate::types::GridLayout;

/// Runtime configuration for the terrain pipeline.
///
/// Every field has a default matching the shared constants, so a RON file
/// only needs to name what it overrides:
///
/// ```ron
/// (chunks_per_axis: (4, 2, 4), generation_batch: 8)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Chunks along x, y, z.
    pub chunks_per_axis: [u32; 3],
    /// Voxels per chunk along x, y, z.
    pub voxels_per_axis: [u32; 3],
    /// Vertices per geometry page.
    pub page_size: u32,
    /// Pages managed by the allocator.
    pub max_pages: u32,
    /// Chunks generated per generation event.
    pub generation_batch: u32,
    /// (y, z) rows meshed per meshing event.
    pub meshing_rows_per_event: u32,
    /// Bound on one batch-completion wait, in milliseconds.
    pub wait_timeout_ms: u64,
    /// Executor threads; 0 lets rayon pick.
    pub worker_threads: usize,
    /// Seed for the density generator.
    pub seed: u64,
    /// Optional configuration-table asset; built-in table when absent.
    pub configuration_lut: Option<PathBuf>,
    /// Optional vertex-count-table asset; built-in table when absent.
    pub vertex_count_lut: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunks_per_axis: [CHUNKS_PER_AXIS; 3],
            voxels_per_axis: [VOXELS_PER_AXIS; 3],
            page_size: PAGE_SIZE,
            max_pages: MAX_PAGES,
            generation_batch: DEFAULT_GENERATION_BATCH,
            meshing_rows_per_event: DEFAULT_MESHING_ROWS,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            worker_threads: 0,
            seed: DEFAULT_SEED,
            configuration_lut: None,
            vertex_count_lut: None,
        }
    }
}

impl PipelineConfig {
    /// Grid layout described by this config. Call `validate` first.
    pub fn layout(&self) -> GridLayout {
        GridLayout::new(to_ivec3(self.chunks_per_axis), to_ivec3(self.voxels_per_axis))
    }

    /// Check dimensions, batch sizes and addressing limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("chunks_per_axis", self.chunks_per_axis),
            ("voxels_per_axis", self.voxels_per_axis),
        ] {
            if value.contains(&0) {
                return Err(ConfigError::ZeroDimension { field, value });
            }
            if value.iter().any(|&v| v > ADDRESS_SPACE) {
                return Err(ConfigError::DimensionTooLarge { field, value });
            }
        }

        if self.page_size == 0 {
            return Err(ConfigError::ZeroValue("page_size"));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::ZeroValue("max_pages"));
        }
        if self.generation_batch == 0 {
            return Err(ConfigError::ZeroValue("generation_batch"));
        }
        if self.meshing_rows_per_event == 0 {
            return Err(ConfigError::ZeroValue("meshing_rows_per_event"));
        }
        if self.wait_timeout_ms == 0 {
            return Err(ConfigError::ZeroValue("wait_timeout_ms"));
        }

        // Chunk and voxel indices are flattened in i32.
        let chunks = product(self.chunks_per_axis);
        if chunks > ADDRESS_SPACE as u64 {
            return Err(ConfigError::ExtentTooLarge {
                what: "chunk count",
                count: chunks,
            });
        }
        let voxels_per_chunk = product(self.voxels_per_axis);
        if voxels_per_chunk > ADDRESS_SPACE as u64 {
            return Err(ConfigError::ExtentTooLarge {
                what: "voxels per chunk",
                count: voxels_per_chunk,
            });
        }
        for (c, v) in self.chunks_per_axis.iter().zip(&self.voxels_per_axis) {
            let extent = *c as u64 * *v as u64;
            if extent > ADDRESS_SPACE as u64 {
                return Err(ConfigError::ExtentTooLarge {
                    what: "grid voxels along an axis",
                    count: extent,
                });
            }
        }

        let voxels = chunks * voxels_per_chunk;
        if voxels > u32::MAX as u64 {
            return Err(ConfigError::FieldTooLarge { voxels });
        }

        if self.max_pages as u64 * self.page_size as u64 > ADDRESS_SPACE as u64 {
            return Err(ConfigError::GeometryTooLarge {
                pages: self.max_pages,
                page_size: self.page_size,
                limit: ADDRESS_SPACE,
            });
        }

        Ok(())
    }
}

fn product(v: [u32; 3]) -> u64 {
    v.iter().map(|&x| x as u64).product()
}

fn to_ivec3(v: [u32; 3]) -> IVec3 {
    IVec3::new(v[0] as i32, v[1] as i32, v[2] as i32)
}

/// Parse and validate a config from a RON string.
pub fn load_config_from_str(ron_str: &str) -> Result<PipelineConfig, ConfigError> {
    let options = ron::Options::default();
    let config: PipelineConfig = options
        .from_str(ron_str)
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a RON config file.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&contents)
}
