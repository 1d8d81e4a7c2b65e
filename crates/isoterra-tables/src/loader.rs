use std::path::{Path, PathBuf};

use isoterra_core::constants::{CONFIGURATION_COUNT, MAX_CONFIGURATION_EDGES};
use thiserror::Error;

use crate::tables::McTables;
use crate::validator::ValidationError;

/// File name of the configuration table asset.
pub const CONFIGURATION_LUT_FILE: &str = "MarchingCubesLUT.bin";
/// File name of the vertex-count table asset.
pub const VERTEX_COUNT_LUT_FILE: &str = "MarchingCubesVertexCountLUT.bin";

/// Configuration blob with 32-bit little-endian entries.
pub const CONFIGURATION_BYTES_WIDE: usize = CONFIGURATION_COUNT * MAX_CONFIGURATION_EDGES * 4;
/// Configuration blob with signed 8-bit entries.
pub const CONFIGURATION_BYTES_COMPACT: usize = CONFIGURATION_COUNT * MAX_CONFIGURATION_EDGES;
/// Vertex-count blob: one unsigned byte per configuration.
pub const VERTEX_COUNT_BYTES: usize = CONFIGURATION_COUNT;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to access lookup table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "Configuration table is {actual} bytes, expected {} (i32) or {} (i8)",
        CONFIGURATION_BYTES_WIDE,
        CONFIGURATION_BYTES_COMPACT
    )]
    ConfigurationSize { actual: usize },
    #[error("Vertex-count table is {actual} bytes, expected {}", VERTEX_COUNT_BYTES)]
    VertexCountSize { actual: usize },
    #[error("Lookup tables failed validation ({} problems, first: {})", .0.len(), first_problem(.0))]
    Invalid(Vec<ValidationError>),
}

fn first_problem(errors: &[ValidationError]) -> String {
    errors.first().map(ToString::to_string).unwrap_or_default()
}

/// Decode a configuration blob. The entry width follows from the length.
pub fn parse_configurations(
    bytes: &[u8],
) -> Result<Vec<[i32; MAX_CONFIGURATION_EDGES]>, TableError> {
    let entries: Vec<i32> = match bytes.len() {
        CONFIGURATION_BYTES_WIDE => bytes
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        CONFIGURATION_BYTES_COMPACT => bytes.iter().map(|&b| b as i8 as i32).collect(),
        actual => return Err(TableError::ConfigurationSize { actual }),
    };

    Ok(entries
        .chunks_exact(MAX_CONFIGURATION_EDGES)
        .map(|row| {
            let mut out = [0i32; MAX_CONFIGURATION_EDGES];
            out.copy_from_slice(row);
            out
        })
        .collect())
}

/// Decode a vertex-count blob.
pub fn parse_vertex_counts(bytes: &[u8]) -> Result<[u8; CONFIGURATION_COUNT], TableError> {
    bytes
        .try_into()
        .map_err(|_| TableError::VertexCountSize {
            actual: bytes.len(),
        })
}

/// Decode and validate both blobs.
pub fn load_tables_from_bytes(
    configuration_bytes: &[u8],
    vertex_count_bytes: &[u8],
) -> Result<McTables, TableError> {
    let configurations = parse_configurations(configuration_bytes)?;
    let vertex_counts = parse_vertex_counts(vertex_count_bytes)?;
    McTables::from_parts(configurations, vertex_counts)
}

/// Read, decode and validate both table assets.
pub fn load_tables(
    configuration_path: &Path,
    vertex_count_path: &Path,
) -> Result<McTables, TableError> {
    let configuration_bytes = read_asset(configuration_path)?;
    let vertex_count_bytes = read_asset(vertex_count_path)?;
    let tables = load_tables_from_bytes(&configuration_bytes, &vertex_count_bytes)?;
    log::info!(
        "Loaded lookup tables from {} and {}",
        configuration_path.display(),
        vertex_count_path.display()
    );
    Ok(tables)
}

/// Load tables from optional asset paths. A table without a path comes from
/// the built-in set, and the pair is validated together.
pub fn load_tables_or_builtin(
    configuration_path: Option<&Path>,
    vertex_count_path: Option<&Path>,
) -> Result<McTables, TableError> {
    match (configuration_path, vertex_count_path) {
        (None, None) => Ok(McTables::builtin()),
        (Some(configuration), Some(vertex_count)) => load_tables(configuration, vertex_count),
        (Some(configuration), None) => {
            let tables = load_tables_from_bytes(
                &read_asset(configuration)?,
                &encode_vertex_counts(&McTables::builtin()),
            )?;
            log::info!("Loaded configuration table from {}", configuration.display());
            Ok(tables)
        }
        (None, Some(vertex_count)) => {
            let tables = load_tables_from_bytes(
                &encode_configurations(&McTables::builtin()),
                &read_asset(vertex_count)?,
            )?;
            log::info!("Loaded vertex-count table from {}", vertex_count.display());
            Ok(tables)
        }
    }
}

fn read_asset(path: &Path) -> Result<Vec<u8>, TableError> {
    std::fs::read(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Encode the configuration table as 32-bit little-endian entries.
pub fn encode_configurations(tables: &McTables) -> Vec<u8> {
    let mut out = Vec::with_capacity(CONFIGURATION_BYTES_WIDE);
    for configuration in 0..CONFIGURATION_COUNT {
        for &edge in tables.configuration(configuration as u8) {
            out.extend_from_slice(&edge.to_le_bytes());
        }
    }
    out
}

/// Encode the vertex-count table, one byte per configuration.
pub fn encode_vertex_counts(tables: &McTables) -> Vec<u8> {
    (0..CONFIGURATION_COUNT)
        .map(|c| tables.vertex_count(c as u8) as u8)
        .collect()
}

/// Write both table assets into `dir` under their standard file names.
pub fn write_tables(dir: &Path, tables: &McTables) -> Result<(PathBuf, PathBuf), TableError> {
    std::fs::create_dir_all(dir).map_err(|source| TableError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let configuration_path = dir.join(CONFIGURATION_LUT_FILE);
    let vertex_count_path = dir.join(VERTEX_COUNT_LUT_FILE);
    for (path, bytes) in [
        (&configuration_path, encode_configurations(tables)),
        (&vertex_count_path, encode_vertex_counts(tables)),
    ] {
        std::fs::write(path, bytes).map_err(|source| TableError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok((configuration_path, vertex_count_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::CONFIGURATIONS;

    fn compact_blob() -> Vec<u8> {
        CONFIGURATIONS
            .iter()
            .flat_map(|row| row.iter().map(|&e| e as u8))
            .collect()
    }

    #[test]
    fn test_wide_blob_decodes_to_builtin() {
        let builtin = McTables::builtin();
        let tables = load_tables_from_bytes(
            &encode_configurations(&builtin),
            &encode_vertex_counts(&builtin),
        )
        .expect("builtin blobs are valid");
        assert_eq!(tables, builtin);
    }

    #[test]
    fn test_compact_blob_decodes_to_builtin() {
        let builtin = McTables::builtin();
        let blob = compact_blob();
        assert_eq!(blob.len(), CONFIGURATION_BYTES_COMPACT);
        let tables = load_tables_from_bytes(&blob, &encode_vertex_counts(&builtin))
            .expect("compact blob is valid");
        assert_eq!(tables, builtin);
    }

    #[test]
    fn test_wide_blob_is_little_endian() {
        let blob = encode_configurations(&McTables::builtin());
        // Configuration 0 starts with the terminator.
        assert_eq!(&blob[0..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
        // Configuration 1 is [0, 8, 3, -1, ...].
        let row1 = &blob[MAX_CONFIGURATION_EDGES * 4..];
        assert_eq!(&row1[0..4], &[0, 0, 0, 0]);
        assert_eq!(&row1[4..8], &[8, 0, 0, 0]);
    }

    #[test]
    fn test_wrong_sizes_rejected() {
        assert!(matches!(
            parse_configurations(&[0u8; 100]),
            Err(TableError::ConfigurationSize { actual: 100 })
        ));
        assert!(matches!(
            parse_vertex_counts(&[0u8; 255]),
            Err(TableError::VertexCountSize { actual: 255 })
        ));
    }

    #[test]
    fn test_inconsistent_blobs_rejected() {
        let builtin = McTables::builtin();
        let mut counts = encode_vertex_counts(&builtin);
        counts[1] = 9;
        let err = load_tables_from_bytes(&encode_configurations(&builtin), &counts).unwrap_err();
        match err {
            TableError::Invalid(errors) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation failure, got {other}"),
        }
    }

    #[test]
    fn test_write_then_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("isoterra-luts-{}", std::process::id()));
        let builtin = McTables::builtin();
        let (configuration, vertex_count) = write_tables(&dir, &builtin).expect("write");
        assert_eq!(
            std::fs::metadata(&configuration).expect("stat").len() as usize,
            CONFIGURATION_BYTES_WIDE
        );
        let loaded = load_tables(&configuration, &vertex_count).expect("load");
        assert_eq!(loaded, builtin);

        let only_counts = load_tables_or_builtin(None, Some(&vertex_count)).expect("load");
        assert_eq!(only_counts, builtin);
        let only_configurations =
            load_tables_or_builtin(Some(&configuration), None).expect("load");
        assert_eq!(only_configurations, builtin);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let missing = Path::new("/nonexistent/isoterra/MarchingCubesLUT.bin");
        match load_tables(missing, missing) {
            Err(TableError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn test_no_paths_gives_builtin() {
        assert_eq!(
            load_tables_or_builtin(None, None).expect("builtin"),
            McTables::builtin()
        );
    }
}
