use isoterra_core::constants::{CONFIGURATION_COUNT, MAX_CONFIGURATION_EDGES, NO_EDGE};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Configuration {configuration} position {position}: edge index {value} outside -1..=11")]
    EdgeOutOfRange {
        configuration: usize,
        position: usize,
        value: i32,
    },
    #[error("Configuration {configuration} has an edge after its terminator at position {position}")]
    EdgeAfterTerminator { configuration: usize, position: usize },
    #[error("Configuration {configuration} declares {declared} vertices but lists {listed}")]
    CountMismatch {
        configuration: usize,
        declared: u8,
        listed: u8,
    },
    #[error("Configuration {configuration} lists {listed} edges, not a whole number of triangles")]
    PartialTriangle { configuration: usize, listed: u8 },
    #[error("Uniform configuration {configuration} must emit nothing, lists {listed} edges")]
    UniformEmits { configuration: usize, listed: u8 },
}

/// Length of a `-1` terminated row.
pub fn listed_edges(row: &[i32; MAX_CONFIGURATION_EDGES]) -> u8 {
    row.iter().take_while(|&&e| e != NO_EDGE).count() as u8
}

/// Validate a configuration table against its vertex-count table.
///
/// `configurations` must hold exactly one row per configuration; the loader
/// enforces that before calling in.
pub fn validate_tables(
    configurations: &[[i32; MAX_CONFIGURATION_EDGES]],
    vertex_counts: &[u8; CONFIGURATION_COUNT],
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (configuration, row) in configurations.iter().enumerate() {
        let listed = listed_edges(row);

        for (position, &value) in row.iter().enumerate() {
            if !(NO_EDGE..=11).contains(&value) {
                errors.push(ValidationError::EdgeOutOfRange {
                    configuration,
                    position,
                    value,
                });
            } else if value != NO_EDGE && position > listed as usize {
                errors.push(ValidationError::EdgeAfterTerminator {
                    configuration,
                    position,
                });
            }
        }

        let declared = vertex_counts[configuration];
        if declared != listed {
            errors.push(ValidationError::CountMismatch {
                configuration,
                declared,
                listed,
            });
        }
        if listed % 3 != 0 {
            errors.push(ValidationError::PartialTriangle {
                configuration,
                listed,
            });
        }
        if (configuration == 0 || configuration == CONFIGURATION_COUNT - 1) && listed != 0 {
            errors.push(ValidationError::UniformEmits {
                configuration,
                listed,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{CONFIGURATIONS, VERTEX_COUNTS};

    fn builtin_rows() -> Vec<[i32; MAX_CONFIGURATION_EDGES]> {
        CONFIGURATIONS
            .iter()
            .map(|row| row.map(|e| e as i32))
            .collect()
    }

    #[test]
    fn test_builtin_tables_validate() {
        assert!(validate_tables(&builtin_rows(), &VERTEX_COUNTS).is_ok());
    }

    #[test]
    fn test_out_of_range_edge_detected() {
        let mut rows = builtin_rows();
        rows[1][1] = 12;
        let errors = validate_tables(&rows, &VERTEX_COUNTS).unwrap_err();
        assert!(errors.contains(&ValidationError::EdgeOutOfRange {
            configuration: 1,
            position: 1,
            value: 12,
        }));
    }

    #[test]
    fn test_count_mismatch_detected() {
        let mut counts = VERTEX_COUNTS;
        counts[1] = 6;
        let errors = validate_tables(&builtin_rows(), &counts).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::CountMismatch {
                configuration: 1,
                declared: 6,
                listed: 3,
            }]
        );
    }

    #[test]
    fn test_edge_after_terminator_detected() {
        let mut rows = builtin_rows();
        // Configuration 1 is [0, 8, 3, -1, ...]; put an edge past the gap.
        rows[1][5] = 4;
        let errors = validate_tables(&rows, &VERTEX_COUNTS).unwrap_err();
        assert!(errors.contains(&ValidationError::EdgeAfterTerminator {
            configuration: 1,
            position: 5,
        }));
    }

    #[test]
    fn test_uniform_configuration_must_be_empty() {
        let mut rows = builtin_rows();
        let mut counts = VERTEX_COUNTS;
        rows[255][..3].copy_from_slice(&[0, 8, 3]);
        counts[255] = 3;
        let errors = validate_tables(&rows, &counts).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UniformEmits {
                configuration: 255,
                listed: 3,
            }]
        );
    }
}
