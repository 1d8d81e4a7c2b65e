use glam::IVec3;
use isoterra_core::constants::{CONFIGURATION_COUNT, MAX_CONFIGURATION_EDGES};

use crate::builtin::{CONFIGURATIONS, CORNER_OFFSETS, EDGE_CORNERS, VERTEX_COUNTS};
use crate::loader::TableError;
use crate::validator::{listed_edges, validate_tables};

/// Validated marching-cubes lookup tables, read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McTables {
    configurations: Vec<[i32; MAX_CONFIGURATION_EDGES]>,
    vertex_counts: [u8; CONFIGURATION_COUNT],
}

impl McTables {
    /// Tables compiled into the crate.
    pub fn builtin() -> Self {
        Self {
            configurations: CONFIGURATIONS
                .iter()
                .map(|row| row.map(|e| e as i32))
                .collect(),
            vertex_counts: VERTEX_COUNTS,
        }
    }

    /// Build from decoded rows, validating them against the counts.
    pub fn from_parts(
        configurations: Vec<[i32; MAX_CONFIGURATION_EDGES]>,
        vertex_counts: [u8; CONFIGURATION_COUNT],
    ) -> Result<Self, TableError> {
        validate_tables(&configurations, &vertex_counts).map_err(TableError::Invalid)?;
        Ok(Self {
            configurations,
            vertex_counts,
        })
    }

    /// Raw `-1` terminated row of a configuration.
    #[inline]
    pub fn configuration(&self, configuration: u8) -> &[i32; MAX_CONFIGURATION_EDGES] {
        &self.configurations[configuration as usize]
    }

    /// Vertices a cell with this configuration emits.
    #[inline]
    pub fn vertex_count(&self, configuration: u8) -> u32 {
        self.vertex_counts[configuration as usize] as u32
    }

    /// Edges crossed by the configuration's triangles, in emission order.
    #[inline]
    pub fn edges(&self, configuration: u8) -> impl Iterator<Item = usize> + '_ {
        let row = self.configuration(configuration);
        row[..listed_edges(row) as usize].iter().map(|&e| e as usize)
    }

    /// The two corners joined by `edge`.
    #[inline]
    pub fn edge_corners(edge: usize) -> [usize; 2] {
        EDGE_CORNERS[edge]
    }

    /// Offset of `corner` from the cell's minimum corner.
    #[inline]
    pub fn corner_offset(corner: usize) -> IVec3 {
        IVec3::from_array(CORNER_OFFSETS[corner])
    }
}

impl Default for McTables {
    fn default() -> Self {
        Self::builtin()
    }
}
