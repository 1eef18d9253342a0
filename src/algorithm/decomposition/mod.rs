//! # Decomposition
//!
//! Drivers for block-angular problems: Dantzig-Wolfe column generation and Benders cuts. The
//! caller declares the block structure as a partition of the rows; detection is out of scope.
//! Subproblems are independent per block and solved concurrently, with the master updated
//! only after a full round of results is in.
use thiserror::Error;

use crate::algorithm::solve::{PresolveMode, SolveOptions, SolveStrategy};
use crate::data::linear_program::model::{Model, ModelError};

pub mod benders;
pub mod dantzig_wolfe;

/// Why a decomposition could not be set up or run.
#[derive(Debug, Error)]
pub enum DecompositionError {
    /// The model itself failed validation.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The partition needs at least one block.
    #[error("the partition has no blocks")]
    NoBlocks,
    /// A row index in the partition does not exist in the model.
    #[error("row index {0} is out of range")]
    RowOutOfRange(usize),
    /// A row appears twice in the partition.
    #[error("row {0} appears in more than one part of the partition")]
    RowRepeated(usize),
    /// A row appears in no part of the partition.
    #[error("row {0} is not covered by the partition")]
    RowUncovered(usize),
    /// A column has entries in two different blocks, so it belongs to neither.
    #[error("column {column} has entries in blocks {first} and {second}")]
    ColumnSpansBlocks {
        /// The offending column.
        column: usize,
        /// First block it touches.
        first: usize,
        /// Second block it touches.
        second: usize,
    },
    /// A column index does not exist in the model.
    #[error("column index {0} is out of range")]
    ColumnOutOfRange(usize),
    /// A master row may only involve the linking columns.
    #[error("master row {row} has an entry for subproblem column {column}")]
    MasterRowHasSubproblemColumn {
        /// The master row.
        row: usize,
        /// The subproblem column appearing in it.
        column: usize,
    },
}

/// A caller-declared partition of the rows into linking rows and independent blocks.
///
/// For Dantzig-Wolfe the linking rows couple the blocks and go into the master. For Benders
/// they are the rows over the linking columns only.
#[derive(Clone, Debug)]
pub struct RowPartition {
    /// Rows kept in the master problem.
    pub linking: Vec<usize>,
    /// Disjoint row sets, one per block, covering all remaining rows.
    pub blocks: Vec<Vec<usize>>,
}

/// What a row is in a given partition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RowRole {
    Linking,
    Block(usize),
}

impl RowPartition {
    /// Check the partition covers every row exactly once and map row to role.
    pub(crate) fn roles(&self, nr_rows: usize) -> Result<Vec<RowRole>, DecompositionError> {
        if self.blocks.is_empty() {
            return Err(DecompositionError::NoBlocks);
        }
        let mut roles = vec![None; nr_rows];
        let mut assign = |row: usize, role: RowRole| -> Result<(), DecompositionError> {
            if row >= nr_rows {
                return Err(DecompositionError::RowOutOfRange(row));
            }
            if roles[row].replace(role).is_some() {
                return Err(DecompositionError::RowRepeated(row));
            }
            Ok(())
        };
        for &row in &self.linking {
            assign(row, RowRole::Linking)?;
        }
        for (block, rows) in self.blocks.iter().enumerate() {
            for &row in rows {
                assign(row, RowRole::Block(block))?;
            }
        }
        roles
            .into_iter()
            .enumerate()
            .map(|(row, role)| role.ok_or(DecompositionError::RowUncovered(row)))
            .collect()
    }
}

/// Assign each column to the single block its non-linking entries live in.
///
/// `None` for columns touching only linking rows; those stay in the master.
pub(crate) fn assign_columns(
    model: &Model,
    roles: &[RowRole],
) -> Result<Vec<Option<usize>>, DecompositionError> {
    (0..model.nr_columns())
        .map(|column| {
            let mut assigned = None;
            for &(row, _) in model.constraints().column(column) {
                if let RowRole::Block(block) = roles[row] {
                    match assigned {
                        None => assigned = Some(block),
                        Some(first) if first != block => {
                            return Err(DecompositionError::ColumnSpansBlocks {
                                column,
                                first,
                                second: block,
                            });
                        },
                        Some(_) => {},
                    }
                }
            }
            Ok(assigned)
        })
        .collect()
}

/// Tuning knobs shared by both drivers. The thresholds steer termination heuristics and are
/// not load-bearing for correctness.
#[derive(Clone, Debug)]
pub struct DecompositionControls {
    /// Reduced cost and relative gap threshold for convergence.
    pub tolerance: f64,
    /// Hard stop on generation rounds.
    pub max_rounds: usize,
    /// Options for each subproblem solve.
    pub subproblem: SolveOptions,
    /// Options for each master solve.
    pub master: SolveOptions,
}

impl Default for DecompositionControls {
    fn default() -> Self {
        // Subproblems run the primal without presolve so infeasibility and unboundedness
        // certificates come back in the subproblem's own index space.
        let subproblem = SolveOptions {
            strategy: SolveStrategy::Primal,
            presolve: PresolveMode::Off,
            ..SolveOptions::default()
        };
        let master = SolveOptions {
            presolve: PresolveMode::Off,
            ..SolveOptions::default()
        };
        Self { tolerance: 1e-7, max_rounds: 200, subproblem, master }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::linear_program::elements::Objective;

    fn two_block_model() -> Model {
        let mut model = Model::new(Objective::Minimize);
        model.add_row(3.0, f64::INFINITY);
        model.add_row(f64::NEG_INFINITY, 2.0);
        model.add_row(f64::NEG_INFINITY, 2.0);
        model.add_column(1.0, 0.0, f64::INFINITY, &[(0, 1.0), (1, 1.0)]);
        model.add_column(2.0, 0.0, f64::INFINITY, &[(0, 1.0), (2, 1.0)]);
        model
    }

    #[test]
    fn roles_cover_and_reject_overlap() {
        let partition = RowPartition { linking: vec![0], blocks: vec![vec![1], vec![2]] };
        let roles = partition.roles(3).unwrap();
        assert_eq!(roles, vec![RowRole::Linking, RowRole::Block(0), RowRole::Block(1)]);

        let overlapping = RowPartition { linking: vec![0, 1], blocks: vec![vec![1], vec![2]] };
        assert!(matches!(overlapping.roles(3), Err(DecompositionError::RowRepeated(1))));

        let gappy = RowPartition { linking: vec![], blocks: vec![vec![1], vec![2]] };
        assert!(matches!(gappy.roles(3), Err(DecompositionError::RowUncovered(0))));
    }

    #[test]
    fn columns_follow_their_block_rows() {
        let model = two_block_model();
        let partition = RowPartition { linking: vec![0], blocks: vec![vec![1], vec![2]] };
        let roles = partition.roles(3).unwrap();
        assert_eq!(assign_columns(&model, &roles).unwrap(), vec![Some(0), Some(1)]);
    }

    #[test]
    fn a_column_in_two_blocks_is_rejected() {
        let mut model = two_block_model();
        model.add_column(1.0, 0.0, 1.0, &[(1, 1.0), (2, 1.0)]);
        let partition = RowPartition { linking: vec![0], blocks: vec![vec![1], vec![2]] };
        let roles = partition.roles(3).unwrap();
        assert!(matches!(
            assign_columns(&model, &roles),
            Err(DecompositionError::ColumnSpansBlocks { column: 2, first: 0, second: 1 }),
        ));
    }
}
