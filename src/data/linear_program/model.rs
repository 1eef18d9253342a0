//! # The problem model
//!
//! A linear program in the general form
//!
//! ```text
//! minimize or maximize  cᵀ x + offset
//! subject to            row_lower <= A x <= row_upper
//!                       col_lower <=   x <= col_upper
//! ```
//!
//! Rows with equal bounds are equalities, rows with two infinite bounds are free and constrain
//! nothing. The model exclusively owns its matrix, bounds and objective; solver-side objects
//! (factorization, pricing) are scoped to a single solve invocation and only borrow from it.
use thiserror::Error;

use crate::data::linear_algebra::SparseTuple;
use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_program::elements::Objective;

/// A complete problem description, also the builder for one.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    objective: Objective,
    objective_offset: f64,
    cost: Vec<f64>,
    /// Constraint coefficients, column major. Does not contain the variable bounds.
    constraints: SparseMatrix<f64>,
    row_lower: Vec<f64>,
    row_upper: Vec<f64>,
    column_lower: Vec<f64>,
    column_upper: Vec<f64>,
}

/// A malformed model, reported before any iteration happens.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// The model has no variables.
    #[error("model has no variables")]
    Empty,
    /// A row's lower bound exceeds its upper bound.
    #[error("row {index} has crossing bounds: {lower} > {upper}")]
    RowBounds {
        /// Index of the offending row.
        index: usize,
        /// Lower bound of that row.
        lower: f64,
        /// Upper bound of that row.
        upper: f64,
    },
    /// A column's lower bound exceeds its upper bound.
    #[error("column {index} has crossing bounds: {lower} > {upper}")]
    ColumnBounds {
        /// Index of the offending column.
        index: usize,
        /// Lower bound of that column.
        lower: f64,
        /// Upper bound of that column.
        upper: f64,
    },
    /// An objective coefficient is NaN or infinite.
    #[error("column {index} has a non-finite objective coefficient")]
    NonFiniteCost {
        /// Index of the offending column.
        index: usize,
    },
    /// A constraint coefficient is NaN or infinite.
    #[error("column {column} has a non-finite coefficient in row {row}")]
    NonFiniteCoefficient {
        /// Row of the offending coefficient.
        row: usize,
        /// Column of the offending coefficient.
        column: usize,
    },
}

impl Model {
    /// An empty model to build on.
    #[must_use]
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            objective_offset: 0.0,
            cost: Vec::new(),
            constraints: SparseMatrix::zeros(0, 0),
            row_lower: Vec::new(),
            row_upper: Vec::new(),
            column_lower: Vec::new(),
            column_upper: Vec::new(),
        }
    }

    /// Create a model from complete arrays.
    ///
    /// # Arguments
    ///
    /// * `constraints`: Coefficient matrix with one row and column per bound pair.
    /// * `row_bounds` / `column_bounds`: `(lower, upper)` per row / column.
    /// * `cost`: One objective coefficient per column.
    #[must_use]
    pub fn from_parts(
        objective: Objective,
        constraints: SparseMatrix<f64>,
        row_bounds: Vec<(f64, f64)>,
        column_bounds: Vec<(f64, f64)>,
        cost: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(constraints.nr_rows(), row_bounds.len());
        debug_assert_eq!(constraints.nr_columns(), column_bounds.len());
        debug_assert_eq!(constraints.nr_columns(), cost.len());

        let (row_lower, row_upper) = row_bounds.into_iter().unzip();
        let (column_lower, column_upper) = column_bounds.into_iter().unzip();
        Self {
            objective,
            objective_offset: 0.0,
            cost,
            constraints,
            row_lower,
            row_upper,
            column_lower,
            column_upper,
        }
    }

    /// Append an empty row with the given bounds; returns its index.
    ///
    /// Coefficients are added through `add_column`; rows must exist before the columns that
    /// reference them.
    pub fn add_row(&mut self, lower: f64, upper: f64) -> usize {
        self.row_lower.push(lower);
        self.row_upper.push(upper);
        self.constraints.grow_rows(1);
        self.row_lower.len() - 1
    }

    /// Append a column with its objective coefficient, bounds and nonzeros; returns its index.
    pub fn add_column(
        &mut self,
        cost: f64,
        lower: f64,
        upper: f64,
        entries: &[SparseTuple<f64>],
    ) -> usize {
        debug_assert!(entries.iter().all(|&(i, _)| i < self.nr_rows()));

        self.cost.push(cost);
        self.column_lower.push(lower);
        self.column_upper.push(upper);
        self.constraints.push_column(entries.to_vec());
        self.cost.len() - 1
    }

    /// A constant added to the objective value of every solution.
    pub fn set_objective_offset(&mut self, offset: f64) {
        self.objective_offset = offset;
    }

    /// Check the model for malformations.
    ///
    /// Solve calls do this before iterating; a `ModelError` aborts the solve.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.nr_columns() == 0 {
            return Err(ModelError::Empty);
        }
        for (index, (&lower, &upper)) in self.row_lower.iter().zip(&self.row_upper).enumerate() {
            if lower > upper {
                return Err(ModelError::RowBounds { index, lower, upper });
            }
        }
        for (index, (&lower, &upper)) in self.column_lower.iter().zip(&self.column_upper).enumerate() {
            if lower > upper {
                return Err(ModelError::ColumnBounds { index, lower, upper });
            }
        }
        if let Some(index) = self.cost.iter().position(|c| !c.is_finite()) {
            return Err(ModelError::NonFiniteCost { index });
        }
        for column in 0..self.nr_columns() {
            for &(row, value) in self.constraints.column(column) {
                if !value.is_finite() {
                    return Err(ModelError::NonFiniteCoefficient { row, column });
                }
            }
        }
        Ok(())
    }

    /// Number of constraint rows.
    #[must_use]
    pub fn nr_rows(&self) -> usize {
        self.row_lower.len()
    }

    /// Number of structural columns.
    #[must_use]
    pub fn nr_columns(&self) -> usize {
        self.cost.len()
    }

    /// Direction of optimization.
    #[must_use]
    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Constant part of the objective.
    #[must_use]
    pub fn objective_offset(&self) -> f64 {
        self.objective_offset
    }

    /// Objective coefficients, one per column.
    #[must_use]
    pub fn cost(&self) -> &[f64] {
        &self.cost
    }

    /// The constraint matrix.
    #[must_use]
    pub fn constraints(&self) -> &SparseMatrix<f64> {
        &self.constraints
    }

    /// Row lower bounds.
    #[must_use]
    pub fn row_lower(&self) -> &[f64] {
        &self.row_lower
    }

    /// Row upper bounds.
    #[must_use]
    pub fn row_upper(&self) -> &[f64] {
        &self.row_upper
    }

    /// Column lower bounds.
    #[must_use]
    pub fn column_lower(&self) -> &[f64] {
        &self.column_lower
    }

    /// Column upper bounds.
    #[must_use]
    pub fn column_upper(&self) -> &[f64] {
        &self.column_upper
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn build_incrementally() {
        let mut model = Model::new(Objective::Minimize);
        let row = model.add_row(2.0, f64::INFINITY);
        let x = model.add_column(1.0, 0.0, 3.0, &[(row, 1.0)]);
        let y = model.add_column(1.0, 0.0, 3.0, &[(row, 1.0)]);

        assert_eq!((model.nr_rows(), model.nr_columns()), (1, 2));
        assert_eq!(model.constraints().get(row, x), Some(&1.0));
        assert_eq!(model.constraints().get(row, y), Some(&1.0));
        assert_eq!(model.validate(), Ok(()));
    }

    #[test]
    fn validation_catches_crossing_bounds() {
        let mut model = Model::new(Objective::Minimize);
        model.add_column(1.0, 1.0, 0.0, &[]);
        assert_eq!(
            model.validate(),
            Err(ModelError::ColumnBounds { index: 0, lower: 1.0, upper: 0.0 }),
        );
    }

    #[test]
    fn validation_catches_empty() {
        let model = Model::new(Objective::Minimize);
        assert_eq!(model.validate(), Err(ModelError::Empty));
    }
}
