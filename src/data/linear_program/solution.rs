//! # Representation of solve results
//!
//! A solve call always produces a `Solution`: a status plus whatever iterate was reached. Callers
//! branch on the status; the vectors are in the original model's indexing, also when the solve
//! went through a presolve reduction.
use crate::data::linear_program::elements::{BasisStatus, SolveStatus};

/// A certificate ray accompanying an infeasible or unbounded status.
#[derive(Clone, Debug, PartialEq)]
pub enum Ray {
    /// A direction in column space along which the objective improves without bound while all
    /// constraints stay satisfied. Reported with `SolveStatus::DualInfeasible`.
    Primal(Vec<f64>),
    /// A Farkas certificate in row space proving primal infeasibility. Reported with
    /// `SolveStatus::PrimalInfeasible`.
    Dual(Vec<f64>),
}

/// The result of a solve call.
///
/// Created empty when a model is first solved, then overwritten by each solve call and consumed
/// by the caller until the next one.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// What the solve concluded.
    pub status: SolveStatus,
    /// Objective value of the reported iterate, including the model's objective offset, in the
    /// model's own optimization direction.
    pub objective_value: f64,
    /// Primal value per structural column.
    pub primal_columns: Vec<f64>,
    /// Row activity per constraint row.
    pub primal_rows: Vec<f64>,
    /// Dual price per constraint row.
    pub dual_rows: Vec<f64>,
    /// Reduced cost per structural column.
    pub dual_columns: Vec<f64>,
    /// Basis status per constraint row (the status of its slack).
    pub row_status: Vec<BasisStatus>,
    /// Basis status per structural column.
    pub column_status: Vec<BasisStatus>,
    /// Number of simplex or barrier iterations spent.
    pub iterations: usize,
    /// Certificate accompanying an infeasible or unbounded status.
    pub ray: Option<Ray>,
}

impl Solution {
    /// An all-zero solution of the right shape, with every variable at its lower bound.
    #[must_use]
    pub fn empty(nr_rows: usize, nr_columns: usize) -> Self {
        Self {
            status: SolveStatus::NumericalDifficulties,
            objective_value: 0.0,
            primal_columns: vec![0.0; nr_columns],
            primal_rows: vec![0.0; nr_rows],
            dual_rows: vec![0.0; nr_rows],
            dual_columns: vec![0.0; nr_columns],
            row_status: vec![BasisStatus::Basic; nr_rows],
            column_status: vec![BasisStatus::AtLower; nr_columns],
            iterations: 0,
            ray: None,
        }
    }
}
