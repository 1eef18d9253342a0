//! # Presolve
//!
//! Shrinking a problem before handing it to a solver. Rules are not applied by scanning the
//! whole problem over and over: work queues hold the rows and columns whose state changed, and
//! every applied rule re-queues the neighbors it touched. Each reduction pushes a reversible
//! [`Transformation`](postsolve::Transformation) so [`postsolve`] can map a solution of the
//! reduced problem back to the original.
//!
//! All indices in this module refer to the original problem; compaction to the reduced index
//! space happens once at the very end.
use fifo_set::FIFOSet;
use index_utils::{remove_indices, remove_sparse_indices};
use log::{debug, info};

use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::SparseTuple;
use crate::data::linear_program::elements::Objective;
use crate::data::linear_program::model::Model;

pub mod postsolve;
mod rule;

pub use postsolve::{PresolveStack, Transformation};

/// What presolve concluded about the problem.
#[derive(Debug)]
pub enum PresolveResult {
    /// A smaller equivalent problem, with the data postsolve needs to undo the shrinking.
    Reduced(ReducedProblem),
    /// A bound or activity conflict proves there is no feasible point.
    Infeasible,
    /// A cost-improving direction without any blocking bound or constraint exists.
    Unbounded,
    /// Every row and column was eliminated; the solution is fully determined by the stack.
    Empty(PresolveStack),
}

/// The reduced problem plus its mapping back to original indices.
#[derive(Debug)]
pub struct ReducedProblem {
    /// The smaller equivalent problem.
    pub model: Model,
    /// The reductions that produced it, in application order.
    pub stack: PresolveStack,
    /// Original index of each reduced row.
    pub original_row: Vec<usize>,
    /// Original index of each reduced column.
    pub original_column: Vec<usize>,
}

/// Mutable working copy of the problem, in original index space.
///
/// The matrix is kept in both orientations, physically updated together, so row rules and
/// column rules both have their natural access pattern.
pub(super) struct Work {
    pub objective: Objective,
    pub offset: f64,
    pub cost: Vec<f64>,
    pub column_lower: Vec<f64>,
    pub column_upper: Vec<f64>,
    pub row_lower: Vec<f64>,
    pub row_upper: Vec<f64>,
    /// Per row, its live `(column, value)` entries.
    pub rows: Vec<Vec<SparseTuple<f64>>>,
    /// Per column, its live `(row, value)` entries.
    pub columns: Vec<Vec<SparseTuple<f64>>>,
    pub row_alive: Vec<bool>,
    pub column_alive: Vec<bool>,
    pub tolerance: f64,
}

impl Work {
    fn from_model(model: &Model, tolerance: f64) -> Self {
        let nr_rows = model.nr_rows();
        let nr_columns = model.nr_columns();
        let mut rows = vec![Vec::new(); nr_rows];
        let mut columns = vec![Vec::new(); nr_columns];
        for j in 0..nr_columns {
            for &(i, value) in model.constraints().column(j) {
                rows[i].push((j, value));
                columns[j].push((i, value));
            }
        }
        Self {
            objective: model.objective(),
            offset: model.objective_offset(),
            cost: model.cost().to_vec(),
            column_lower: model.column_lower().to_vec(),
            column_upper: model.column_upper().to_vec(),
            row_lower: model.row_lower().to_vec(),
            row_upper: model.row_upper().to_vec(),
            rows,
            columns,
            row_alive: vec![true; nr_rows],
            column_alive: vec![true; nr_columns],
            tolerance,
        }
    }

    /// Remove one coefficient from both orientations.
    pub fn remove_entry(&mut self, row: usize, column: usize) {
        self.rows[row].retain(|&(j, _)| j != column);
        self.columns[column].retain(|&(i, _)| i != row);
    }

    /// Add `delta` to a coefficient, creating or removing the entry as needed.
    pub fn add_to_entry(&mut self, row: usize, column: usize, delta: f64) {
        let existing = self.rows[row].iter().position(|&(j, _)| j == column);
        match existing {
            Some(position) => {
                let updated = self.rows[row][position].1 + delta;
                if updated.abs() <= self.tolerance {
                    self.remove_entry(row, column);
                } else {
                    self.rows[row][position].1 = updated;
                    let in_column = self.columns[column].iter()
                        .position(|&(i, _)| i == row)
                        .expect("orientations out of sync");
                    self.columns[column][in_column].1 = updated;
                }
            },
            None if delta.abs() > self.tolerance => {
                self.rows[row].push((column, delta));
                self.columns[column].push((row, delta));
            },
            None => {},
        }
    }

    /// Mark a row dead and detach its entries from the columns they sit in.
    ///
    /// # Return value
    ///
    /// The columns that lost an entry.
    pub fn kill_row(&mut self, row: usize) -> Vec<usize> {
        debug_assert!(self.row_alive[row]);
        self.row_alive[row] = false;
        let entries = std::mem::take(&mut self.rows[row]);
        let mut touched = Vec::with_capacity(entries.len());
        for (column, _) in entries {
            self.columns[column].retain(|&(i, _)| i != row);
            touched.push(column);
        }
        touched
    }

    /// Mark a column dead and detach its entries from the rows they sit in.
    ///
    /// # Return value
    ///
    /// The rows that lost an entry.
    pub fn kill_column(&mut self, column: usize) -> Vec<usize> {
        debug_assert!(self.column_alive[column]);
        self.column_alive[column] = false;
        let entries = std::mem::take(&mut self.columns[column]);
        let mut touched = Vec::with_capacity(entries.len());
        for (row, _) in entries {
            self.rows[row].retain(|&(j, _)| j != column);
            touched.push(row);
        }
        touched
    }

    /// Lower and upper bound on a row's activity from the current column bounds.
    pub fn activity_bounds(&self, row: usize) -> (f64, f64) {
        let mut minimum = 0.0;
        let mut maximum = 0.0;
        for &(column, value) in &self.rows[row] {
            let (lower, upper) = (self.column_lower[column], self.column_upper[column]);
            if value > 0.0 {
                minimum += value * lower;
                maximum += value * upper;
            } else {
                minimum += value * upper;
                maximum += value * lower;
            }
        }
        (minimum, maximum)
    }
}

/// Presolve driver state: the working problem, the undo stack and the work queues.
pub(super) struct Presolver {
    pub work: Work,
    pub stack: PresolveStack,
    pub row_queue: FIFOSet<usize>,
    pub column_queue: FIFOSet<usize>,
    /// Set on rule application that proves infeasibility or unboundedness.
    pub conclusion: Option<Conclusion>,
}

/// Early terminal conclusion reached while reducing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum Conclusion {
    Infeasible,
    Unbounded,
}

/// Reduce a model.
///
/// # Arguments
///
/// * `tolerance`: Feasibility tolerance used for bound comparisons and coefficient drops.
/// * `max_passes`: Upper bound on full queue drains, keeping slowly converging bound
///   tightening from running forever.
#[must_use]
pub fn presolve(model: &Model, tolerance: f64, max_passes: usize) -> PresolveResult {
    let nr_rows = model.nr_rows();
    let nr_columns = model.nr_columns();
    let mut presolver = Presolver {
        work: Work::from_model(model, tolerance),
        stack: PresolveStack::new(nr_rows, nr_columns),
        row_queue: (0..nr_rows).collect(),
        column_queue: (0..nr_columns).collect(),
        conclusion: None,
    };

    for pass in 0..max_passes {
        let before = presolver.stack.len();
        while presolver.conclusion.is_none() {
            if let Some(column) = presolver.column_queue.pop() {
                presolver.process_column(column);
            } else if let Some(row) = presolver.row_queue.pop() {
                presolver.process_row(row);
            } else {
                break;
            }
        }
        if presolver.conclusion.is_none() {
            presolver.merge_duplicate_rows();
            presolver.merge_duplicate_columns();
        }
        match presolver.conclusion {
            Some(Conclusion::Infeasible) => {
                info!("presolve proved infeasibility in pass {pass}");
                return PresolveResult::Infeasible;
            },
            Some(Conclusion::Unbounded) => {
                info!("presolve proved unboundedness in pass {pass}");
                return PresolveResult::Unbounded;
            },
            None => {},
        }
        // A pass without reductions means a fixed point was reached.
        if presolver.stack.len() == before
            && presolver.row_queue.len() == 0
            && presolver.column_queue.len() == 0
        {
            break;
        }
    }

    let work = presolver.work;
    let original_column: Vec<usize> = (0..nr_columns)
        .filter(|&j| work.column_alive[j])
        .collect();
    if original_column.is_empty() {
        info!("presolve eliminated the entire problem ({} reductions)", presolver.stack.len());
        return PresolveResult::Empty(presolver.stack);
    }
    let original_row: Vec<usize> = (0..nr_rows).filter(|&i| work.row_alive[i]).collect();
    let dead_row: Vec<usize> = (0..nr_rows).filter(|&i| !work.row_alive[i]).collect();
    let dead_column: Vec<usize> = (0..nr_columns).filter(|&j| !work.column_alive[j]).collect();

    // Compact to the reduced index space.
    let mut columns = work.columns;
    remove_indices(&mut columns, &dead_column);
    for column in &mut columns {
        column.sort_unstable_by_key(|&(i, _)| i);
        remove_sparse_indices(column, &dead_row);
    }
    let constraints = SparseMatrix::from_columns(original_row.len(), columns);
    let mut row_bounds: Vec<(f64, f64)> = work.row_lower.into_iter()
        .zip(work.row_upper)
        .collect();
    remove_indices(&mut row_bounds, &dead_row);
    let mut column_bounds: Vec<(f64, f64)> = work.column_lower.into_iter()
        .zip(work.column_upper)
        .collect();
    remove_indices(&mut column_bounds, &dead_column);
    let mut cost = work.cost;
    remove_indices(&mut cost, &dead_column);
    let mut reduced = Model::from_parts(
        work.objective,
        constraints,
        row_bounds,
        column_bounds,
        cost,
    );
    reduced.set_objective_offset(work.offset);

    debug!(
        "presolve: {nr_rows}x{nr_columns} -> {}x{} in {} reductions",
        original_row.len(), original_column.len(), presolver.stack.len(),
    );
    PresolveResult::Reduced(ReducedProblem {
        model: reduced,
        stack: presolver.stack,
        original_row,
        original_column,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::linear_program::elements::{BasisStatus, SolveStatus};
    use crate::data::linear_program::solution::Solution;

    #[test]
    fn fixed_point_on_irreducible_problem() {
        // Two ranged rows over two bounded columns, nothing to reduce.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(1.0, 4.0);
        model.add_row(0.0, 3.0);
        model.add_column(1.0, 0.0, 5.0, &[(0, 1.0), (1, 2.0)]);
        model.add_column(2.0, 0.0, 5.0, &[(0, 2.0), (1, -1.0)]);

        match presolve(&model, 1e-9, 10) {
            PresolveResult::Reduced(reduced) => {
                assert_eq!(reduced.model.nr_rows(), 2);
                assert_eq!(reduced.model.nr_columns(), 2);
                assert!(reduced.stack.is_empty());
            },
            other => panic!("expected a reduced problem, got {other:?}"),
        }
    }

    #[test]
    fn empty_row_is_removed() {
        // Row 1 keeps two columns with unrelated costs, so only the empty row goes.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(-1.0, 1.0);
        model.add_row(1.0, 4.0);
        model.add_column(1.0, 0.0, 5.0, &[(1, 1.0)]);
        model.add_column(5.0, 0.0, 5.0, &[(1, 2.0)]);

        match presolve(&model, 1e-9, 10) {
            PresolveResult::Reduced(reduced) => {
                assert_eq!(reduced.model.nr_rows(), 1);
                assert_eq!(reduced.original_row, vec![1]);
            },
            other => panic!("expected a reduced problem, got {other:?}"),
        }
    }

    #[test]
    fn folded_row_stays_slack_when_the_column_bound_binds() {
        // min x with 2x in [0, 8] and x in [1, 3]: x rests on its own lower bound, so the row
        // is slack and the unit reduced cost stays on the column.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(0.0, 8.0);
        model.add_column(1.0, 1.0, 3.0, &[(0, 2.0)]);

        let PresolveResult::Empty(stack) = presolve(&model, 1e-9, 10) else {
            panic!("expected the problem to empty out");
        };
        let reduced = Solution {
            status: SolveStatus::Optimal,
            ..Solution::empty(0, 0)
        };
        let solution = stack.postsolve(&model, &reduced, &[], &[]);
        assert_eq!(solution.primal_columns, vec![1.0]);
        assert_eq!(solution.dual_rows, vec![0.0]);
        assert_eq!(solution.dual_columns, vec![1.0]);
        assert_eq!(solution.row_status[0], BasisStatus::Basic);
    }

    #[test]
    fn folded_row_carries_the_dual_when_its_bound_binds() {
        // min x with 2x in [2, 8] and x in [0, 3]: the row's lower bound implies x >= 1 and
        // binds, so the reduced cost belongs to the row as a dual of 1/2.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(2.0, 8.0);
        model.add_column(1.0, 0.0, 3.0, &[(0, 2.0)]);

        let PresolveResult::Empty(stack) = presolve(&model, 1e-9, 10) else {
            panic!("expected the problem to empty out");
        };
        let reduced = Solution {
            status: SolveStatus::Optimal,
            ..Solution::empty(0, 0)
        };
        let solution = stack.postsolve(&model, &reduced, &[], &[]);
        assert_eq!(solution.primal_columns, vec![1.0]);
        assert_eq!(solution.dual_rows, vec![0.5]);
        assert_eq!(solution.dual_columns, vec![0.0]);
        assert_eq!(solution.row_status[0], BasisStatus::AtLower);
        assert_eq!(solution.column_status[0], BasisStatus::Basic);
    }

    #[test]
    fn maximize_model_keeps_profitable_columns() {
        // Under maximization the positive costs make both columns worth increasing; a rule
        // reading the raw cost sign would pin them to their lower bounds.
        let mut model = Model::new(Objective::Maximize);
        model.add_row(f64::NEG_INFINITY, 4.0);
        model.add_column(3.0, 0.0, 3.0, &[(0, 1.0)]);
        model.add_column(2.0, 0.0, 3.0, &[(0, 1.0)]);

        match presolve(&model, 1e-9, 10) {
            PresolveResult::Reduced(reduced) => {
                assert_eq!(reduced.model.nr_columns(), 2);
                assert!(reduced.stack.is_empty());
            },
            other => panic!("expected a reduced problem, got {other:?}"),
        }
    }

    #[test]
    fn maximize_empty_column_goes_to_its_paying_bound() {
        // A column with no live coefficients sits at the bound the orientation rewards.
        let mut model = Model::new(Objective::Maximize);
        model.add_column(3.0, 0.0, 5.0, &[]);

        let PresolveResult::Empty(stack) = presolve(&model, 1e-9, 10) else {
            panic!("expected the problem to empty out");
        };
        let reduced = Solution {
            status: SolveStatus::Optimal,
            ..Solution::empty(0, 0)
        };
        let solution = stack.postsolve(&model, &reduced, &[], &[]);
        assert_eq!(solution.primal_columns, vec![5.0]);
    }

    #[test]
    fn crossed_bounds_are_infeasible() {
        let mut model = Model::new(Objective::Minimize);
        model.add_row(0.0, 1.0);
        model.add_column(1.0, 2.0, 1.0, &[(0, 1.0)]);

        assert!(matches!(presolve(&model, 1e-9, 10), PresolveResult::Infeasible));
    }

    #[test]
    fn fixed_column_cascades_to_empty() {
        // x fixed at 2 turns `x + y in [3, 5]` into `y in [1, 3]`; the singleton row folds into
        // a bound on y, and y then sits at its cheapest bound. Nothing is left to solve.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(3.0, 5.0);
        model.add_column(1.0, 2.0, 2.0, &[(0, 1.0)]);
        model.add_column(1.0, 0.0, 10.0, &[(0, 1.0)]);

        let PresolveResult::Empty(stack) = presolve(&model, 1e-9, 10) else {
            panic!("expected the problem to empty out");
        };
        let reduced = Solution {
            status: SolveStatus::Optimal,
            ..Solution::empty(0, 0)
        };
        let solution = stack.postsolve(&model, &reduced, &[], &[]);
        assert_eq!(solution.primal_columns, vec![2.0, 1.0]);
        assert!((solution.primal_rows[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn fully_determined_problem_postsolves() {
        // Both variables fixed; presolve empties the problem and postsolve rebuilds the point.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(f64::NEG_INFINITY, 10.0);
        model.add_column(1.0, 2.0, 2.0, &[(0, 1.0)]);
        model.add_column(3.0, -1.0, -1.0, &[(0, 1.0)]);

        let PresolveResult::Empty(stack) = presolve(&model, 1e-9, 10) else {
            panic!("expected the problem to empty out");
        };
        let reduced = Solution {
            status: SolveStatus::Optimal,
            ..Solution::empty(0, 0)
        };
        let solution = stack.postsolve(&model, &reduced, &[], &[]);
        assert_eq!(solution.primal_columns, vec![2.0, -1.0]);
        assert!((solution.primal_rows[0] - 1.0).abs() < 1e-12);
    }
}
