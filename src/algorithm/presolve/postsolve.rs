//! # Postsolve
//!
//! Every presolve rule records a [`Transformation`] with exactly the data its inversion needs.
//! Replaying the stack last in, first out turns a solution of the reduced problem into one of
//! the original problem: eliminated primal values are recomputed, duals are attributed back to
//! removed rows, and basis statuses are filled in so the result can warm start the original.
//!
//! All indices inside transformations refer to the original problem.
use crate::data::linear_algebra::SparseTuple;
use crate::data::linear_program::elements::{BasisStatus, SolveStatus};
use crate::data::linear_program::model::Model;
use crate::data::linear_program::solution::Solution;

/// One reversible presolve reduction.
#[derive(Debug, PartialEq)]
pub enum Transformation {
    /// Row without live coefficients, always satisfied.
    EmptyRow {
        /// The removed row.
        row: usize,
    },
    /// Row implied by the bounds of its variables.
    RedundantRow {
        /// The removed row.
        row: usize,
    },
    /// Row with a single nonzero, folded into a bound of its column.
    SingletonRow {
        /// The removed row.
        row: usize,
        /// The column holding the row's only nonzero.
        column: usize,
        /// That nonzero.
        coefficient: f64,
        /// Whether the implied lower bound replaced the column's own.
        tightened_lower: bool,
        /// Whether the implied upper bound replaced the column's own.
        tightened_upper: bool,
    },
    /// Column pinned at `value` and substituted out of its rows.
    FixedColumn {
        /// The removed column.
        column: usize,
        /// The value it was pinned at.
        value: f64,
        /// Its objective coefficient.
        cost: f64,
        /// The `(row, coefficient)` pairs that were live at elimination time.
        entries: Vec<SparseTuple<f64>>,
        /// The basis status to restore it with.
        status: BasisStatus,
    },
    /// Free column with a single nonzero: the variable absorbs whatever its row needs, so both
    /// leave the problem.
    FreeSingleton {
        /// The eliminated column.
        column: usize,
        /// The row it was solved from, removed with it.
        row: usize,
        /// The column's nonzero in that row.
        coefficient: f64,
        /// The column's objective coefficient.
        cost: f64,
        /// The row's live entries at elimination time, the eliminated column included.
        row_entries: Vec<SparseTuple<f64>>,
        /// The row bound the substitution settled on.
        rhs: f64,
        /// Whether `rhs` is the row's lower bound.
        rhs_is_lower: bool,
    },
    /// `eliminated` expressed as `(rhs − kept_coefficient · x_kept) / eliminated_coefficient`
    /// from an equality row with exactly two nonzeros.
    DoubletonEquality {
        /// The removed equality row.
        row: usize,
        /// The substituted-out column.
        eliminated: usize,
        /// The column the substitution was folded into.
        kept: usize,
        /// The eliminated column's coefficient in the row.
        eliminated_coefficient: f64,
        /// The kept column's coefficient in the row.
        kept_coefficient: f64,
        /// The equality right hand side.
        rhs: f64,
        /// The eliminated column's objective coefficient.
        eliminated_cost: f64,
        /// The kept column's bounds before the implied ones were folded in.
        kept_bounds: (f64, f64),
    },
    /// `removed` is `ratio` times `kept`; the tighter bound combination went onto `kept`.
    DuplicateRow {
        /// The surviving row.
        kept: usize,
        /// The removed proportional row.
        removed: usize,
        /// `removed = ratio · kept`, entrywise.
        ratio: f64,
        /// The kept row's bounds before the merge.
        kept_bounds: (f64, f64),
    },
    /// `removed`'s column is `ratio > 0` times `kept`'s with matching cost ratio; their bound
    /// intervals were summed onto `kept`.
    DuplicateColumn {
        /// The surviving column.
        kept: usize,
        /// The removed proportional column.
        removed: usize,
        /// `removed = ratio · kept`, entrywise.
        ratio: f64,
        /// The kept column's bounds before the merge.
        kept_bounds: (f64, f64),
        /// The removed column's bounds.
        removed_bounds: (f64, f64),
    },
}

/// The recorded reductions plus the original problem dimensions.
#[derive(Debug, Default)]
pub struct PresolveStack {
    transformations: Vec<Transformation>,
    nr_rows: usize,
    nr_columns: usize,
}

impl PresolveStack {
    /// An empty stack for a problem of the given original size.
    #[must_use]
    pub fn new(nr_rows: usize, nr_columns: usize) -> Self {
        Self { transformations: Vec::new(), nr_rows, nr_columns }
    }

    /// Record a reduction.
    pub fn push(&mut self, transformation: Transformation) {
        self.transformations.push(transformation);
    }

    /// Number of recorded reductions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transformations.len()
    }

    /// Whether nothing was reduced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transformations.is_empty()
    }

    /// Undo all reductions on a solution of the reduced problem.
    ///
    /// # Arguments
    ///
    /// * `model`: The original, unreduced model; used to recompute row activities.
    /// * `reduced`: Solution of the reduced problem.
    /// * `original_row` / `original_column`: Original index of each reduced row / column.
    #[must_use]
    pub fn postsolve(
        &self,
        model: &Model,
        reduced: &Solution,
        original_row: &[usize],
        original_column: &[usize],
    ) -> Solution {
        debug_assert_eq!(original_row.len(), reduced.primal_rows.len());
        debug_assert_eq!(original_column.len(), reduced.primal_columns.len());

        let mut solution = Solution::empty(self.nr_rows, self.nr_columns);
        solution.status = reduced.status;
        solution.objective_value = reduced.objective_value;
        solution.iterations = reduced.iterations;
        // Removed rows default to inactive with a basic slack until a transformation says
        // otherwise; removed columns are filled in by the replay below.
        for status in &mut solution.row_status {
            *status = BasisStatus::Basic;
        }

        for (reduced_index, &original) in original_column.iter().enumerate() {
            solution.primal_columns[original] = reduced.primal_columns[reduced_index];
            solution.dual_columns[original] = reduced.dual_columns[reduced_index];
            solution.column_status[original] = reduced.column_status[reduced_index];
        }
        for (reduced_index, &original) in original_row.iter().enumerate() {
            solution.dual_rows[original] = reduced.dual_rows[reduced_index];
            solution.row_status[original] = reduced.row_status[reduced_index];
        }

        for transformation in self.transformations.iter().rev() {
            Self::undo(transformation, &mut solution);
        }

        // Activities and the objective, restored and surviving parts alike, are recomputed
        // against the original problem rather than trusted from the reduced one.
        for i in 0..self.nr_rows {
            solution.primal_rows[i] = 0.0;
        }
        let mut objective = model.objective_offset();
        for j in 0..self.nr_columns {
            let value = solution.primal_columns[j];
            objective += model.cost()[j] * value;
            if value != 0.0 {
                for &(i, coefficient) in model.constraints().column(j) {
                    solution.primal_rows[i] += coefficient * value;
                }
            }
        }
        if solution.status == SolveStatus::Optimal {
            solution.objective_value = objective;
        }
        solution
    }

    fn undo(transformation: &Transformation, solution: &mut Solution) {
        match transformation {
            Transformation::EmptyRow { row } | Transformation::RedundantRow { row } => {
                solution.dual_rows[*row] = 0.0;
                solution.row_status[*row] = BasisStatus::Basic;
            },
            Transformation::SingletonRow {
                row, column, coefficient, tightened_lower, tightened_upper,
            } => {
                // The reduced cost moves onto the row's dual only when the bound the column
                // rests on was implied by this row; at its own bound the row is slack.
                let status = solution.column_status[*column];
                let row_binds = match status {
                    BasisStatus::AtLower => *tightened_lower,
                    BasisStatus::AtUpper => *tightened_upper,
                    BasisStatus::Fixed => *tightened_lower || *tightened_upper,
                    _ => false,
                };
                if row_binds {
                    let reduced_cost = solution.dual_columns[*column];
                    solution.dual_rows[*row] = reduced_cost / coefficient;
                    solution.dual_columns[*column] = 0.0;
                    // A negative coefficient swaps which row bound produced the column bound.
                    solution.row_status[*row] = match (status, *coefficient > 0.0) {
                        (BasisStatus::AtLower, true) | (BasisStatus::AtUpper, false) => {
                            BasisStatus::AtLower
                        },
                        (BasisStatus::AtLower, false) | (BasisStatus::AtUpper, true) => {
                            BasisStatus::AtUpper
                        },
                        (other, _) => other,
                    };
                    solution.column_status[*column] = BasisStatus::Basic;
                } else {
                    solution.dual_rows[*row] = 0.0;
                    solution.row_status[*row] = BasisStatus::Basic;
                }
            },
            Transformation::FixedColumn { column, value, cost, entries, status } => {
                solution.primal_columns[*column] = *value;
                solution.column_status[*column] = *status;
                let mut reduced_cost = *cost;
                for &(row, coefficient) in entries {
                    reduced_cost -= solution.dual_rows[row] * coefficient;
                }
                solution.dual_columns[*column] = reduced_cost;
            },
            Transformation::FreeSingleton {
                column, row, coefficient, cost, row_entries, rhs, rhs_is_lower,
            } => {
                let mut activity = 0.0;
                for &(other, other_coefficient) in row_entries {
                    if other != *column {
                        activity += other_coefficient * solution.primal_columns[other];
                    }
                }
                solution.primal_columns[*column] = (rhs - activity) / coefficient;
                solution.column_status[*column] = BasisStatus::Basic;
                solution.dual_columns[*column] = 0.0;
                solution.dual_rows[*row] = cost / coefficient;
                solution.row_status[*row] = if *rhs_is_lower {
                    BasisStatus::AtLower
                } else {
                    BasisStatus::AtUpper
                };
            },
            Transformation::DoubletonEquality {
                row, eliminated, kept, eliminated_coefficient, kept_coefficient, rhs,
                eliminated_cost, kept_bounds: _,
            } => {
                let kept_value = solution.primal_columns[*kept];
                solution.primal_columns[*eliminated] =
                    (rhs - kept_coefficient * kept_value) / eliminated_coefficient;
                solution.column_status[*eliminated] = BasisStatus::Basic;
                solution.dual_columns[*eliminated] = 0.0;
                // The eliminated variable is basic in the restored row, so its reduced cost is
                // zero there, which pins the row's dual.
                let dual = eliminated_cost / eliminated_coefficient;
                solution.dual_rows[*row] = dual;
                solution.row_status[*row] = BasisStatus::Fixed;
                solution.dual_columns[*kept] -= dual * kept_coefficient;
            },
            Transformation::DuplicateRow { kept: _, removed, ratio: _, kept_bounds: _ } => {
                solution.dual_rows[*removed] = 0.0;
                solution.row_status[*removed] = BasisStatus::Basic;
            },
            Transformation::DuplicateColumn {
                kept, removed, ratio, kept_bounds, removed_bounds,
            } => {
                // Split the merged value: the kept column takes what fits within its own
                // bounds, the removed column absorbs the remainder.
                let merged = solution.primal_columns[*kept];
                // Feasible kept values form the intersection of the kept bounds with
                // `[merged − ratio·u_removed, merged − ratio·l_removed]`, nonempty because the
                // merged bounds were the interval sum.
                let kept_value = kept_bounds.0
                    .max(merged - ratio * removed_bounds.1)
                    .min(kept_bounds.1)
                    .min(merged - ratio * removed_bounds.0);
                solution.primal_columns[*kept] = kept_value;
                solution.primal_columns[*removed] = (merged - kept_value) / ratio;
                solution.dual_columns[*removed] = ratio * solution.dual_columns[*kept];
                solution.column_status[*removed] = if solution.column_status[*kept].is_basic() {
                    BasisStatus::AtLower
                } else {
                    solution.column_status[*kept]
                };
            },
        }
    }
}
