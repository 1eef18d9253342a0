//! # Reduction rules
//!
//! Each rule inspects one row or column, applies its reduction to the working problem, records
//! the matching [`Transformation`] and re-queues whatever it touched. Rules must keep the two
//! matrix orientations in sync; all mutation goes through the [`Work`] helpers.
use std::collections::HashMap;

use log::trace;

use crate::algorithm::presolve::{Conclusion, Presolver, Transformation};
use crate::data::linear_program::elements::BasisStatus;

/// Relative improvement a tightened bound must show to count, guarding against endless
/// convergence of bound tightening.
const MEANINGFUL: f64 = 1e-6;

impl Presolver {
    fn queue_row(&mut self, row: usize) {
        if self.work.row_alive[row] {
            self.row_queue.push(row);
        }
    }

    fn queue_column(&mut self, column: usize) {
        if self.work.column_alive[column] {
            self.column_queue.push(column);
        }
    }

    /// Apply all column rules to one column.
    pub(super) fn process_column(&mut self, column: usize) {
        if self.conclusion.is_some() || !self.work.column_alive[column] {
            return;
        }
        let tolerance = self.work.tolerance;
        let (lower, upper) = (self.work.column_lower[column], self.work.column_upper[column]);

        if lower > upper + tolerance {
            self.conclusion = Some(Conclusion::Infeasible);
            return;
        }
        if upper - lower <= tolerance {
            self.substitute_fixed(column, lower, BasisStatus::Fixed);
            return;
        }
        if self.work.columns[column].is_empty() {
            self.fix_unconstrained(column, lower, upper);
            return;
        }
        if self.work.columns[column].len() == 1
            && lower == f64::NEG_INFINITY
            && upper == f64::INFINITY
        {
            self.eliminate_free_singleton(column);
            return;
        }
        self.fix_dominated(column, lower, upper);
    }

    /// Apply all row rules to one row.
    pub(super) fn process_row(&mut self, row: usize) {
        if self.conclusion.is_some() || !self.work.row_alive[row] {
            return;
        }
        let tolerance = self.work.tolerance;
        let (lower, upper) = (self.work.row_lower[row], self.work.row_upper[row]);

        if lower > upper + tolerance {
            self.conclusion = Some(Conclusion::Infeasible);
            return;
        }
        if lower == f64::NEG_INFINITY && upper == f64::INFINITY {
            self.remove_redundant(row);
            return;
        }
        if self.work.rows[row].is_empty() {
            if lower > tolerance || upper < -tolerance {
                self.conclusion = Some(Conclusion::Infeasible);
                return;
            }
            self.work.row_alive[row] = false;
            self.stack.push(Transformation::EmptyRow { row });
            return;
        }
        if self.work.rows[row].len() == 1 {
            self.fold_singleton_row(row);
            return;
        }
        if self.work.rows[row].len() == 2 && upper - lower <= tolerance {
            self.eliminate_doubleton(row);
            return;
        }

        let (minimum, maximum) = self.work.activity_bounds(row);
        if minimum > upper + tolerance || maximum < lower - tolerance {
            self.conclusion = Some(Conclusion::Infeasible);
            return;
        }
        if minimum >= lower - tolerance && maximum <= upper + tolerance {
            self.remove_redundant(row);
            return;
        }
        if minimum.is_finite() && minimum >= upper - tolerance {
            self.force_row(row, true);
            return;
        }
        if maximum.is_finite() && maximum <= lower + tolerance {
            self.force_row(row, false);
            return;
        }
        self.tighten_from_activity(row, minimum, maximum);
    }

    /// Pin a column at `value` and fold it into its rows' bounds and the objective.
    fn substitute_fixed(&mut self, column: usize, value: f64, status: BasisStatus) {
        trace!("fixing column {column} at {value}");
        let entries = self.work.columns[column].clone();
        self.work.offset += self.work.cost[column] * value;
        for &(row, coefficient) in &entries {
            self.work.row_lower[row] -= coefficient * value;
            self.work.row_upper[row] -= coefficient * value;
        }
        let touched = self.work.kill_column(column);
        self.stack.push(Transformation::FixedColumn {
            column,
            value,
            cost: self.work.cost[column],
            entries,
            status,
        });
        for row in touched {
            self.queue_row(row);
        }
    }

    /// A column without live coefficients goes to the bound its cost prefers.
    fn fix_unconstrained(&mut self, column: usize, lower: f64, upper: f64) {
        // Sign reasoning happens in minimize orientation.
        let cost = self.work.objective.direction() * self.work.cost[column];
        let tolerance = self.work.tolerance;
        let (value, status) = if cost > tolerance {
            if lower == f64::NEG_INFINITY {
                self.conclusion = Some(Conclusion::Unbounded);
                return;
            }
            (lower, BasisStatus::AtLower)
        } else if cost < -tolerance {
            if upper == f64::INFINITY {
                self.conclusion = Some(Conclusion::Unbounded);
                return;
            }
            (upper, BasisStatus::AtUpper)
        } else if lower.is_finite() {
            (lower, BasisStatus::AtLower)
        } else if upper.is_finite() {
            (upper, BasisStatus::AtUpper)
        } else {
            (0.0, BasisStatus::Free)
        };
        self.substitute_fixed(column, value, status);
    }

    /// A free column with a single coefficient absorbs whatever its row requires: both leave.
    ///
    /// The eliminated variable's cost moves onto the row's other columns through the implied
    /// substitution `x = (rhs − rest) / a`.
    fn eliminate_free_singleton(&mut self, column: usize) {
        let (row, coefficient) = self.work.columns[column][0];
        let dual = self.work.cost[column] / coefficient;
        // The bound choice reasons in minimize orientation; the algebra below stays in the
        // model's own orientation.
        let signed_dual = self.work.objective.direction() * dual;
        let tolerance = self.work.tolerance;
        let (row_lower, row_upper) = (self.work.row_lower[row], self.work.row_upper[row]);

        // The row settles on the bound the dual's sign selects.
        let (rhs, rhs_is_lower) = if row_upper - row_lower <= tolerance {
            (row_lower, true)
        } else if signed_dual > tolerance {
            if row_lower == f64::NEG_INFINITY {
                self.conclusion = Some(Conclusion::Unbounded);
                return;
            }
            (row_lower, true)
        } else if signed_dual < -tolerance {
            if row_upper == f64::INFINITY {
                self.conclusion = Some(Conclusion::Unbounded);
                return;
            }
            (row_upper, false)
        } else if row_lower.is_finite() {
            (row_lower, true)
        } else if row_upper.is_finite() {
            (row_upper, false)
        } else {
            // A fully free row is the redundant row rule's business.
            self.queue_row(row);
            return;
        };

        trace!("free singleton column {column} solved from row {row}");
        let row_entries = self.work.rows[row].clone();
        self.work.offset += dual * rhs;
        for &(other, other_coefficient) in &row_entries {
            if other != column {
                self.work.cost[other] -= dual * other_coefficient;
            }
        }
        let touched = self.work.kill_row(row);
        self.work.column_alive[column] = false;
        self.stack.push(Transformation::FreeSingleton {
            column,
            row,
            coefficient,
            cost: self.work.cost[column],
            row_entries,
            rhs,
            rhs_is_lower,
        });
        for other in touched {
            if other != column {
                self.queue_column(other);
            }
        }
    }

    /// Fix a column at a bound when neither the objective nor any constraint wants it anywhere
    /// else, a reduced cost bound argument with only infinite row bounds on one side.
    fn fix_dominated(&mut self, column: usize, lower: f64, upper: f64) {
        // Sign reasoning happens in minimize orientation.
        let cost = self.work.objective.direction() * self.work.cost[column];
        let tolerance = self.work.tolerance;

        let increase_useless = self.work.columns[column].iter().all(|&(row, value)| {
            if value > 0.0 {
                self.work.row_lower[row] == f64::NEG_INFINITY
            } else {
                self.work.row_upper[row] == f64::INFINITY
            }
        });
        if increase_useless && cost >= 0.0 {
            if lower == f64::NEG_INFINITY {
                if cost > tolerance {
                    self.conclusion = Some(Conclusion::Unbounded);
                }
                return;
            }
            self.substitute_fixed(column, lower, BasisStatus::AtLower);
            return;
        }

        let decrease_useless = self.work.columns[column].iter().all(|&(row, value)| {
            if value > 0.0 {
                self.work.row_upper[row] == f64::INFINITY
            } else {
                self.work.row_lower[row] == f64::NEG_INFINITY
            }
        });
        if decrease_useless && cost <= 0.0 {
            if upper == f64::INFINITY {
                if cost < -tolerance {
                    self.conclusion = Some(Conclusion::Unbounded);
                }
                return;
            }
            self.substitute_fixed(column, upper, BasisStatus::AtUpper);
        }
    }

    /// Remove a row that cannot be violated by any point within the column bounds.
    fn remove_redundant(&mut self, row: usize) {
        trace!("removing redundant row {row}");
        let touched = self.work.kill_row(row);
        self.stack.push(Transformation::RedundantRow { row });
        for column in touched {
            self.queue_column(column);
        }
    }

    /// A row with one coefficient is a bound on its column in disguise.
    fn fold_singleton_row(&mut self, row: usize) {
        let (column, coefficient) = self.work.rows[row][0];
        let (row_lower, row_upper) = (self.work.row_lower[row], self.work.row_upper[row]);
        let (implied_lower, implied_upper) = if coefficient > 0.0 {
            (row_lower / coefficient, row_upper / coefficient)
        } else {
            (row_upper / coefficient, row_lower / coefficient)
        };

        trace!("folding singleton row {row} into bounds of column {column}");
        self.work.kill_row(row);
        let tightened_lower = implied_lower > self.work.column_lower[column];
        let tightened_upper = implied_upper < self.work.column_upper[column];
        self.stack.push(Transformation::SingletonRow {
            row,
            column,
            coefficient,
            tightened_lower,
            tightened_upper,
        });
        if tightened_lower {
            self.work.column_lower[column] = implied_lower;
        }
        if tightened_upper {
            self.work.column_upper[column] = implied_upper;
        }
        self.queue_column(column);
    }

    /// Substitute one variable of an equality row with exactly two coefficients into the rest
    /// of the problem, eliminating both the row and the variable.
    fn eliminate_doubleton(&mut self, row: usize) {
        let entries = self.work.rows[row].clone();
        debug_assert_eq!(entries.len(), 2);
        // The larger coefficient is the divisor, for stability.
        let (&(eliminated, a), &(kept, b)) = if entries[0].1.abs() >= entries[1].1.abs() {
            (&entries[0], &entries[1])
        } else {
            (&entries[1], &entries[0])
        };
        let rhs = self.work.row_lower[row];

        // Bounds of the eliminated variable restrict the kept one.
        let (e_lower, e_upper) = (self.work.column_lower[eliminated], self.work.column_upper[eliminated]);
        let endpoint_a = (rhs - a * e_lower) / b;
        let endpoint_b = (rhs - a * e_upper) / b;
        let implied = (endpoint_a.min(endpoint_b), endpoint_a.max(endpoint_b));
        let kept_bounds = (self.work.column_lower[kept], self.work.column_upper[kept]);
        let new_lower = kept_bounds.0.max(implied.0);
        let new_upper = kept_bounds.1.min(implied.1);
        if new_lower > new_upper + self.work.tolerance {
            self.conclusion = Some(Conclusion::Infeasible);
            return;
        }
        self.work.column_lower[kept] = new_lower;
        self.work.column_upper[kept] = new_upper;

        trace!("doubleton equality row {row}: column {eliminated} := f(column {kept})");
        // Cost of the eliminated variable under the substitution.
        let eliminated_cost = self.work.cost[eliminated];
        let dual = eliminated_cost / a;
        self.work.offset += dual * rhs;
        self.work.cost[kept] -= dual * b;

        // Substitute into every other row the eliminated variable appears in.
        let other_rows: Vec<_> = self.work.columns[eliminated].iter()
            .copied()
            .filter(|&(r, _)| r != row)
            .collect();
        for (other, coefficient) in other_rows {
            let scale = coefficient / a;
            self.work.row_lower[other] -= scale * rhs;
            self.work.row_upper[other] -= scale * rhs;
            self.work.remove_entry(other, eliminated);
            self.work.add_to_entry(other, kept, -scale * b);
            self.queue_row(other);
        }
        self.work.kill_row(row);
        self.work.column_alive[eliminated] = false;
        self.work.columns[eliminated].clear();
        self.stack.push(Transformation::DoubletonEquality {
            row,
            eliminated,
            kept,
            eliminated_coefficient: a,
            kept_coefficient: b,
            rhs,
            eliminated_cost,
            kept_bounds,
        });
        self.queue_column(kept);
    }

    /// Fix every column of a forcing row at the bound that attains the forced activity.
    ///
    /// # Arguments
    ///
    /// * `at_minimum`: Whether the minimum activity equals the row's upper bound (otherwise the
    ///   maximum equals the lower bound).
    fn force_row(&mut self, row: usize, at_minimum: bool) {
        trace!("row {row} is forcing, fixing all its columns");
        let entries = self.work.rows[row].clone();
        for (column, value) in entries {
            let to_lower = (value > 0.0) == at_minimum;
            let bound = if to_lower {
                self.work.column_lower[column]
            } else {
                self.work.column_upper[column]
            };
            self.work.column_lower[column] = bound;
            self.work.column_upper[column] = bound;
            self.queue_column(column);
        }
        // Substituting the fixed columns empties the row; it leaves through the empty row rule.
        self.queue_row(row);
    }

    /// Bound tightening by domain propagation: each column's feasible range is limited by the
    /// row bounds minus what the other columns can contribute.
    fn tighten_from_activity(&mut self, row: usize, minimum: f64, maximum: f64) {
        let (row_lower, row_upper) = (self.work.row_lower[row], self.work.row_upper[row]);
        let entries = self.work.rows[row].clone();
        for (column, value) in entries {
            let (lower, upper) = (self.work.column_lower[column], self.work.column_upper[column]);
            // Activity range of the row without this column's contribution.
            let (own_minimum, own_maximum) = if value > 0.0 {
                (value * lower, value * upper)
            } else {
                (value * upper, value * lower)
            };
            let rest_minimum = minimum - own_minimum;
            let rest_maximum = maximum - own_maximum;

            let mut changed = false;
            if row_upper.is_finite() && rest_minimum.is_finite() {
                let limit = (row_upper - rest_minimum) / value;
                if value > 0.0 {
                    if limit < upper - MEANINGFUL * (1.0 + limit.abs()) {
                        self.work.column_upper[column] = limit;
                        changed = true;
                    }
                } else if limit > lower + MEANINGFUL * (1.0 + limit.abs()) {
                    self.work.column_lower[column] = limit;
                    changed = true;
                }
            }
            if row_lower.is_finite() && rest_maximum.is_finite() {
                let limit = (row_lower - rest_maximum) / value;
                if value > 0.0 {
                    if limit > lower + MEANINGFUL * (1.0 + limit.abs()) {
                        self.work.column_lower[column] = limit;
                        changed = true;
                    }
                } else if limit < upper - MEANINGFUL * (1.0 + limit.abs()) {
                    self.work.column_upper[column] = limit;
                    changed = true;
                }
            }
            if changed {
                self.queue_column(column);
            }
        }
    }

    /// Find rows with identical sparsity patterns and proportional coefficients; fold their
    /// bounds together and drop the duplicates.
    pub(super) fn merge_duplicate_rows(&mut self) {
        let mut by_pattern: HashMap<Vec<usize>, Vec<usize>> = HashMap::new();
        for row in 0..self.work.rows.len() {
            if !self.work.row_alive[row] || self.work.rows[row].is_empty() {
                continue;
            }
            let mut pattern: Vec<usize> = self.work.rows[row].iter().map(|&(j, _)| j).collect();
            pattern.sort_unstable();
            by_pattern.entry(pattern).or_default().push(row);
        }

        for group in by_pattern.into_values().filter(|group| group.len() > 1) {
            let kept = group[0];
            for &removed in &group[1..] {
                if self.conclusion.is_some() || !self.work.row_alive[removed] {
                    continue;
                }
                let Some(ratio) = proportionality(
                    &self.work.rows[kept],
                    &self.work.rows[removed],
                    self.work.tolerance,
                ) else {
                    continue;
                };

                // The removed row, scaled by 1/ratio, is another bound pair on the same
                // activity as the kept row.
                let (scaled_lower, scaled_upper) = if ratio > 0.0 {
                    (self.work.row_lower[removed] / ratio, self.work.row_upper[removed] / ratio)
                } else {
                    (self.work.row_upper[removed] / ratio, self.work.row_lower[removed] / ratio)
                };
                let kept_bounds = (self.work.row_lower[kept], self.work.row_upper[kept]);
                let new_lower = kept_bounds.0.max(scaled_lower);
                let new_upper = kept_bounds.1.min(scaled_upper);
                if new_lower > new_upper + self.work.tolerance {
                    self.conclusion = Some(Conclusion::Infeasible);
                    return;
                }
                trace!("row {removed} duplicates row {kept} with ratio {ratio}");
                self.work.row_lower[kept] = new_lower;
                self.work.row_upper[kept] = new_upper;
                let touched = self.work.kill_row(removed);
                self.stack.push(Transformation::DuplicateRow { kept, removed, ratio, kept_bounds });
                for column in touched {
                    self.queue_column(column);
                }
                self.queue_row(kept);
            }
        }
    }

    /// Find columns with identical patterns, positively proportional coefficients and matching
    /// cost ratio; merge their bound intervals onto one representative.
    pub(super) fn merge_duplicate_columns(&mut self) {
        let mut by_pattern: HashMap<Vec<usize>, Vec<usize>> = HashMap::new();
        for column in 0..self.work.columns.len() {
            if !self.work.column_alive[column] || self.work.columns[column].is_empty() {
                continue;
            }
            let mut pattern: Vec<usize> = self.work.columns[column].iter()
                .map(|&(i, _)| i)
                .collect();
            pattern.sort_unstable();
            by_pattern.entry(pattern).or_default().push(column);
        }

        for group in by_pattern.into_values().filter(|group| group.len() > 1) {
            let kept = group[0];
            for &removed in &group[1..] {
                if !self.work.column_alive[removed] || !self.work.column_alive[kept] {
                    continue;
                }
                let Some(ratio) = proportionality(
                    &self.work.columns[kept],
                    &self.work.columns[removed],
                    self.work.tolerance,
                ) else {
                    continue;
                };
                // Negative ratios flip the merged interval arithmetic; not worth the trouble.
                if ratio <= 0.0 {
                    continue;
                }
                let cost_mismatch =
                    (self.work.cost[removed] - ratio * self.work.cost[kept]).abs();
                if cost_mismatch > self.work.tolerance {
                    continue;
                }

                trace!("column {removed} duplicates column {kept} with ratio {ratio}");
                let kept_bounds = (self.work.column_lower[kept], self.work.column_upper[kept]);
                let removed_bounds =
                    (self.work.column_lower[removed], self.work.column_upper[removed]);
                self.work.column_lower[kept] = kept_bounds.0 + ratio * removed_bounds.0;
                self.work.column_upper[kept] = kept_bounds.1 + ratio * removed_bounds.1;
                let touched = self.work.kill_column(removed);
                self.stack.push(Transformation::DuplicateColumn {
                    kept,
                    removed,
                    ratio,
                    kept_bounds,
                    removed_bounds,
                });
                for row in touched {
                    self.queue_row(row);
                }
                self.queue_column(kept);
            }
        }
    }
}

/// The ratio `second / first` if the two equally-patterned sparse vectors are proportional.
fn proportionality(
    first: &[(usize, f64)],
    second: &[(usize, f64)],
    tolerance: f64,
) -> Option<f64> {
    if first.len() != second.len() {
        return None;
    }
    let mut first = first.to_vec();
    let mut second = second.to_vec();
    first.sort_unstable_by_key(|&(index, _)| index);
    second.sort_unstable_by_key(|&(index, _)| index);

    let ratio = second[0].1 / first[0].1;
    let matches = first.iter().zip(&second).all(|(&(i, a), &(k, b))| {
        i == k && (b - ratio * a).abs() <= tolerance * (1.0 + b.abs())
    });
    matches.then_some(ratio)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algorithm::presolve::{presolve, PresolveResult};
    use crate::data::linear_program::elements::Objective;
    use crate::data::linear_program::model::Model;

    #[test]
    fn proportional_rows_detected() {
        let first = [(0, 1.0), (2, -2.0)];
        let second = [(0, 3.0), (2, -6.0)];
        assert_eq!(proportionality(&first, &second, 1e-9), Some(3.0));
        let not = [(0, 3.0), (2, 1.0)];
        assert_eq!(proportionality(&first, &not, 1e-9), None);
    }

    #[test]
    fn singleton_row_becomes_column_bound() {
        // Row 1 says 2x <= 6, so x <= 3.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(0.0, 10.0);
        model.add_row(f64::NEG_INFINITY, 6.0);
        model.add_column(-1.0, 0.0, 100.0, &[(0, 1.0), (1, 2.0)]);
        model.add_column(1.0, 0.0, 100.0, &[(0, 1.0)]);

        match presolve(&model, 1e-9, 10) {
            PresolveResult::Reduced(reduced) => {
                assert_eq!(reduced.model.nr_rows(), 1);
                let x = reduced.original_column.iter().position(|&j| j == 0).unwrap();
                assert_eq!(reduced.model.column_upper()[x], 3.0);
            },
            other => panic!("expected a reduction, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_rows_merge_to_tightest_bounds() {
        // Rows 0 and 1 are proportional; together they pin the activity to [2, 3]. The columns
        // have distinct costs so they do not aggregate and the merged row survives.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(1.0, 3.0);
        model.add_row(4.0, 20.0);
        model.add_column(1.0, 0.0, 10.0, &[(0, 1.0), (1, 2.0)]);
        model.add_column(5.0, 0.0, 10.0, &[(0, 2.0), (1, 4.0)]);

        match presolve(&model, 1e-9, 10) {
            PresolveResult::Reduced(reduced) => {
                assert_eq!(reduced.model.nr_rows(), 1);
                assert_eq!(reduced.model.row_lower(), &[2.0]);
                assert_eq!(reduced.model.row_upper(), &[3.0]);
            },
            other => panic!("expected a reduction, got {other:?}"),
        }
    }

    #[test]
    fn forcing_row_fixes_its_columns() {
        // x + y >= 2 with x, y <= 1 forces x = y = 1.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(2.0, f64::INFINITY);
        model.add_column(1.0, 0.0, 1.0, &[(0, 1.0)]);
        model.add_column(1.0, 0.0, 1.0, &[(0, 1.0)]);

        assert!(matches!(presolve(&model, 1e-9, 10), PresolveResult::Empty(_)));
    }
}
