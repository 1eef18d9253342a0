//! # Benders decomposition
//!
//! The linking columns stay in a master problem; each block of rows becomes a subproblem in
//! the remaining columns, solved for fixed linking values. Subproblem duals yield optimality
//! cuts bounding the block's cost variable from below, Farkas certificates yield feasibility
//! cuts, and the master is re-solved over the accumulated cuts until the bound gap closes.
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::algorithm::decomposition::{
    DecompositionControls, DecompositionError, RowPartition, RowRole,
};
use crate::algorithm::solve::solve;
use crate::data::linear_program::elements::{Objective, SolveStatus};
use crate::data::linear_program::model::Model;
use crate::data::linear_program::solution::{Ray, Solution};

/// Initial lower bound on the per-block cost variables; tightened by the first optimality
/// cut. Tunable, not load-bearing.
const COST_VARIABLE_FLOOR: f64 = -1e12;

struct Block {
    rows: Vec<usize>,
    columns: Vec<usize>,
}

/// A cut over the master's variables: `lower <= entries . (y, eta) <= upper`.
struct Cut {
    /// Coefficients by master column position, linking columns first, cost variables after.
    entries: Vec<(usize, f64)>,
    lower: f64,
    upper: f64,
}

/// Solve a problem whose rows decompose once the linking columns are fixed.
///
/// `linking_columns` are the master's variables. Every row in `partition.linking` may only
/// involve linking columns; every other column must sit in a single block.
///
/// # Errors
///
/// On a malformed model or a partition/column split that does not match it.
pub fn benders(
    model: &Model,
    linking_columns: &[usize],
    partition: &RowPartition,
    controls: &DecompositionControls,
) -> Result<Solution, DecompositionError> {
    model.validate()?;
    let roles = partition.roles(model.nr_rows())?;
    let nr_columns = model.nr_columns();
    let direction = model.objective().direction();
    let cost_min: Vec<f64> = model.cost().iter().map(|&c| direction * c).collect();

    let mut is_linking = vec![false; nr_columns];
    for &j in linking_columns {
        if j >= nr_columns {
            return Err(DecompositionError::ColumnOutOfRange(j));
        }
        is_linking[j] = true;
    }

    // Split the remaining columns over the blocks and check the master rows are clean.
    let mut block_of_column = vec![None; nr_columns];
    for j in (0..nr_columns).filter(|&j| !is_linking[j]) {
        for &(row, _) in model.constraints().column(j) {
            match roles[row] {
                RowRole::Linking => {
                    return Err(DecompositionError::MasterRowHasSubproblemColumn {
                        row,
                        column: j,
                    });
                },
                RowRole::Block(block) => match block_of_column[j] {
                    None => block_of_column[j] = Some(block),
                    Some(first) if first != block => {
                        return Err(DecompositionError::ColumnSpansBlocks {
                            column: j,
                            first,
                            second: block,
                        });
                    },
                    Some(_) => {},
                },
            }
        }
    }
    let blocks: Vec<Block> = partition
        .blocks
        .iter()
        .enumerate()
        .map(|(index, rows)| Block {
            rows: rows.clone(),
            columns: (0..nr_columns)
                .filter(|&j| !is_linking[j] && block_of_column[j] == Some(index))
                .collect(),
        })
        .collect();

    let mut cuts: Vec<Cut> = Vec::new();
    let mut iterations = 0;
    let mut best_upper = f64::INFINITY;
    let mut incumbent: Option<(Vec<f64>, Vec<Solution>)> = None;

    for round in 0..controls.max_rounds {
        let master = build_master(model, linking_columns, partition, blocks.len(), &cuts, &cost_min);
        let master_solution = solve(&master, &controls.master)?;
        iterations += master_solution.iterations;
        match master_solution.status {
            SolveStatus::Optimal => {},
            SolveStatus::DualInfeasible => {
                // Cost variables at their artificial floor also land here eventually; both
                // mean the restriction to current cuts is unbounded below.
                info!("master is unbounded; the full problem is too");
                return Ok(terminal(model, SolveStatus::DualInfeasible));
            },
            SolveStatus::PrimalInfeasible => {
                info!("feasibility cuts are contradictory; infeasible");
                return Ok(terminal(model, SolveStatus::PrimalInfeasible));
            },
            other => return Ok(terminal(model, other)),
        }
        let lower_bound = master_solution.objective_value;
        let linking_values = &master_solution.primal_columns[..linking_columns.len()];

        let results: Vec<Solution> = blocks
            .par_iter()
            .map(|block| {
                solve_block(model, block, linking_columns, linking_values, &cost_min, controls)
            })
            .collect();

        let mut new_cuts = Vec::new();
        let mut round_upper = 0.0;
        let mut all_optimal = true;
        for (index, inner) in results.iter().enumerate() {
            iterations += inner.iterations;
            match inner.status {
                SolveStatus::Optimal => {
                    round_upper += inner.objective_value;
                    new_cuts.push(optimality_cut(
                        model,
                        &blocks[index],
                        linking_columns,
                        linking_values,
                        index,
                        inner,
                    ));
                },
                SolveStatus::PrimalInfeasible => {
                    all_optimal = false;
                    match feasibility_cut(
                        model,
                        &blocks[index],
                        linking_columns,
                        linking_values,
                        inner,
                        controls.tolerance,
                    ) {
                        Some(cut) => new_cuts.push(cut),
                        None => {
                            warn!("no usable certificate from infeasible block {index}");
                            return Ok(terminal(model, SolveStatus::NumericalDifficulties));
                        },
                    }
                },
                SolveStatus::DualInfeasible => {
                    info!("block {index} is unbounded below for feasible linking values");
                    return Ok(terminal(model, SolveStatus::DualInfeasible));
                },
                other => return Ok(terminal(model, other)),
            }
        }

        if all_optimal {
            let master_cost: f64 = linking_columns
                .iter()
                .zip(linking_values)
                .map(|(&j, &value)| cost_min[j] * value)
                .sum();
            let upper = master_cost + round_upper;
            if upper < best_upper {
                best_upper = upper;
                incumbent = Some((linking_values.to_vec(), results));
            }
            let gap = best_upper - lower_bound;
            debug!("round {round}: bounds [{lower_bound:.6}, {best_upper:.6}]");
            if gap <= controls.tolerance * (1.0 + best_upper.abs()) {
                info!("Benders converged after {round} rounds, {} cuts", cuts.len());
                let (values, inners) = incumbent.as_ref().unwrap();
                let mut solution =
                    assemble(
                        model,
                        linking_columns,
                        &partition.linking,
                        &blocks,
                        values,
                        inners,
                        &master_solution,
                    );
                solution.iterations = iterations;
                return Ok(solution);
            }
        }
        cuts.extend(new_cuts);
    }

    warn!("Benders hit its round limit");
    let mut solution = match incumbent {
        Some((values, inners)) => {
            let master = build_master(model, linking_columns, partition, blocks.len(), &cuts, &cost_min);
            let master_solution = solve(&master, &controls.master)?;
            assemble(
                model,
                linking_columns,
                &partition.linking,
                &blocks,
                &values,
                &inners,
                &master_solution,
            )
        },
        None => terminal(model, SolveStatus::IterationLimit),
    };
    solution.status = SolveStatus::IterationLimit;
    solution.iterations = iterations;
    Ok(solution)
}

fn terminal(model: &Model, status: SolveStatus) -> Solution {
    let mut solution = Solution::empty(model.nr_rows(), model.nr_columns());
    solution.status = status;
    solution
}

/// Master over the linking columns, one cost variable per block and the accumulated cuts.
fn build_master(
    model: &Model,
    linking_columns: &[usize],
    partition: &RowPartition,
    nr_blocks: usize,
    cuts: &[Cut],
    cost_min: &[f64],
) -> Model {
    let mut master = Model::new(Objective::Minimize);
    let mut master_row = vec![usize::MAX; model.nr_rows()];
    for (position, &row) in partition.linking.iter().enumerate() {
        master_row[row] = position;
        master.add_row(model.row_lower()[row], model.row_upper()[row]);
    }
    for cut in cuts {
        master.add_row(cut.lower, cut.upper);
    }

    let nr_master_rows = partition.linking.len();
    for (position, &j) in linking_columns.iter().enumerate() {
        let mut entries: Vec<_> = model
            .constraints()
            .column(j)
            .iter()
            .filter(|&&(row, _)| master_row[row] != usize::MAX)
            .map(|&(row, coefficient)| (master_row[row], coefficient))
            .collect();
        for (offset, cut) in cuts.iter().enumerate() {
            for &(column, coefficient) in &cut.entries {
                if column == position {
                    entries.push((nr_master_rows + offset, coefficient));
                }
            }
        }
        master.add_column(cost_min[j], model.column_lower()[j], model.column_upper()[j], &entries);
    }
    for block in 0..nr_blocks {
        let position = linking_columns.len() + block;
        let entries: Vec<_> = cuts
            .iter()
            .enumerate()
            .flat_map(|(offset, cut)| {
                cut.entries
                    .iter()
                    .filter(|&&(column, _)| column == position)
                    .map(move |&(_, coefficient)| (nr_master_rows + offset, coefficient))
            })
            .collect();
        master.add_column(1.0, COST_VARIABLE_FLOOR, f64::INFINITY, &entries);
    }
    master
}

/// Solve one block for fixed linking values: its rows shifted by the linking activity, its
/// columns unchanged.
fn solve_block(
    model: &Model,
    block: &Block,
    linking_columns: &[usize],
    linking_values: &[f64],
    cost_min: &[f64],
    controls: &DecompositionControls,
) -> Solution {
    let mut shift = vec![0.0; model.nr_rows()];
    for (&j, &value) in linking_columns.iter().zip(linking_values) {
        if value != 0.0 {
            for &(row, coefficient) in model.constraints().column(j) {
                shift[row] += coefficient * value;
            }
        }
    }

    let mut local_row = vec![usize::MAX; model.nr_rows()];
    let mut subproblem = Model::new(Objective::Minimize);
    for (local, &row) in block.rows.iter().enumerate() {
        local_row[row] = local;
        subproblem.add_row(
            model.row_lower()[row] - shift[row],
            model.row_upper()[row] - shift[row],
        );
    }
    for &j in &block.columns {
        let entries: Vec<_> = model
            .constraints()
            .column(j)
            .iter()
            .filter(|&&(row, _)| local_row[row] != usize::MAX)
            .map(|&(row, coefficient)| (local_row[row], coefficient))
            .collect();
        subproblem.add_column(
            cost_min[j],
            model.column_lower()[j],
            model.column_upper()[j],
            &entries,
        );
    }
    match solve(&subproblem, &controls.subproblem) {
        Ok(solution) => solution,
        Err(error) => {
            warn!("block rejected: {error}");
            terminal(&subproblem, SolveStatus::NumericalDifficulties)
        },
    }
}

/// Linking-column coefficients of a dual vector over a block's rows: `wᵀ B` where `B` is the
/// linking part of the block rows.
fn dual_times_linking(
    model: &Model,
    block: &Block,
    linking_columns: &[usize],
    weights: &[f64],
) -> Vec<f64> {
    let mut local_row = vec![usize::MAX; model.nr_rows()];
    for (local, &row) in block.rows.iter().enumerate() {
        local_row[row] = local;
    }
    linking_columns
        .iter()
        .map(|&j| {
            model
                .constraints()
                .column(j)
                .iter()
                .filter(|&&(row, _)| local_row[row] != usize::MAX)
                .map(|&(row, coefficient)| coefficient * weights[local_row[row]])
                .sum()
        })
        .collect()
}

/// `eta_b >= v(y^) + g . (y - y^)` with the subgradient taken from the block duals.
fn optimality_cut(
    model: &Model,
    block: &Block,
    linking_columns: &[usize],
    linking_values: &[f64],
    block_index: usize,
    inner: &Solution,
) -> Cut {
    let value = inner.objective_value;
    let pi_b = dual_times_linking(model, block, linking_columns, &inner.dual_rows);

    // eta + (B' pi) . y >= v + (B' pi) . y^.
    let mut entries: Vec<(usize, f64)> = pi_b
        .iter()
        .enumerate()
        .filter(|&(_, &g)| g != 0.0)
        .map(|(position, &g)| (position, g))
        .collect();
    entries.push((linking_columns.len() + block_index, 1.0));
    let threshold: f64 = value
        + pi_b
            .iter()
            .zip(linking_values)
            .map(|(&g, &y)| g * y)
            .sum::<f64>();
    Cut { entries, lower: threshold, upper: f64::INFINITY }
}

/// A cut from a Farkas certificate `r`: the interval the certificate assigns to the block's
/// activities must be able to contain zero for some linking values.
fn feasibility_cut(
    model: &Model,
    block: &Block,
    linking_columns: &[usize],
    linking_values: &[f64],
    inner: &Solution,
    tolerance: f64,
) -> Option<Cut> {
    let Some(Ray::Dual(ray)) = &inner.ray else {
        return None;
    };
    let r_b = dual_times_linking(model, block, linking_columns, ray);
    let shift: f64 = r_b.iter().zip(linking_values).map(|(&w, &y)| w * y).sum();

    // Range of r . t over activities t within the shifted row bounds.
    let mut low = 0.0_f64;
    let mut high = 0.0_f64;
    let mut low_constant = 0.0_f64;
    let mut high_constant = 0.0_f64;
    for (local, &row) in block.rows.iter().enumerate() {
        let r = ray[local];
        if r == 0.0 {
            continue;
        }
        let lower = model.row_lower()[row];
        let upper = model.row_upper()[row];
        let (at_lower, at_upper) = (r * lower, r * upper);
        if r > 0.0 {
            low += at_lower;
            high += at_upper;
            low_constant += at_lower;
            high_constant += at_upper;
        } else {
            low += at_upper;
            high += at_lower;
            low_constant += at_upper;
            high_constant += at_lower;
        }
    }
    low -= shift;
    high -= shift;

    let entries: Vec<(usize, f64)> = r_b
        .iter()
        .enumerate()
        .filter(|&(_, &w)| w != 0.0)
        .map(|(position, &w)| (position, w))
        .collect();
    if low > tolerance && low.is_finite() {
        // Need (r B) . y >= sum of the low-side bound terms.
        Some(Cut { entries, lower: low_constant, upper: f64::INFINITY })
    } else if high < -tolerance && high.is_finite() {
        Some(Cut { entries, lower: f64::NEG_INFINITY, upper: high_constant })
    } else {
        None
    }
}

/// Combine the incumbent's linking values and block solutions into one solution.
fn assemble(
    model: &Model,
    linking_columns: &[usize],
    linking_rows: &[usize],
    blocks: &[Block],
    linking_values: &[f64],
    inners: &[Solution],
    master_solution: &Solution,
) -> Solution {
    let nr_rows = model.nr_rows();
    let nr_columns = model.nr_columns();
    let direction = model.objective().direction();

    let mut solution = Solution::empty(nr_rows, nr_columns);
    solution.status = SolveStatus::Optimal;
    for (position, &j) in linking_columns.iter().enumerate() {
        solution.primal_columns[j] = linking_values[position];
        solution.dual_columns[j] = direction * master_solution.dual_columns[position];
        solution.column_status[j] = master_solution.column_status[position];
    }
    // The master's leading rows are the linking rows, in partition order.
    for (position, &row) in linking_rows.iter().enumerate() {
        solution.dual_rows[row] = direction * master_solution.dual_rows[position];
        solution.row_status[row] = master_solution.row_status[position];
    }
    for (block, inner) in blocks.iter().zip(inners) {
        for (local, &j) in block.columns.iter().enumerate() {
            solution.primal_columns[j] = inner.primal_columns[local];
            solution.dual_columns[j] = direction * inner.dual_columns[local];
            solution.column_status[j] = inner.column_status[local];
        }
        for (local, &row) in block.rows.iter().enumerate() {
            solution.dual_rows[row] = direction * inner.dual_rows[local];
        }
    }

    let mut objective = model.objective_offset();
    for j in 0..nr_columns {
        objective += model.cost()[j] * solution.primal_columns[j];
        for &(row, coefficient) in model.constraints().column(j) {
            solution.primal_rows[row] += coefficient * solution.primal_columns[j];
        }
    }
    solution.objective_value = objective;
    solution
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn feasibility_and_optimality_cuts_reach_the_optimum() {
        // min y + 10x with x + y >= 2, x <= 1, y in [0, 10]. Cheapest is y = 2, x = 0.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(2.0, f64::INFINITY);
        model.add_column(10.0, 0.0, 1.0, &[(0, 1.0)]);
        model.add_column(1.0, 0.0, 10.0, &[(0, 1.0)]);
        let partition = RowPartition { linking: vec![], blocks: vec![vec![0]] };

        let solution =
            benders(&model, &[1], &partition, &DecompositionControls::default()).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.objective_value - 2.0).abs() < 1e-5);
        assert!((solution.primal_columns[1] - 2.0).abs() < 1e-5);
        assert!(solution.primal_columns[0].abs() < 1e-5);
    }

    #[test]
    fn two_independent_blocks_split_cleanly() {
        // min y + x1 + x2, x1 >= 3 - y (block 0), x2 >= 1 (block 1), y in [0, 1] with cost 0.5.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(3.0, f64::INFINITY);
        model.add_row(1.0, f64::INFINITY);
        model.add_column(1.0, 0.0, f64::INFINITY, &[(0, 1.0)]);
        model.add_column(1.0, 0.0, f64::INFINITY, &[(1, 1.0)]);
        model.add_column(0.5, 0.0, 1.0, &[(0, 1.0)]);
        let partition = RowPartition { linking: vec![], blocks: vec![vec![0], vec![1]] };

        let solution =
            benders(&model, &[2], &partition, &DecompositionControls::default()).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        // y = 1 trades cost 0.5 against a unit of x1.
        assert!((solution.objective_value - 3.5).abs() < 1e-5);
        assert!((solution.primal_columns[2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn a_linking_row_keeps_its_master_dual() {
        // min y + 2x with y <= 2 (linking), y + x >= 3 (block). The cap on y binds, so its
        // dual must survive the reassembly: raising the cap by one saves one unit of cost.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(f64::NEG_INFINITY, 2.0);
        model.add_row(3.0, f64::INFINITY);
        model.add_column(1.0, 0.0, 10.0, &[(0, 1.0), (1, 1.0)]);
        model.add_column(2.0, 0.0, 10.0, &[(1, 1.0)]);
        let partition = RowPartition { linking: vec![0], blocks: vec![vec![1]] };

        let solution =
            benders(&model, &[0], &partition, &DecompositionControls::default()).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.objective_value - 4.0).abs() < 1e-5);
        assert!((solution.primal_columns[0] - 2.0).abs() < 1e-5);
        assert!((solution.primal_columns[1] - 1.0).abs() < 1e-5);
        assert!((solution.dual_rows[0] - -1.0).abs() < 1e-5);
        assert!((solution.dual_rows[1] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn a_master_row_touching_block_columns_is_rejected() {
        let mut model = Model::new(Objective::Minimize);
        model.add_row(0.0, 1.0);
        model.add_row(0.0, 1.0);
        model.add_column(1.0, 0.0, 1.0, &[(0, 1.0), (1, 1.0)]);
        let partition = RowPartition { linking: vec![0], blocks: vec![vec![1]] };

        assert!(matches!(
            benders(&model, &[], &partition, &DecompositionControls::default()),
            Err(DecompositionError::MasterRowHasSubproblemColumn { row: 0, column: 0 }),
        ));
    }
}
