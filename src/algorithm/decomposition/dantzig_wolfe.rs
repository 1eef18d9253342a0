//! # Dantzig-Wolfe column generation
//!
//! The blocks' feasible sets are rewritten as convex combinations of extreme points plus conic
//! combinations of extreme rays. A restricted master over the proposals generated so far sets
//! prices on the linking rows; each block then searches its own polyhedron for a proposal
//! whose priced-out cost beats the block's convexity dual. No block proposing anything means
//! the master solution is optimal for the full problem.
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::algorithm::decomposition::{
    assign_columns, DecompositionControls, DecompositionError, RowPartition,
};
use crate::algorithm::solve::solve;
use crate::data::linear_program::elements::{Objective, SolveStatus};
use crate::data::linear_program::model::Model;
use crate::data::linear_program::solution::{Ray, Solution};

/// Cost of the master's artificial variables. Escalated when the master stays artificial
/// while no block proposes; tunable, not load-bearing.
const ARTIFICIAL_COST: f64 = 1e7;
const COST_ESCALATIONS: u32 = 4;

struct Block {
    rows: Vec<usize>,
    columns: Vec<usize>,
}

/// An extreme point or extreme ray of a block polyhedron, priced out against the linking rows.
struct Proposal {
    /// Value per block column.
    values: Vec<f64>,
    /// Minimization-direction cost.
    cost: f64,
    /// Activity on each linking row, in partition order.
    linking: Vec<f64>,
    /// Points enter the convexity row, rays do not.
    is_point: bool,
}

/// Solve a block-angular problem by column generation.
///
/// # Errors
///
/// On a malformed model or a partition that does not match it.
pub fn dantzig_wolfe(
    model: &Model,
    partition: &RowPartition,
    controls: &DecompositionControls,
) -> Result<Solution, DecompositionError> {
    model.validate()?;
    let roles = partition.roles(model.nr_rows())?;
    let assignment = assign_columns(model, &roles)?;
    let nr_rows = model.nr_rows();
    let nr_columns = model.nr_columns();
    let direction = model.objective().direction();
    let cost_min: Vec<f64> = model.cost().iter().map(|&c| direction * c).collect();

    // Position of each linking row in the master, by original row index.
    let mut linking_position = vec![None; nr_rows];
    for (position, &row) in partition.linking.iter().enumerate() {
        linking_position[row] = Some(position);
    }

    let mut blocks = Vec::new();
    for (index, rows) in partition.blocks.iter().enumerate() {
        let columns: Vec<usize> = (0..nr_columns)
            .filter(|&j| assignment[j] == Some(index))
            .collect();
        if columns.is_empty() {
            // A block without columns has zero activity everywhere; its rows only need to
            // admit zero.
            for &row in rows {
                if model.row_lower()[row] > 0.0 || model.row_upper()[row] < 0.0 {
                    return Ok(terminal(model, SolveStatus::PrimalInfeasible));
                }
            }
            continue;
        }
        blocks.push(Block { rows: rows.clone(), columns });
    }
    let master_columns: Vec<usize> = (0..nr_columns).filter(|&j| assignment[j].is_none()).collect();

    let mut proposals: Vec<Vec<Proposal>> = (0..blocks.len()).map(|_| Vec::new()).collect();
    let mut iterations = 0;
    let mut escalations = 0;
    let mut last_subproblem: Vec<Option<Solution>> = (0..blocks.len()).map(|_| None).collect();

    // First proposals from the blocks' own costs, before any prices exist.
    let zero_prices = vec![0.0; partition.linking.len()];
    let first: Vec<Solution> = blocks
        .par_iter()
        .map(|block| price_block(model, block, &cost_min, &zero_prices, &linking_position, controls))
        .collect();
    for (index, solution) in first.into_iter().enumerate() {
        iterations += solution.iterations;
        match proposal_from(&solution, &blocks[index], model, &cost_min, &linking_position) {
            Some(proposal) => proposals[index].push(proposal),
            None if solution.status == SolveStatus::PrimalInfeasible => {
                info!("block {index} is infeasible on its own");
                return Ok(terminal(model, SolveStatus::PrimalInfeasible));
            },
            None => return Ok(terminal(model, SolveStatus::NumericalDifficulties)),
        }
    }

    for round in 0..controls.max_rounds {
        let master = build_master(
            model,
            partition,
            &blocks,
            &master_columns,
            &proposals,
            &cost_min,
            ARTIFICIAL_COST * 100_f64.powi(escalations as i32),
        );
        let master_solution = solve(&master, &controls.master)?;
        iterations += master_solution.iterations;
        if master_solution.status != SolveStatus::Optimal {
            debug!("master round {round} ended with {:?}", master_solution.status);
            return Ok(terminal(model, master_solution.status));
        }

        let nr_master_rows = partition.linking.len();
        let prices = &master_solution.dual_rows[..nr_master_rows];
        let convexity_duals = &master_solution.dual_rows[nr_master_rows..];

        // Every block prices the master's duals against its own polyhedron.
        let priced: Vec<Solution> = blocks
            .par_iter()
            .map(|block| price_block(model, block, &cost_min, prices, &linking_position, controls))
            .collect();

        let mut added = 0;
        for (index, solution) in priced.into_iter().enumerate() {
            iterations += solution.iterations;
            let attractive = match solution.status {
                SolveStatus::Optimal => {
                    solution.objective_value < convexity_duals[index] - controls.tolerance
                },
                // An unbounded priced subproblem always proposes its ray.
                SolveStatus::DualInfeasible => true,
                other => {
                    debug!("subproblem {index} ended with {other:?}");
                    return Ok(terminal(model, other));
                },
            };
            if attractive {
                match proposal_from(&solution, &blocks[index], model, &cost_min, &linking_position)
                {
                    Some(proposal) => {
                        proposals[index].push(proposal);
                        added += 1;
                    },
                    None => return Ok(terminal(model, SolveStatus::NumericalDifficulties)),
                }
            }
            last_subproblem[index] = Some(solution);
        }

        let artificial_use = artificial_activity(&master, &master_solution);
        if added == 0 {
            if artificial_use > controls.tolerance {
                if escalations < COST_ESCALATIONS {
                    escalations += 1;
                    debug!("master still artificial, escalating the artificial cost");
                    continue;
                }
                info!("no proposals can displace the artificials; infeasible");
                return Ok(terminal(model, SolveStatus::PrimalInfeasible));
            }
            info!("column generation converged after {round} rounds");
            let mut solution = assemble(
                model,
                partition,
                &blocks,
                &master_columns,
                &proposals,
                &master_solution,
                &last_subproblem,
            );
            solution.iterations = iterations;
            return Ok(solution);
        }
        debug!("round {round}: {added} proposals added");
    }

    warn!("column generation hit its round limit");
    Ok(terminal(model, SolveStatus::IterationLimit))
}

/// An all-default solution carrying only a status.
fn terminal(model: &Model, status: SolveStatus) -> Solution {
    let mut solution = Solution::empty(model.nr_rows(), model.nr_columns());
    solution.status = status;
    solution
}

/// Solve one block's pricing problem under the given linking prices.
fn price_block(
    model: &Model,
    block: &Block,
    cost_min: &[f64],
    prices: &[f64],
    linking_position: &[Option<usize>],
    controls: &DecompositionControls,
) -> Solution {
    let mut local_row = vec![usize::MAX; model.nr_rows()];
    let mut subproblem = Model::new(Objective::Minimize);
    for (local, &row) in block.rows.iter().enumerate() {
        local_row[row] = local;
        subproblem.add_row(model.row_lower()[row], model.row_upper()[row]);
    }
    for &j in &block.columns {
        let mut priced_cost = cost_min[j];
        let mut entries = Vec::new();
        for &(row, coefficient) in model.constraints().column(j) {
            if let Some(position) = linking_position[row] {
                priced_cost -= prices[position] * coefficient;
            } else if local_row[row] != usize::MAX {
                entries.push((local_row[row], coefficient));
            }
        }
        subproblem.add_column(
            priced_cost,
            model.column_lower()[j],
            model.column_upper()[j],
            &entries,
        );
    }
    match solve(&subproblem, &controls.subproblem) {
        Ok(solution) => solution,
        Err(error) => {
            warn!("subproblem rejected: {error}");
            terminal(&subproblem, SolveStatus::NumericalDifficulties)
        },
    }
}

/// Turn a subproblem outcome into a proposal: an extreme point when optimal, an extreme ray
/// when unbounded.
fn proposal_from(
    solution: &Solution,
    block: &Block,
    model: &Model,
    cost_min: &[f64],
    linking_position: &[Option<usize>],
) -> Option<Proposal> {
    let (values, is_point) = match solution.status {
        SolveStatus::Optimal => (solution.primal_columns.clone(), true),
        SolveStatus::DualInfeasible => match &solution.ray {
            Some(Ray::Primal(ray)) => (ray.clone(), false),
            _ => return None,
        },
        _ => return None,
    };

    let mut cost = 0.0;
    let mut linking = vec![0.0; linking_position.iter().flatten().count()];
    for (local, &j) in block.columns.iter().enumerate() {
        let value = values[local];
        cost += cost_min[j] * value;
        for &(row, coefficient) in model.constraints().column(j) {
            if let Some(position) = linking_position[row] {
                linking[position] += coefficient * value;
            }
        }
    }
    Some(Proposal { values, cost, linking, is_point })
}

/// The restricted master: linking rows, one convexity row per block, the master-only columns,
/// one weight column per proposal and paired artificials keeping every row feasible.
fn build_master(
    model: &Model,
    partition: &RowPartition,
    blocks: &[Block],
    master_columns: &[usize],
    proposals: &[Vec<Proposal>],
    cost_min: &[f64],
    artificial_cost: f64,
) -> Model {
    let nr_linking = partition.linking.len();
    let mut master = Model::new(Objective::Minimize);
    for &row in &partition.linking {
        master.add_row(model.row_lower()[row], model.row_upper()[row]);
    }
    for _ in blocks {
        master.add_row(1.0, 1.0);
    }

    let mut linking_position = vec![None; model.nr_rows()];
    for (position, &row) in partition.linking.iter().enumerate() {
        linking_position[row] = Some(position);
    }
    for &j in master_columns {
        let entries: Vec<_> = model
            .constraints()
            .column(j)
            .iter()
            .filter_map(|&(row, coefficient)| {
                linking_position[row].map(|position| (position, coefficient))
            })
            .collect();
        master.add_column(cost_min[j], model.column_lower()[j], model.column_upper()[j], &entries);
    }
    for (index, block_proposals) in proposals.iter().enumerate() {
        for proposal in block_proposals {
            let mut entries: Vec<_> = proposal
                .linking
                .iter()
                .enumerate()
                .filter(|&(_, &activity)| activity != 0.0)
                .map(|(position, &activity)| (position, activity))
                .collect();
            if proposal.is_point {
                entries.push((nr_linking + index, 1.0));
            }
            master.add_column(proposal.cost, 0.0, f64::INFINITY, &entries);
        }
    }
    // One artificial per direction per row, so the master is always feasible.
    for row in 0..master.nr_rows() {
        master.add_column(artificial_cost, 0.0, f64::INFINITY, &[(row, 1.0)]);
        master.add_column(artificial_cost, 0.0, f64::INFINITY, &[(row, -1.0)]);
    }
    master
}

/// Total activity on the artificial columns, the tail of the master's column list.
fn artificial_activity(master: &Model, solution: &Solution) -> f64 {
    let nr_artificials = 2 * master.nr_rows();
    solution.primal_columns[master.nr_columns() - nr_artificials..]
        .iter()
        .map(|v| v.abs())
        .sum()
}

/// Scatter the master's weights back to the original columns.
fn assemble(
    model: &Model,
    partition: &RowPartition,
    blocks: &[Block],
    master_columns: &[usize],
    proposals: &[Vec<Proposal>],
    master_solution: &Solution,
    last_subproblem: &[Option<Solution>],
) -> Solution {
    let nr_rows = model.nr_rows();
    let nr_columns = model.nr_columns();
    let direction = model.objective().direction();

    let mut solution = Solution::empty(nr_rows, nr_columns);
    solution.status = SolveStatus::Optimal;

    for (position, &j) in master_columns.iter().enumerate() {
        solution.primal_columns[j] = master_solution.primal_columns[position];
        solution.dual_columns[j] = direction * master_solution.dual_columns[position];
        solution.column_status[j] = master_solution.column_status[position];
    }
    // Weight columns follow the master-only columns in the master's column order.
    let mut weight = master_columns.len();
    for (index, block_proposals) in proposals.iter().enumerate() {
        for proposal in block_proposals {
            let lambda = master_solution.primal_columns[weight];
            weight += 1;
            if lambda == 0.0 {
                continue;
            }
            for (local, &j) in blocks[index].columns.iter().enumerate() {
                solution.primal_columns[j] += lambda * proposal.values[local];
            }
        }
    }

    // Linking duals from the master, block row duals from each block's last pricing solve.
    for (position, &row) in partition.linking.iter().enumerate() {
        solution.dual_rows[row] = direction * master_solution.dual_rows[position];
    }
    for (index, block) in blocks.iter().enumerate() {
        if let Some(inner) = &last_subproblem[index] {
            for (local, &row) in block.rows.iter().enumerate() {
                solution.dual_rows[row] = direction * inner.dual_rows[local];
            }
            for (local, &j) in block.columns.iter().enumerate() {
                solution.dual_columns[j] = direction * inner.dual_columns[local];
            }
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
    fn two_block_problem_reaches_the_optimum() {
        // min x + 2y with x + y >= 3, x <= 2 (block 0), y <= 2 (block 1).
        let mut model = Model::new(Objective::Minimize);
        model.add_row(3.0, f64::INFINITY);
        model.add_row(f64::NEG_INFINITY, 2.0);
        model.add_row(f64::NEG_INFINITY, 2.0);
        model.add_column(1.0, 0.0, f64::INFINITY, &[(0, 1.0), (1, 1.0)]);
        model.add_column(2.0, 0.0, f64::INFINITY, &[(0, 1.0), (2, 1.0)]);
        let partition = RowPartition { linking: vec![0], blocks: vec![vec![1], vec![2]] };

        let solution =
            dantzig_wolfe(&model, &partition, &DecompositionControls::default()).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.objective_value - 4.0).abs() < 1e-5);
        assert!((solution.primal_columns[0] - 2.0).abs() < 1e-5);
        assert!((solution.primal_columns[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn infeasible_block_is_detected() {
        // Block row demands x >= 5 while x <= 1.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(f64::NEG_INFINITY, f64::INFINITY);
        model.add_row(5.0, f64::INFINITY);
        model.add_column(1.0, 0.0, 1.0, &[(0, 1.0), (1, 1.0)]);
        let partition = RowPartition { linking: vec![0], blocks: vec![vec![1]] };

        let solution =
            dantzig_wolfe(&model, &partition, &DecompositionControls::default()).unwrap();
        assert_eq!(solution.status, SolveStatus::PrimalInfeasible);
    }
}
