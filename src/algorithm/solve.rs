//! # Solve orchestration
//!
//! The one entry point tying everything together: validate, presolve, pick an algorithm, run
//! it with limits and cancellation, crossover if the barrier was used, postsolve. Every path
//! produces a `Solution` whose status says how far it got; only a malformed model is a Rust
//! error.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::algorithm::barrier::crossover::install_crossover_basis;
use crate::algorithm::barrier::{barrier, BarrierConfig, BarrierOutcome, InteriorPoint};
use crate::algorithm::presolve::{presolve, PresolveResult};
use crate::algorithm::simplex::dual::dual;
use crate::algorithm::simplex::primal::primal;
pub use crate::algorithm::simplex::pricing::PricingRule;
use crate::algorithm::simplex::{Controls, LoopOutcome, SimplexEngine, Tolerances};
use crate::data::linear_program::elements::{BasisStatus, SolveStatus};
use crate::data::linear_program::model::{Model, ModelError};
use crate::data::linear_program::solution::Solution;
use crate::io::basis::BasisState;

/// Default number of presolve passes for `PresolveMode::On`.
const DEFAULT_PRESOLVE_PASSES: usize = 16;
/// Outer rounds before the sprint gives up on converging its working set.
const SPRINT_ROUNDS: usize = 200;

/// Cooperative stop flag, checked once per outer iteration of every algorithm.
///
/// Cloning shares the flag, so a clone handed to another thread can stop a running solve. The
/// stop is not preemptive; a solve ends at the next iteration boundary with status
/// [`SolveStatus::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next iteration boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// How much presolving to do before the main algorithm runs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PresolveMode {
    /// Hand the model to the algorithm untouched.
    Off,
    /// Reduce until a fixed point or a pass limit.
    #[default]
    On,
    /// Reduce for at most this many passes.
    Passes(usize),
}

/// Which algorithm solves the (possibly reduced) model.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SolveStrategy {
    /// Primal simplex with a composite phase 1.
    Primal,
    /// Dual simplex, falling back to the primal when it cannot start or stalls.
    Dual,
    /// Primal simplex on a working subset of columns, pricing the full set between rounds.
    PrimalSprint,
    /// Interior point method with a simplex crossover to a vertex.
    Barrier,
    /// Interior point method, returning the interior solution as is.
    BarrierNoCrossover,
    /// Choose from the model's shape.
    #[default]
    Automatic,
}

/// Everything configurable about a solve.
#[derive(Clone, Debug)]
pub struct SolveOptions {
    /// Algorithm selection.
    pub strategy: SolveStrategy,
    /// Presolve reductions.
    pub presolve: PresolveMode,
    /// Simplex pricing rule.
    pub pricing: PricingRule,
    /// Feasibility, pivot and related tolerances.
    pub tolerances: Tolerances,
    /// Basis updates between refactorizations.
    pub refactor_frequency: usize,
    /// Hard stop on simplex pivots or barrier iterations.
    pub iteration_limit: usize,
    /// Hard stop on wall clock time, checked at iteration boundaries.
    pub time_limit: Option<Duration>,
    /// Barrier specific knobs.
    pub barrier: BarrierConfig,
    /// A basis to start the simplex from. Disables presolve for this solve.
    pub warm_start: Option<BasisState>,
    /// Cooperative stop flag; clone it before the solve to keep a handle.
    pub cancel: CancelToken,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            strategy: SolveStrategy::default(),
            presolve: PresolveMode::default(),
            pricing: PricingRule::default(),
            tolerances: Tolerances::default(),
            refactor_frequency: 100,
            iteration_limit: 10_000_000,
            time_limit: None,
            barrier: BarrierConfig::default(),
            warm_start: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Solve a linear program.
///
/// # Errors
///
/// A `ModelError` when the model fails validation. Everything that goes wrong after
/// validation is reported through [`Solution::status`] instead.
pub fn solve(model: &Model, options: &SolveOptions) -> Result<Solution, ModelError> {
    model.validate()?;
    let deadline = options.time_limit.map(|limit| Instant::now() + limit);

    let passes = match options.presolve {
        PresolveMode::Off => None,
        PresolveMode::On => Some(DEFAULT_PRESOLVE_PASSES),
        PresolveMode::Passes(nr) => Some(nr),
    };
    // A warm start is expressed in original indices, which presolve would invalidate.
    let passes = if options.warm_start.is_some() { None } else { passes };

    let Some(passes) = passes else {
        return Ok(solve_core(model, options, deadline));
    };
    match presolve(model, options.tolerances.zero, passes) {
        PresolveResult::Infeasible => {
            info!("presolve proved infeasibility");
            let mut solution = Solution::empty(model.nr_rows(), model.nr_columns());
            solution.status = SolveStatus::PrimalInfeasible;
            Ok(solution)
        },
        PresolveResult::Unbounded => {
            info!("presolve proved unboundedness");
            let mut solution = Solution::empty(model.nr_rows(), model.nr_columns());
            solution.status = SolveStatus::DualInfeasible;
            Ok(solution)
        },
        PresolveResult::Empty(stack) => {
            debug!("presolve eliminated the entire problem");
            let reduced = Solution {
                status: SolveStatus::Optimal,
                ..Solution::empty(0, 0)
            };
            Ok(stack.postsolve(model, &reduced, &[], &[]))
        },
        PresolveResult::Reduced(reduced) => {
            debug!(
                "presolve: {}x{} reduced to {}x{}",
                model.nr_rows(),
                model.nr_columns(),
                reduced.model.nr_rows(),
                reduced.model.nr_columns(),
            );
            let inner = solve_core(&reduced.model, options, deadline);
            Ok(reduced.stack.postsolve(
                model,
                &inner,
                &reduced.original_row,
                &reduced.original_column,
            ))
        },
    }
}

/// Run the selected algorithm on a validated model, without presolve.
fn solve_core(model: &Model, options: &SolveOptions, deadline: Option<Instant>) -> Solution {
    let strategy = match options.strategy {
        SolveStrategy::Automatic => choose_strategy(model),
        explicit => explicit,
    };
    match strategy {
        SolveStrategy::Primal => run_simplex(model, options, deadline, false),
        SolveStrategy::Dual | SolveStrategy::Automatic => {
            run_simplex(model, options, deadline, true)
        },
        SolveStrategy::PrimalSprint => sprint(model, options, deadline),
        SolveStrategy::Barrier => run_barrier(model, options, deadline, true),
        SolveStrategy::BarrierNoCrossover => run_barrier(model, options, deadline, false),
    }
}

/// Shape heuristic for `SolveStrategy::Automatic`. The thresholds are rough and only steer
/// obvious cases; everything else goes to the dual simplex.
fn choose_strategy(model: &Model) -> SolveStrategy {
    let nr_rows = model.nr_rows().max(1);
    let nr_columns = model.nr_columns();
    let nonzeros: usize = (0..nr_columns)
        .map(|j| model.constraints().column(j).len())
        .sum();
    let density = nonzeros as f64 / (nr_rows * nr_columns.max(1)) as f64;

    let strategy = if nr_columns >= 4 * nr_rows && nr_columns >= 4096 {
        SolveStrategy::PrimalSprint
    } else if nr_rows >= 4096 && density < 0.002 {
        SolveStrategy::Barrier
    } else if nr_columns >= 2 * nr_rows {
        SolveStrategy::Primal
    } else {
        SolveStrategy::Dual
    };
    debug!(
        "automatic strategy for {nr_rows}x{nr_columns} (density {density:.4}): {strategy:?}",
    );
    strategy
}

fn run_simplex(
    model: &Model,
    options: &SolveOptions,
    deadline: Option<Instant>,
    dual_first: bool,
) -> Solution {
    let mut engine = SimplexEngine::from_model(model, options.tolerances, options.refactor_frequency);
    if let Some(state) = &options.warm_start {
        engine.install_basis(&state.statuses());
    }
    let controls = Controls {
        iteration_limit: options.iteration_limit,
        deadline,
        cancel: &options.cancel,
    };

    let result = if dual_first {
        let result = dual(&mut engine, options.pricing, &controls);
        if matches!(result.outcome, LoopOutcome::SwitchToPrimal) {
            debug!("dual simplex handed over to the primal");
            primal(&mut engine, options.pricing, &controls)
        } else {
            result
        }
    } else {
        primal(&mut engine, options.pricing, &controls)
    };

    let mut solution = engine.extract_solution(result.outcome.into_status());
    solution.ray = result.ray;
    solution
}

fn run_barrier(
    model: &Model,
    options: &SolveOptions,
    deadline: Option<Instant>,
    crossover: bool,
) -> Solution {
    let point = match barrier(model, &options.barrier, &options.cancel) {
        BarrierOutcome::Converged(point) => point,
        BarrierOutcome::IterationLimit(point) => {
            if crossover {
                point
            } else {
                let mut solution = interior_solution(model, &point);
                solution.status = SolveStatus::IterationLimit;
                return solution;
            }
        },
        BarrierOutcome::Failed => {
            warn!("barrier failed, restarting with the dual simplex");
            return run_simplex(model, options, deadline, true);
        },
        BarrierOutcome::Cancelled => {
            let mut solution = Solution::empty(model.nr_rows(), model.nr_columns());
            solution.status = SolveStatus::Cancelled;
            return solution;
        },
    };

    if !crossover {
        return interior_solution(model, &point);
    }
    info!("crossover after {} barrier iterations", point.iterations);
    let mut engine =
        SimplexEngine::from_model(model, options.tolerances, options.refactor_frequency);
    install_crossover_basis(&mut engine, &point, options.tolerances.primal_feasibility);
    let controls = Controls {
        iteration_limit: options.iteration_limit,
        deadline,
        cancel: &options.cancel,
    };
    let result = primal(&mut engine, options.pricing, &controls);
    let mut solution = engine.extract_solution(result.outcome.into_status());
    solution.ray = result.ray;
    solution.iterations += point.iterations;
    solution
}

/// Package an interior point as a solution without going through a basis.
fn interior_solution(model: &Model, point: &InteriorPoint) -> Solution {
    let nr_rows = model.nr_rows();
    let nr_columns = model.nr_columns();
    let tolerance = 1e-7;

    let mut solution = Solution::empty(nr_rows, nr_columns);
    solution.status = SolveStatus::Optimal;
    solution.iterations = point.iterations;
    let mut objective = model.objective_offset();
    for j in 0..nr_columns {
        let value = point.x[j];
        solution.primal_columns[j] = value;
        solution.dual_columns[j] = point.reduced_costs[j];
        solution.column_status[j] =
            interior_status(value, model.column_lower()[j], model.column_upper()[j], tolerance);
        objective += model.cost()[j] * value;
    }
    for i in 0..nr_rows {
        let value = point.x[nr_columns + i];
        solution.primal_rows[i] = value;
        solution.dual_rows[i] = point.y[i];
        solution.row_status[i] =
            interior_status(value, model.row_lower()[i], model.row_upper()[i], tolerance);
    }
    solution.objective_value = objective;
    solution
}

fn interior_status(value: f64, lower: f64, upper: f64, tolerance: f64) -> BasisStatus {
    if upper - lower <= tolerance && lower.is_finite() {
        BasisStatus::Fixed
    } else if value - lower <= tolerance && lower.is_finite() {
        BasisStatus::AtLower
    } else if upper - value <= tolerance && upper.is_finite() {
        BasisStatus::AtUpper
    } else {
        BasisStatus::Basic
    }
}

/// Column generation over the model's own columns: solve on a working subset, price the rest
/// with the subset's duals, and repeat until no column outside the subset is attractive.
fn sprint(model: &Model, options: &SolveOptions, deadline: Option<Instant>) -> Solution {
    let nr_rows = model.nr_rows();
    let nr_columns = model.nr_columns();
    let direction = model.objective().direction();
    let dual_tolerance = options.tolerances.dual_feasibility;

    // Columns outside the working set sit at a bound; their contribution is folded into the
    // row bounds and the offset of the round's submodel.
    let resting: Vec<f64> = (0..nr_columns)
        .map(|j| {
            let (lower, upper) = (model.column_lower()[j], model.column_upper()[j]);
            if lower.is_finite() {
                lower
            } else if upper.is_finite() {
                upper
            } else {
                0.0
            }
        })
        .collect();

    // Start from the columns that look cheapest in the minimization direction.
    let initial = nr_columns.min((2 * nr_rows).max(1024));
    let mut order: Vec<usize> = (0..nr_columns).collect();
    order.sort_unstable_by(|&a, &b| {
        (direction * model.cost()[a]).total_cmp(&(direction * model.cost()[b]))
    });
    let mut in_working = vec![false; nr_columns];
    for &j in &order[..initial] {
        in_working[j] = true;
    }

    let mut iterations = 0;
    for round in 0..SPRINT_ROUNDS {
        let working: Vec<usize> = (0..nr_columns).filter(|&j| in_working[j]).collect();

        // Build the round's submodel.
        let mut shift = vec![0.0; nr_rows];
        let mut offset = model.objective_offset();
        for j in (0..nr_columns).filter(|&j| !in_working[j]) {
            let value = resting[j];
            offset += model.cost()[j] * value;
            if value != 0.0 {
                for &(i, coefficient) in model.constraints().column(j) {
                    shift[i] += coefficient * value;
                }
            }
        }
        let mut submodel = Model::new(model.objective());
        for i in 0..nr_rows {
            submodel.add_row(model.row_lower()[i] - shift[i], model.row_upper()[i] - shift[i]);
        }
        for &j in &working {
            submodel.add_column(
                model.cost()[j],
                model.column_lower()[j],
                model.column_upper()[j],
                model.constraints().column(j),
            );
        }
        submodel.set_objective_offset(offset);

        let mut engine =
            SimplexEngine::from_model(&submodel, options.tolerances, options.refactor_frequency);
        let controls = Controls {
            iteration_limit: options.iteration_limit.saturating_sub(iterations),
            deadline,
            cancel: &options.cancel,
        };
        let result = primal(&mut engine, options.pricing, &controls);
        let inner = engine.extract_solution(result.outcome.into_status());
        iterations += inner.iterations;

        if inner.status != SolveStatus::Optimal {
            debug!("sprint round {round} ended early with {:?}", inner.status);
            let mut solution = scatter(model, &inner, &working, &resting, &in_working, &shift);
            solution.iterations = iterations;
            return solution;
        }

        // Price the full column set with the round's duals.
        let mut attractive: Vec<(usize, f64)> = Vec::new();
        for j in (0..nr_columns).filter(|&j| !in_working[j]) {
            let activity: f64 = model
                .constraints()
                .column(j)
                .iter()
                .map(|&(i, coefficient)| coefficient * inner.dual_rows[i])
                .sum();
            let reduced = direction * (model.cost()[j] - activity);
            // Resting at the lower bound wants a negative reduced cost, at the upper a
            // positive one, a free column either.
            let pull = if model.column_lower()[j].is_finite() {
                -reduced
            } else if model.column_upper()[j].is_finite() {
                reduced
            } else {
                reduced.abs()
            };
            if pull > dual_tolerance {
                attractive.push((j, pull));
            }
        }
        if attractive.is_empty() {
            info!("sprint converged after {round} rounds, {} columns active", working.len());
            let mut solution = scatter(model, &inner, &working, &resting, &in_working, &shift);
            solution.iterations = iterations;
            return solution;
        }

        // Grow by the most attractive batch, shrink by the clearly uninteresting.
        attractive.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));
        let batch = attractive.len().min(nr_rows.max(512));
        for &(j, _) in &attractive[..batch] {
            in_working[j] = true;
        }
        // Only drop a column when its resting value equals the bound it sits at, so leaving
        // the working set does not move it.
        for (position, &j) in working.iter().enumerate() {
            let reduced = direction * inner.dual_columns[position];
            let droppable = match inner.column_status[position] {
                BasisStatus::AtLower | BasisStatus::Fixed => {
                    model.column_lower()[j].is_finite() && reduced > dual_tolerance
                },
                BasisStatus::AtUpper => {
                    !model.column_lower()[j].is_finite() && reduced < -dual_tolerance
                },
                _ => false,
            };
            if droppable {
                in_working[j] = false;
            }
        }
        debug!(
            "sprint round {round}: added {batch}, working set now {}",
            in_working.iter().filter(|&&w| w).count(),
        );
    }

    warn!("sprint did not converge within {SPRINT_ROUNDS} rounds");
    let mut solution = Solution::empty(nr_rows, nr_columns);
    solution.status = SolveStatus::NumericalDifficulties;
    solution.iterations = iterations;
    solution
}

/// Spread a submodel solution over the full column space.
fn scatter(
    model: &Model,
    inner: &Solution,
    working: &[usize],
    resting: &[f64],
    in_working: &[bool],
    shift: &[f64],
) -> Solution {
    let nr_rows = model.nr_rows();
    let nr_columns = model.nr_columns();

    let mut solution = Solution::empty(nr_rows, nr_columns);
    solution.status = inner.status;
    solution.objective_value = inner.objective_value;
    solution.ray = None;
    for i in 0..nr_rows {
        solution.primal_rows[i] = inner.primal_rows[i] + shift[i];
        solution.dual_rows[i] = inner.dual_rows[i];
        solution.row_status[i] = inner.row_status[i];
    }
    for (position, &j) in working.iter().enumerate() {
        solution.primal_columns[j] = inner.primal_columns[position];
        solution.dual_columns[j] = inner.dual_columns[position];
        solution.column_status[j] = inner.column_status[position];
    }
    for j in (0..nr_columns).filter(|&j| !in_working[j]) {
        let activity: f64 = model
            .constraints()
            .column(j)
            .iter()
            .map(|&(i, coefficient)| coefficient * inner.dual_rows[i])
            .sum();
        solution.primal_columns[j] = resting[j];
        solution.dual_columns[j] = model.cost()[j] - activity;
        solution.column_status[j] = if model.column_lower()[j].is_finite() {
            BasisStatus::AtLower
        } else if model.column_upper()[j].is_finite() {
            BasisStatus::AtUpper
        } else {
            BasisStatus::Free
        };
    }
    solution
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::linear_program::elements::Objective;

    fn transport_model() -> Model {
        // max 3x + 2y subject to x + y <= 4, x <= 3, y <= 3.
        let mut model = Model::new(Objective::Maximize);
        model.add_row(f64::NEG_INFINITY, 4.0);
        model.add_row(f64::NEG_INFINITY, 3.0);
        model.add_row(f64::NEG_INFINITY, 3.0);
        model.add_column(3.0, 0.0, f64::INFINITY, &[(0, 1.0), (1, 1.0)]);
        model.add_column(2.0, 0.0, f64::INFINITY, &[(0, 1.0), (2, 1.0)]);
        model
    }

    #[test]
    fn default_options_reach_the_optimum() {
        let solution = solve(&transport_model(), &SolveOptions::default()).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.objective_value - 11.0).abs() < 1e-6);
        assert!((solution.primal_columns[0] - 3.0).abs() < 1e-6);
        assert!((solution.primal_columns[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn every_strategy_agrees_on_the_objective() {
        for strategy in [
            SolveStrategy::Primal,
            SolveStrategy::Dual,
            SolveStrategy::PrimalSprint,
            SolveStrategy::Barrier,
            SolveStrategy::Automatic,
        ] {
            let options = SolveOptions { strategy, ..SolveOptions::default() };
            let solution = solve(&transport_model(), &options).unwrap();
            assert_eq!(solution.status, SolveStatus::Optimal, "{strategy:?}");
            assert!(
                (solution.objective_value - 11.0).abs() < 1e-6,
                "{strategy:?} found {}",
                solution.objective_value,
            );
        }
    }

    #[test]
    fn cancelled_before_start_reports_cancelled() {
        let options = SolveOptions { presolve: PresolveMode::Off, ..SolveOptions::default() };
        options.cancel.cancel();
        let solution = solve(&transport_model(), &options).unwrap();
        assert_eq!(solution.status, SolveStatus::Cancelled);
    }

    #[test]
    fn invalid_model_is_rejected() {
        let model = Model::new(Objective::Minimize);
        assert!(solve(&model, &SolveOptions::default()).is_err());
    }

    #[test]
    fn zero_iteration_limit_stops_immediately() {
        let options = SolveOptions {
            iteration_limit: 0,
            presolve: PresolveMode::Off,
            strategy: SolveStrategy::Primal,
            ..SolveOptions::default()
        };
        let solution = solve(&transport_model(), &options).unwrap();
        assert_eq!(solution.status, SolveStatus::IterationLimit);
    }
}
