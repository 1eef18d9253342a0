//! # Primal simplex
//!
//! The primal method with a composite phase one: instead of solving a separate auxiliary
//! problem, basic variables outside their bounds are priced with unit costs toward feasibility,
//! and the ratio test lets them run to the bound they violate. Once all basics are within
//! bounds, the same loop continues with the true costs.
//!
//! Cycling is handled by the progress monitor: on a stall verdict the costs are perturbed by a
//! small deterministic amount; the perturbation is removed before declaring optimality.
use log::{debug, trace};

use crate::algorithm::simplex::pricing::{Pricing, PricingRule};
use crate::algorithm::simplex::progress::{Progress, Verdict};
use crate::algorithm::simplex::ratio_test::{harris, Blocker};
use crate::algorithm::simplex::{Controls, LoopOutcome, SimplexEngine};
use crate::data::linear_algebra::vector::DenseVector;
use crate::data::linear_program::elements::{BasisStatus, BoundDirection};
use crate::data::linear_program::solution::Ray;

/// Outcome of a simplex run together with an unboundedness or infeasibility certificate.
pub(crate) struct RunResult {
    pub outcome: LoopOutcome,
    pub ray: Option<Ray>,
}

impl RunResult {
    pub(crate) fn plain(outcome: LoopOutcome) -> Self {
        Self { outcome, ray: None }
    }
}

/// Relative size of the cost perturbation applied on a stall.
const PERTURBATION_SCALE: f64 = 1e-6;

/// Run the primal simplex from the engine's current basis.
pub(crate) fn primal(
    engine: &mut SimplexEngine,
    rule: PricingRule,
    controls: &Controls,
) -> RunResult {
    if engine.refactorize().is_err() {
        return RunResult::plain(LoopOutcome::NumericalDifficulties);
    }

    let n = engine.nr_variables();
    let mut pricing = Pricing::new(rule, n);
    let mut progress = Progress::new(engine.tolerances().zero.max(1e-10));
    let mut saved_costs: Option<Vec<f64>> = None;
    let mut violation = vec![0.0; n];
    let mut ray: Option<Ray> = None;

    let outcome = loop {
        if let Some(outcome) = controls.interrupted(engine.iterations()) {
            break outcome;
        }

        let phase1_duals = engine.compute_phase1_duals();
        let in_phase1 = phase1_duals.is_some();
        let duals = match phase1_duals {
            Some(duals) => duals,
            None => engine.compute_duals(),
        };

        // Price every nonbasic variable: a positive entry is the rate of improvement in its
        // admissible direction.
        let dual_tolerance = engine.tolerances().dual_feasibility;
        for (j, entry) in violation.iter_mut().enumerate() {
            *entry = 0.0;
            let status = engine.status(j);
            if status.is_basic() || status == BasisStatus::Fixed {
                continue;
            }
            let reduced = if in_phase1 {
                -engine.column_activity(j, &duals)
            } else {
                engine.reduced_cost(j, &duals)
            };
            let attractiveness = match status {
                BasisStatus::AtLower => -reduced,
                BasisStatus::AtUpper => reduced,
                BasisStatus::Free => reduced.abs(),
                _ => unreachable!(),
            };
            if attractiveness > dual_tolerance {
                *entry = attractiveness;
            }
        }

        let Some(entering) = pricing.select(&violation) else {
            if in_phase1 {
                // Phase one optimal with infeasibility left: the problem is infeasible, and the
                // phase one duals certify it.
                debug!("primal phase 1 optimal but infeasible");
                ray = Some(Ray::Dual((0..engine.nr_rows()).map(|i| duals[i]).collect()));
                break LoopOutcome::PrimalInfeasible;
            }
            if let Some(original) = saved_costs.take() {
                debug!("optimal under perturbation, restoring costs");
                for (j, cost) in original.into_iter().enumerate() {
                    engine.set_cost(j, cost);
                }
                progress.reset_interventions();
                continue;
            }
            break LoopOutcome::Optimal;
        };

        // Direction the entering variable moves in: toward improvement.
        let reduced = if in_phase1 {
            -engine.column_activity(entering, &duals)
        } else {
            engine.reduced_cost(entering, &duals)
        };
        let increasing = match engine.status(entering) {
            BasisStatus::AtLower => true,
            BasisStatus::AtUpper => false,
            BasisStatus::Free => reduced < 0.0,
            _ => unreachable!(),
        };
        let direction = if increasing { 1.0 } else { -1.0 };

        let alpha = engine.solve_column(entering);
        let blockers = primal_blockers(engine, &alpha, direction, in_phase1);

        // The entering variable's opposite bound also limits the step.
        let (lower_q, upper_q) = engine.bounds(entering);
        let own_limit = if increasing {
            upper_q - engine.value(entering)
        } else {
            engine.value(entering) - lower_q
        };

        let test = harris(&blockers, engine.tolerances().harris_relaxation);
        match test {
            None if own_limit.is_infinite() => {
                if in_phase1 {
                    // Infeasibility is bounded below, this cannot happen with exact arithmetic.
                    break LoopOutcome::NumericalDifficulties;
                }
                debug!("unbounded direction through variable {entering}");
                // The improving direction itself is the certificate: the entering variable
                // moves, the basics follow along the solved column.
                let mut descent = vec![0.0; engine.nr_structurals()];
                if entering < engine.nr_structurals() {
                    descent[entering] = direction;
                }
                for (position, &basic) in engine.basis().iter().enumerate() {
                    if basic < engine.nr_structurals() {
                        descent[basic] = -alpha[position] * direction;
                    }
                }
                ray = Some(Ray::Primal(descent));
                break LoopOutcome::DualInfeasible;
            },
            None => {
                engine.flip_bound(entering);
                continue;
            },
            Some(result) if result.step >= own_limit => {
                engine.flip_bound(entering);
                continue;
            },
            Some(result) => {
                let blocker = blockers[result.choice];
                let leaving_position = blocker.index;
                let leaving = engine.basis()[leaving_position];
                let step = direction * result.step;
                trace!(
                    "pivot {}: {entering} enters, {leaving} leaves, step {step:e}",
                    engine.iterations(),
                );

                let (objective, infeasibility) = (engine.objective_value(), engine.primal_infeasibility());
                match progress.looping(objective, infeasibility.0, infeasibility.1, (entering, leaving)) {
                    Verdict::Continue => {},
                    Verdict::Intervene => {
                        debug!("stall detected, perturbing costs");
                        perturb(engine, &mut saved_costs);
                    },
                    Verdict::GiveUp => break LoopOutcome::NumericalDifficulties,
                }

                let leaving_to_upper = blocker.bound == BoundDirection::Upper;
                if engine.pivot(entering, leaving_position, &alpha, step, leaving_to_upper).is_err() {
                    break LoopOutcome::NumericalDifficulties;
                }

                if !matches!(pricing.rule(), PricingRule::Dantzig) {
                    let rho = engine.solve_row(leaving_position);
                    let pivot_row = engine.pivot_row(&rho);
                    let pivot_element = alpha[leaving_position];
                    let tau_row = if matches!(pricing.rule(), PricingRule::SteepestEdge) {
                        let tau = engine.btran(alpha.clone());
                        Some(engine.pivot_row(&tau))
                    } else {
                        None
                    };
                    pricing.update_primal(
                        entering,
                        leaving,
                        &pivot_row,
                        pivot_element,
                        tau_row.as_deref(),
                    );
                }
            },
        }
    };

    // Never leave perturbed costs behind, whatever the outcome.
    if let Some(original) = saved_costs {
        for (j, cost) in original.into_iter().enumerate() {
            engine.set_cost(j, cost);
        }
    }

    RunResult { outcome, ray }
}

/// Collect the basic variables whose bounds limit a step along the entering column.
///
/// With `in_phase1`, a basic variable outside a bound blocks at the bound it violates, so a
/// pivot can land it exactly feasible; a variable moving deeper into violation does not block,
/// its growing violation is already priced into the phase one costs.
fn primal_blockers(
    engine: &SimplexEngine,
    alpha: &DenseVector<f64>,
    direction: f64,
    in_phase1: bool,
) -> Vec<Blocker> {
    let pivot_tolerance = engine.tolerances().pivot;
    let feasibility = engine.tolerances().primal_feasibility;
    let mut blockers = Vec::new();
    for (position, &basic) in engine.basis().iter().enumerate() {
        // Per unit of entering step, this basic moves by `-rate`.
        let rate = alpha[position] * direction;
        if rate.abs() <= pivot_tolerance {
            continue;
        }
        let value = engine.value(basic);
        let (lower, upper) = engine.bounds(basic);
        if rate > 0.0 {
            // Decreasing.
            let target = if in_phase1 && value > upper + feasibility {
                upper
            } else {
                lower
            };
            if target.is_finite() && value >= target - feasibility {
                blockers.push(Blocker {
                    index: position,
                    to_bound: (value - target).max(0.0),
                    magnitude: rate,
                    bound: if target == upper && lower != upper {
                        BoundDirection::Upper
                    } else {
                        BoundDirection::Lower
                    },
                });
            }
        } else {
            // Increasing.
            let target = if in_phase1 && value < lower - feasibility {
                lower
            } else {
                upper
            };
            if target.is_finite() && value <= target + feasibility {
                blockers.push(Blocker {
                    index: position,
                    to_bound: (target - value).max(0.0),
                    magnitude: -rate,
                    bound: if target == lower && lower != upper {
                        BoundDirection::Lower
                    } else {
                        BoundDirection::Upper
                    },
                });
            }
        }
    }
    blockers
}

/// Deterministically perturb the nonbasic costs, saving the originals once.
fn perturb(engine: &mut SimplexEngine, saved: &mut Option<Vec<f64>>) {
    let n = engine.nr_variables();
    if saved.is_none() {
        *saved = Some((0..n).map(|j| engine.cost(j)).collect());
    }
    let scale = (0..n).map(|j| engine.cost(j).abs()).fold(1.0, f64::max) * PERTURBATION_SCALE;
    for j in 0..n {
        if !engine.status(j).is_basic() {
            // A fixed pseudo random pattern keeps reruns reproducible.
            let wobble = 0.5 + (j % 13) as f64 / 13.0;
            engine.set_cost(j, engine.cost(j) + scale * wobble);
        }
    }
}
