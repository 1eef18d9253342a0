//! # Dual simplex
//!
//! The dual method rides a dual feasible basis toward primal feasibility: the leaving variable
//! is a primal infeasible basic, the entering variable is found by a dual ratio test over the
//! pivot row, keeping all reduced costs on the right side of zero.
//!
//! Dual feasibility at the start is manufactured where possible by bound flips: a nonbasic
//! variable whose reduced cost points the wrong way is moved to its opposite bound. When a
//! variable cannot be flipped (no opposite finite bound) the method declines and signals a
//! switch to the primal.
use log::{debug, trace};

use crate::algorithm::simplex::pricing::{Pricing, PricingRule};
use crate::algorithm::simplex::primal::RunResult;
use crate::algorithm::simplex::progress::{Progress, Verdict};
use crate::algorithm::simplex::ratio_test::{harris, Blocker};
use crate::algorithm::simplex::{Controls, LoopOutcome, SimplexEngine};
use crate::data::linear_program::elements::{BasisStatus, BoundDirection};
use crate::data::linear_program::solution::Ray;

/// Run the dual simplex from the engine's current basis.
///
/// Returns [`LoopOutcome::SwitchToPrimal`] when the start is not dual feasible and flips cannot
/// make it so, or when numerical trouble suggests the primal will fare better.
pub(crate) fn dual(
    engine: &mut SimplexEngine,
    rule: PricingRule,
    controls: &Controls,
) -> RunResult {
    if engine.refactorize().is_err() {
        return RunResult::plain(LoopOutcome::NumericalDifficulties);
    }
    if !flip_to_dual_feasible(engine) {
        debug!("start is not dual feasible, deferring to the primal");
        return RunResult::plain(LoopOutcome::SwitchToPrimal);
    }

    let m = engine.nr_rows();
    let mut pricing = Pricing::new(rule, m);
    let mut progress = Progress::new(engine.tolerances().zero.max(1e-10));
    let mut violation = vec![0.0; m];
    let mut ray: Option<Ray> = None;

    let outcome = loop {
        if let Some(outcome) = controls.interrupted(engine.iterations()) {
            break outcome;
        }

        // Select the leaving row: the (weighted) worst primal infeasibility.
        let feasibility = engine.tolerances().primal_feasibility;
        for (position, entry) in violation.iter_mut().enumerate() {
            let basic = engine.basis()[position];
            let value = engine.value(basic);
            let (lower, upper) = engine.bounds(basic);
            let amount = (lower - value).max(value - upper);
            *entry = if amount > feasibility { amount } else { 0.0 };
        }
        let Some(leaving_position) = pricing.select(&violation) else {
            break LoopOutcome::Optimal;
        };

        let leaving = engine.basis()[leaving_position];
        let (lower, upper) = engine.bounds(leaving);
        let value = engine.value(leaving);
        // Direction of the dual step: +1 when the basic sits above its upper bound.
        let delta = if value > upper { 1.0 } else { -1.0 };
        let target = if delta > 0.0 { upper } else { lower };

        let rho = engine.solve_row(leaving_position);
        let pivot_row = engine.pivot_row(&rho);
        let duals = engine.compute_duals();

        // Dual ratio test: reduced costs move by `-t · delta · α_pj`; each nonbasic whose
        // reduced cost would cross zero blocks.
        let mut blockers = Vec::new();
        let pivot_tolerance = engine.tolerances().pivot;
        for (j, &alpha_pj) in pivot_row.iter().enumerate() {
            if alpha_pj.abs() <= pivot_tolerance {
                continue;
            }
            let directed = delta * alpha_pj;
            let reduced = engine.reduced_cost(j, &duals);
            let eligible = match engine.status(j) {
                BasisStatus::AtLower => directed > 0.0,
                BasisStatus::AtUpper => directed < 0.0,
                BasisStatus::Free => true,
                BasisStatus::Fixed | BasisStatus::Basic => false,
            };
            if eligible {
                blockers.push(Blocker {
                    index: j,
                    to_bound: reduced.abs(),
                    magnitude: directed.abs(),
                    bound: match engine.status(j) {
                        BasisStatus::AtUpper => BoundDirection::Upper,
                        _ => BoundDirection::Lower,
                    },
                });
            }
        }

        let Some(result) = harris(&blockers, engine.tolerances().dual_feasibility) else {
            // The dual is unbounded: the row of the inverse is a Farkas certificate.
            debug!("dual unbounded at row position {leaving_position}");
            ray = Some(Ray::Dual((0..m).map(|i| delta * rho[i]).collect()));
            break LoopOutcome::PrimalInfeasible;
        };
        let entering = blockers[result.choice].index;

        let alpha = engine.solve_column(entering);
        let pivot_element = alpha[leaving_position];
        if pivot_element.abs() <= pivot_tolerance {
            debug!("dual pivot too small ({pivot_element:e}), deferring to the primal");
            break LoopOutcome::SwitchToPrimal;
        }

        // Step for the entering variable that lands the leaving one on its violated bound.
        let step = (value - target) / pivot_element;
        trace!(
            "dual pivot {}: {entering} enters, {leaving} leaves, step {step:e}",
            engine.iterations(),
        );

        let (objective, infeasibility) = (engine.objective_value(), engine.primal_infeasibility());
        match progress.looping(objective, infeasibility.0, infeasibility.1, (entering, leaving)) {
            Verdict::Continue => {},
            Verdict::Intervene | Verdict::GiveUp => {
                debug!("dual method stalled, deferring to the primal");
                break LoopOutcome::SwitchToPrimal;
            },
        }

        let leaving_to_upper = delta > 0.0;
        if engine.pivot(entering, leaving_position, &alpha, step, leaving_to_upper).is_err() {
            break LoopOutcome::NumericalDifficulties;
        }

        if !matches!(pricing.rule(), PricingRule::Dantzig) {
            let tau = if matches!(pricing.rule(), PricingRule::SteepestEdge) {
                Some(engine.ftran(rho.clone()))
            } else {
                None
            };
            let alpha_slice: Vec<f64> = (0..m).map(|k| alpha[k]).collect();
            let tau_slice: Option<Vec<f64>> = tau.map(|t| (0..m).map(|k| t[k]).collect());
            pricing.update_dual(
                leaving_position,
                &alpha_slice,
                pivot_element,
                tau_slice.as_deref(),
            );
        }
    };

    RunResult { outcome, ray }
}

/// Flip nonbasic ranged variables to the bound matching the sign of their reduced cost.
///
/// # Return value
///
/// Whether the basis is dual feasible afterwards.
fn flip_to_dual_feasible(engine: &mut SimplexEngine) -> bool {
    let duals = engine.compute_duals();
    let tolerance = engine.tolerances().dual_feasibility;
    let mut feasible = true;
    for j in 0..engine.nr_variables() {
        let reduced = engine.reduced_cost(j, &duals);
        match engine.status(j) {
            BasisStatus::AtLower if reduced < -tolerance => {
                let (_, upper) = engine.bounds(j);
                if upper.is_finite() {
                    engine.flip_bound(j);
                } else {
                    feasible = false;
                }
            },
            BasisStatus::AtUpper if reduced > tolerance => {
                let (lower, _) = engine.bounds(j);
                if lower.is_finite() {
                    engine.flip_bound(j);
                } else {
                    feasible = false;
                }
            },
            BasisStatus::Free if reduced.abs() > tolerance => feasible = false,
            _ => {},
        }
    }
    feasible
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algorithm::simplex::Tolerances;
    use crate::algorithm::solve::CancelToken;
    use crate::data::linear_program::elements::Objective;
    use crate::data::linear_program::model::Model;

    #[test]
    fn dual_solves_a_feasible_start() {
        // min x + y, x + y >= 2, x, y in [0, 10]. The all logical basis is dual feasible after
        // flips and primal infeasible, exactly the dual method's home turf.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(2.0, f64::INFINITY);
        model.add_column(1.0, 0.0, 10.0, &[(0, 1.0)]);
        model.add_column(1.0, 0.0, 10.0, &[(0, 1.0)]);

        let mut engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        let cancel = CancelToken::new();
        let controls = Controls { iteration_limit: 100, deadline: None, cancel: &cancel };
        let result = dual(&mut engine, PricingRule::Devex, &controls);
        assert_eq!(result.outcome, LoopOutcome::Optimal);
        assert!((engine.objective_value() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn infeasible_model_yields_certificate() {
        // x <= 1 and x >= 3 cannot both hold.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(f64::NEG_INFINITY, 1.0);
        model.add_row(3.0, f64::INFINITY);
        model.add_column(0.0, 0.0, 10.0, &[(0, 1.0), (1, 1.0)]);

        let mut engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        let cancel = CancelToken::new();
        let controls = Controls { iteration_limit: 100, deadline: None, cancel: &cancel };
        let result = dual(&mut engine, PricingRule::Devex, &controls);
        assert_eq!(result.outcome, LoopOutcome::PrimalInfeasible);
        assert!(result.ray.is_some());
    }
}
