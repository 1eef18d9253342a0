//! # Crossover
//!
//! Turn an interior point into a starting basis for the simplex. Variables close to a bound
//! become nonbasic at that bound; of the remainder, the ones deepest inside their bounds fill
//! the basis. The primal simplex then clears up the handful of remaining infeasibilities.
use log::debug;

use crate::algorithm::barrier::InteriorPoint;
use crate::algorithm::simplex::SimplexEngine;
use crate::data::linear_program::elements::BasisStatus;

/// Guess basis statuses from an interior point and install them.
///
/// The engine repairs the guess where it is singular, so the statuses only need to be
/// plausible, not exact.
pub(crate) fn install_crossover_basis(
    engine: &mut SimplexEngine,
    point: &InteriorPoint,
    tolerance: f64,
) {
    let n = engine.nr_variables();
    let m = engine.nr_rows();
    debug_assert_eq!(point.x.len(), n);

    let mut statuses = Vec::with_capacity(n);
    // Interior depth of each variable that is not clearly at a bound.
    let mut candidates: Vec<(usize, f64)> = Vec::new();
    for j in 0..n {
        let (lower, upper) = engine.bounds(j);
        let value = point.x[j];
        let to_lower = value - lower;
        let to_upper = upper - value;
        let status = if upper - lower <= tolerance && lower.is_finite() {
            BasisStatus::Fixed
        } else if to_lower <= tolerance && lower.is_finite() {
            BasisStatus::AtLower
        } else if to_upper <= tolerance && upper.is_finite() {
            BasisStatus::AtUpper
        } else {
            candidates.push((j, to_lower.min(to_upper)));
            BasisStatus::Basic
        };
        statuses.push(status);
    }

    // At most m variables can be basic; demote the shallowest surplus to their nearest bound.
    if candidates.len() > m {
        candidates.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));
        for &(j, _) in &candidates[m..] {
            let (lower, upper) = engine.bounds(j);
            statuses[j] = if !lower.is_finite() && !upper.is_finite() {
                BasisStatus::Free
            } else if point.x[j] - lower <= upper - point.x[j] {
                BasisStatus::AtLower
            } else {
                BasisStatus::AtUpper
            };
        }
    }
    debug!(
        "crossover: {} basic candidates for {} rows",
        candidates.len().min(m),
        m,
    );

    engine.install_basis(&statuses);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algorithm::simplex::Tolerances;
    use crate::data::linear_program::elements::Objective;
    use crate::data::linear_program::model::Model;

    #[test]
    fn near_bound_values_become_nonbasic() {
        // One row, one structural: x in [0, 10], x - s = 0, s <= 4.
        let mut model = Model::new(Objective::Maximize);
        model.add_row(f64::NEG_INFINITY, 4.0);
        model.add_column(1.0, 0.0, 10.0, &[(0, 1.0)]);
        let mut engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);

        let point = InteriorPoint {
            x: vec![3.999_999_9, 3.999_999_9],
            y: vec![1.0],
            reduced_costs: vec![0.0, -1.0],
            iterations: 7,
        };
        install_crossover_basis(&mut engine, &point, 1e-5);

        // The structural is interior, the logical is at its upper bound.
        let statuses = engine.statuses();
        assert_eq!(statuses[0], BasisStatus::Basic);
        assert_eq!(statuses[1], BasisStatus::AtUpper);
    }
}
