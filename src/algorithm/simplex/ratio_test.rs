//! # Ratio tests
//!
//! Given a movement direction, the ratio test finds how far the step can go before some variable
//! hits a bound, and which variable that is. Ties between blockers are broken toward the largest
//! pivot magnitude, which keeps the basis change numerically stable. Both the primal test (step
//! along an entering column) and the dual test (step along a pivot row) share the same two pass
//! structure, due to Harris: the first pass bounds the step with bounds relaxed by the
//! feasibility tolerance, the second picks the most stable blocker among those admissible within
//! that step.
use crate::data::linear_program::elements::BoundDirection;

/// One variable that may block the step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Blocker {
    /// Caller-side identifier: a basis position (primal) or a variable index (dual).
    pub index: usize,
    /// Distance to the blocking bound, nonnegative; zero for degenerate blockers.
    pub to_bound: f64,
    /// Magnitude of the pivot element associated with this blocker, positive.
    pub magnitude: f64,
    /// Which bound blocks.
    pub bound: BoundDirection,
}

/// The chosen blocker and the resulting step length.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RatioTestResult {
    /// Position in the candidates slice of the chosen blocker.
    pub choice: usize,
    /// Step length, clipped to be nonnegative.
    pub step: f64,
}

/// Harris two pass ratio test.
///
/// # Arguments
///
/// * `blockers`: All variables with a bound in the way of the step. Entries with magnitude below
///   the caller's zero tolerance should not be included.
/// * `relaxation`: How far bounds may be overshot in the first pass (the feasibility tolerance).
///
/// # Return value
///
/// `None` if nothing blocks (the step is unbounded), otherwise the blocker with the largest
/// pivot magnitude among those whose true ratio fits within the relaxed step bound.
#[must_use]
pub fn harris(blockers: &[Blocker], relaxation: f64) -> Option<RatioTestResult> {
    debug_assert!(blockers.iter().all(|b| b.to_bound >= 0.0 && b.magnitude > 0.0));

    // Pass 1: the smallest ratio with relaxed bounds limits the step.
    let relaxed_bound = blockers.iter()
        .map(|b| (b.to_bound + relaxation) / b.magnitude)
        .min_by(f64::total_cmp)?;

    // Pass 2: among blockers whose true ratio is admissible, take the largest pivot.
    let choice = blockers.iter()
        .enumerate()
        .filter(|(_, b)| b.to_bound / b.magnitude <= relaxed_bound)
        .max_by(|(_, a), (_, b)| a.magnitude.total_cmp(&b.magnitude))
        .map(|(i, _)| i)?;

    let step = (blockers[choice].to_bound / blockers[choice].magnitude).max(0.0);
    Some(RatioTestResult { choice, step })
}

#[cfg(test)]
mod test {
    use super::*;

    fn blocker(index: usize, to_bound: f64, magnitude: f64) -> Blocker {
        Blocker { index, to_bound, magnitude, bound: BoundDirection::Lower }
    }

    #[test]
    fn unblocked_step_is_none() {
        assert_eq!(harris(&[], 1e-7), None);
    }

    #[test]
    fn smallest_ratio_wins() {
        let blockers = [blocker(0, 10.0, 1.0), blocker(1, 1.0, 1.0)];
        let result = harris(&blockers, 1e-7).unwrap();
        assert_eq!(result.choice, 1);
        assert!((result.step - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tie_break_prefers_large_pivot() {
        // Both blockers allow (nearly) the same step; the second has the better pivot.
        let blockers = [blocker(0, 1.0, 0.1), blocker(1, 10.0, 1.0)];
        let result = harris(&blockers, 1e-7).unwrap();
        assert_eq!(result.choice, 1);
    }

    #[test]
    fn degenerate_blocker_keeps_step_nonnegative() {
        let blockers = [blocker(0, 0.0, 0.5)];
        let result = harris(&blockers, 1e-7).unwrap();
        assert_eq!(result.step, 0.0);
    }

    #[test]
    fn relaxation_admits_near_ties() {
        // The first blocker is strictly tighter (ratio 99.99 against 100), but its pivot is
        // poor. The relaxed first pass admits both, and the second picks the stable one.
        let blockers = [blocker(0, 0.9999, 0.01), blocker(1, 100.0, 1.0)];
        let result = harris(&blockers, 1e-3).unwrap();
        assert_eq!(result.choice, 1);

        // Without relaxation the tight, unstable blocker would win.
        let strict = harris(&blockers, 0.0).unwrap();
        assert_eq!(strict.choice, 0);
    }
}
