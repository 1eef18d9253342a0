//! # Building blocks to describe linear programs
use std::fmt;
use std::ops::Not;

use enum_map::Enum;

/// Direction of optimization.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Objective {
    #[default]
    Minimize,
    Maximize,
}

impl Objective {
    /// The sign with which costs enter the internal minimization form.
    #[must_use]
    pub fn direction(self) -> f64 {
        match self {
            Objective::Minimize => 1.0,
            Objective::Maximize => -1.0,
        }
    }
}

/// Direction of a bound.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Enum)]
pub enum BoundDirection {
    /// `x >= b`, or for a row, the lower row bound.
    Lower,
    /// `x <= b`, or for a row, the upper row bound.
    Upper,
}

impl Not for BoundDirection {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Lower => Self::Upper,
            Self::Upper => Self::Lower,
        }
    }
}

/// Classification of a row or column by its bound pair.
///
/// Rows with `lower == upper` are equalities, rows without finite bounds are free and are ignored
/// as constraints except for reporting.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Boundedness {
    Fixed,
    Ranged,
    LowerOnly,
    UpperOnly,
    Free,
}

/// Classify a `(lower, upper)` bound pair.
#[must_use]
pub fn classify(lower: f64, upper: f64) -> Boundedness {
    match (lower > f64::NEG_INFINITY, upper < f64::INFINITY) {
        (true, true) if lower == upper => Boundedness::Fixed,
        (true, true) => Boundedness::Ranged,
        (true, false) => Boundedness::LowerOnly,
        (false, true) => Boundedness::UpperOnly,
        (false, false) => Boundedness::Free,
    }
}

/// Per-variable basis state.
///
/// Applies to structural variables and row slacks alike. Once a basis exists, exactly as many
/// variables are `Basic` as there are rows.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum BasisStatus {
    /// In the basis; its value is determined by the basic system solve.
    Basic,
    /// Nonbasic at its lower bound.
    AtLower,
    /// Nonbasic at its upper bound.
    AtUpper,
    /// Nonbasic with equal lower and upper bound.
    Fixed,
    /// Nonbasic without a bound to rest at (superbasic); its value is kept explicitly.
    Free,
}

impl BasisStatus {
    /// Whether the variable is in the basis.
    #[must_use]
    pub fn is_basic(self) -> bool {
        self == BasisStatus::Basic
    }
}

impl fmt::Display for BasisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BasisStatus::Basic => "basic",
            BasisStatus::AtLower => "at-lower",
            BasisStatus::AtUpper => "at-upper",
            BasisStatus::Fixed => "fixed",
            BasisStatus::Free => "free",
        };
        f.write_str(text)
    }
}

/// Outcome of a solve call.
///
/// These are first-class results: callers must branch on the status rather than assume success.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SolveStatus {
    /// An optimal basic solution (or interior point within tolerance) was found.
    Optimal,
    /// No primal feasible point exists; a Farkas certificate ray is available.
    PrimalInfeasible,
    /// The problem is dual infeasible (unbounded in the optimization direction); an unbounded
    /// primal ray is available.
    DualInfeasible,
    /// The iteration limit stopped the solve; the solution holds the last iterate.
    IterationLimit,
    /// The time limit stopped the solve; the solution holds the last iterate.
    TimeLimit,
    /// Numerical difficulties persisted through all recovery attempts.
    NumericalDifficulties,
    /// The cancellation token was triggered at an iteration boundary.
    Cancelled,
}

impl SolveStatus {
    /// Whether the solve ran to a definite conclusion about the problem.
    #[must_use]
    pub fn is_conclusive(self) -> bool {
        matches!(
            self,
            SolveStatus::Optimal | SolveStatus::PrimalInfeasible | SolveStatus::DualInfeasible,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(classify(1.0, 1.0), Boundedness::Fixed);
        assert_eq!(classify(0.0, 2.0), Boundedness::Ranged);
        assert_eq!(classify(0.0, f64::INFINITY), Boundedness::LowerOnly);
        assert_eq!(classify(f64::NEG_INFINITY, 3.0), Boundedness::UpperOnly);
        assert_eq!(classify(f64::NEG_INFINITY, f64::INFINITY), Boundedness::Free);
    }

    #[test]
    fn directions() {
        assert_eq!(Objective::Minimize.direction(), 1.0);
        assert_eq!(Objective::Maximize.direction(), -1.0);
        assert_eq!(!BoundDirection::Lower, BoundDirection::Upper);
    }
}
