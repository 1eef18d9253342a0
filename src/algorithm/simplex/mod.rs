//! # Simplex
//!
//! Revised simplex over an internal bounded form. A model with `C` structural variables and `R`
//! constraints becomes `n = C + R` variables: the structurals followed by one logical (slack)
//! variable per row, with constraints `Ax − s = 0` and the row bounds moved onto the logicals.
//! The working matrix is `[A | −I]`, so every variable, structural or logical, is priced and
//! pivoted uniformly.
//!
//! Per iteration the engine does at most three factorization solves: a btran of the basic costs
//! for the duals, an ftran of the entering column, and a btran of a unit vector for the pivot
//! row. The factorization is patched with product form updates between refactorizations.
use log::{debug, warn};

use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::vector::DenseVector;
use crate::data::linear_algebra::SparseTuple;
use crate::data::linear_program::elements::{
    classify, BasisStatus, Boundedness, Objective, SolveStatus,
};
use crate::data::linear_program::model::Model;
use crate::data::linear_program::solution::Solution;
use crate::algorithm::factorization::{Factorization, FactorizeResult};

pub mod dual;
pub mod pricing;
pub mod primal;
pub mod progress;
pub mod ratio_test;

/// Numerical tolerances threaded through the simplex loops.
#[derive(Copy, Clone, Debug)]
pub struct Tolerances {
    /// A basic value beyond its bound by more than this is primal infeasible.
    pub primal_feasibility: f64,
    /// A reduced cost attractive by more than this is dual infeasible.
    pub dual_feasibility: f64,
    /// Pivot elements smaller than this in magnitude are rejected.
    pub pivot: f64,
    /// Bound relaxation for the first Harris ratio test pass.
    pub harris_relaxation: f64,
    /// Values below this in magnitude are treated as zero.
    pub zero: f64,
    /// An update with a smaller stability estimate forces a refactorization.
    pub update_stability: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            primal_feasibility: 1e-7,
            dual_feasibility: 1e-7,
            pivot: 1e-9,
            harris_relaxation: 1e-7,
            zero: 1e-12,
            update_stability: 1e-8,
        }
    }
}

/// Why an iteration loop stopped.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum LoopOutcome {
    /// No attractive candidate remains.
    Optimal,
    /// A certificate of primal infeasibility was found (dual unbounded).
    PrimalInfeasible,
    /// A certificate of primal unboundedness was found.
    DualInfeasible,
    /// Iteration budget exhausted.
    IterationLimit,
    /// Wall clock budget exhausted.
    TimeLimit,
    /// The anti cycling monitor gave up or the factorization kept failing.
    NumericalDifficulties,
    /// Cancelled through the cooperative token.
    Cancelled,
    /// The dual method wants the primal to take over (used by [`dual`] only).
    SwitchToPrimal,
}

impl LoopOutcome {
    pub(crate) fn into_status(self) -> SolveStatus {
        match self {
            LoopOutcome::Optimal => SolveStatus::Optimal,
            LoopOutcome::PrimalInfeasible => SolveStatus::PrimalInfeasible,
            LoopOutcome::DualInfeasible => SolveStatus::DualInfeasible,
            LoopOutcome::IterationLimit => SolveStatus::IterationLimit,
            LoopOutcome::TimeLimit => SolveStatus::TimeLimit,
            LoopOutcome::Cancelled => SolveStatus::Cancelled,
            LoopOutcome::NumericalDifficulties | LoopOutcome::SwitchToPrimal => {
                SolveStatus::NumericalDifficulties
            },
        }
    }
}

/// Attempts at repairing a singular basis before giving up.
const MAX_REPAIR_ATTEMPTS: usize = 10;

/// Budgets checked at the top of every iteration.
pub(crate) struct Controls<'a> {
    pub iteration_limit: usize,
    pub deadline: Option<std::time::Instant>,
    pub cancel: &'a crate::algorithm::solve::CancelToken,
}

impl Controls<'_> {
    /// Whether a budget ran out, and which one.
    pub(crate) fn interrupted(&self, iterations: usize) -> Option<LoopOutcome> {
        if self.cancel.is_cancelled() {
            return Some(LoopOutcome::Cancelled);
        }
        if iterations >= self.iteration_limit {
            return Some(LoopOutcome::IterationLimit);
        }
        if let Some(deadline) = self.deadline {
            if std::time::Instant::now() >= deadline {
                return Some(LoopOutcome::TimeLimit);
            }
        }
        None
    }
}

/// Revised simplex working state shared by the primal and dual methods.
pub struct SimplexEngine {
    /// Number of constraints, `R`.
    nr_rows: usize,
    /// Number of structural variables, `C`.
    nr_structurals: usize,
    objective: Objective,
    objective_offset: f64,
    /// Minimization costs over all `n` variables, zero for logicals.
    cost: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// `[A | −I]`, one column per variable.
    columns: SparseMatrix<f64>,
    /// Current value of every variable.
    x: Vec<f64>,
    /// Variable at each basis position.
    basis: Vec<usize>,
    /// Basis position of each variable, if basic.
    position_of: Vec<Option<usize>>,
    status: Vec<BasisStatus>,
    factorization: Factorization,
    tolerances: Tolerances,
    /// Pivots taken so far, across phases.
    iterations: usize,
}

impl SimplexEngine {
    /// Build the internal form from a validated model, starting with the all logical basis.
    #[must_use]
    pub fn from_model(model: &Model, tolerances: Tolerances, refactor_frequency: usize) -> Self {
        let nr_rows = model.nr_rows();
        let nr_structurals = model.nr_columns();
        let n = nr_structurals + nr_rows;
        let direction = model.objective().direction();

        let mut cost = vec![0.0; n];
        for (j, &c) in model.cost().iter().enumerate() {
            cost[j] = direction * c;
        }

        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        lower.extend_from_slice(model.column_lower());
        upper.extend_from_slice(model.column_upper());
        lower.extend_from_slice(model.row_lower());
        upper.extend_from_slice(model.row_upper());

        let mut columns = model.constraints().clone();
        for i in 0..nr_rows {
            columns.push_column(vec![(i, -1.0)]);
        }

        let mut engine = Self {
            nr_rows,
            nr_structurals,
            objective: model.objective(),
            objective_offset: model.objective_offset(),
            cost,
            lower,
            upper,
            columns,
            x: vec![0.0; n],
            basis: (nr_structurals..n).collect(),
            position_of: vec![None; n],
            status: vec![BasisStatus::AtLower; n],
            factorization: Factorization::new(nr_rows, tolerances.pivot, refactor_frequency),
            tolerances,
            iterations: 0,
        };
        for j in 0..n {
            engine.status[j] = engine.default_nonbasic_status(j);
            engine.x[j] = engine.nonbasic_value(j);
        }
        for (position, &j) in engine.basis.clone().iter().enumerate() {
            engine.status[j] = BasisStatus::Basic;
            engine.position_of[j] = Some(position);
        }
        engine
    }

    /// Total number of variables, structurals and logicals.
    #[must_use]
    pub fn nr_variables(&self) -> usize {
        self.nr_structurals + self.nr_rows
    }

    /// Number of constraints.
    #[must_use]
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    /// Number of structural variables.
    #[must_use]
    pub fn nr_structurals(&self) -> usize {
        self.nr_structurals
    }

    /// Pivots taken so far.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    pub(crate) fn cost(&self, j: usize) -> f64 {
        self.cost[j]
    }

    pub(crate) fn set_cost(&mut self, j: usize, value: f64) {
        self.cost[j] = value;
    }

    pub(crate) fn bounds(&self, j: usize) -> (f64, f64) {
        (self.lower[j], self.upper[j])
    }

    pub(crate) fn value(&self, j: usize) -> f64 {
        self.x[j]
    }

    pub(crate) fn status(&self, j: usize) -> BasisStatus {
        self.status[j]
    }

    pub(crate) fn basis(&self) -> &[usize] {
        &self.basis
    }

    pub(crate) fn column(&self, j: usize) -> &[SparseTuple<f64>] {
        self.columns.column(j)
    }

    /// The nonbasic status a variable takes when nothing else is known: the finite bound closest
    /// to zero, or free.
    fn default_nonbasic_status(&self, j: usize) -> BasisStatus {
        match classify(self.lower[j], self.upper[j]) {
            Boundedness::Fixed => BasisStatus::Fixed,
            Boundedness::Free => BasisStatus::Free,
            Boundedness::LowerOnly => BasisStatus::AtLower,
            Boundedness::UpperOnly => BasisStatus::AtUpper,
            Boundedness::Ranged => {
                if self.lower[j].abs() <= self.upper[j].abs() {
                    BasisStatus::AtLower
                } else {
                    BasisStatus::AtUpper
                }
            },
        }
    }

    /// The value a nonbasic variable holds under its status.
    fn nonbasic_value(&self, j: usize) -> f64 {
        match self.status[j] {
            BasisStatus::AtLower | BasisStatus::Fixed => self.lower[j],
            BasisStatus::AtUpper => self.upper[j],
            BasisStatus::Free => 0.0,
            BasisStatus::Basic => unreachable!("basic variable has no bound value"),
        }
    }

    /// Overwrite the basis from externally supplied statuses, repairing the count with logicals
    /// where it does not come out at exactly one basic variable per row.
    pub fn install_basis(&mut self, statuses: &[BasisStatus]) {
        debug_assert_eq!(statuses.len(), self.nr_variables());

        let mut basics: Vec<usize> = statuses.iter()
            .enumerate()
            .filter(|(_, status)| status.is_basic())
            .map(|(j, _)| j)
            .collect();
        if basics.len() > self.nr_rows {
            warn!(
                "basis has {} basic variables for {} rows, truncating",
                basics.len(), self.nr_rows,
            );
            basics.truncate(self.nr_rows);
        }
        // Fill a short basis with logicals that are not yet basic.
        let mut next_logical = self.nr_structurals;
        while basics.len() < self.nr_rows {
            while basics.contains(&next_logical) {
                next_logical += 1;
            }
            basics.push(next_logical);
            next_logical += 1;
        }

        self.position_of.fill(None);
        for (j, status) in statuses.iter().enumerate() {
            self.status[j] = if status.is_basic() && !basics.contains(&j) {
                self.default_nonbasic_status(j)
            } else {
                *status
            };
        }
        self.basis = basics;
        for (position, &j) in self.basis.iter().enumerate() {
            self.status[j] = BasisStatus::Basic;
            self.position_of[j] = Some(position);
        }
        for j in 0..self.nr_variables() {
            if !self.status[j].is_basic() {
                self.x[j] = self.nonbasic_value(j);
            }
        }
    }

    /// Factorize the current basis, replacing variables that make it singular by the logicals of
    /// the rows the factorization could not cover.
    pub fn refactorize(&mut self) -> Result<(), SolveStatus> {
        for _ in 0..MAX_REPAIR_ATTEMPTS {
            let basis_columns: Vec<Vec<SparseTuple<f64>>> = self.basis.iter()
                .map(|&j| self.columns.column(j).to_vec())
                .collect();
            match self.factorization.factorize(&basis_columns) {
                FactorizeResult::Ok => {
                    self.compute_basic_values();
                    return Ok(());
                },
                FactorizeResult::Singular { basis_positions, missing_rows } => {
                    debug!(
                        "singular basis, replacing {} positions with logicals",
                        basis_positions.len(),
                    );
                    for (&position, &row) in basis_positions.iter().zip(&missing_rows) {
                        let outgoing = self.basis[position];
                        let logical = self.nr_structurals + row;
                        self.status[outgoing] = self.default_nonbasic_status(outgoing);
                        self.x[outgoing] = self.nonbasic_value(outgoing);
                        self.position_of[outgoing] = None;
                        if let Some(old_position) = self.position_of[logical] {
                            // The logical is already basic elsewhere; swap instead of duplicating.
                            self.basis.swap(position, old_position);
                            self.position_of[self.basis[old_position]] = Some(old_position);
                        } else {
                            self.basis[position] = logical;
                            self.status[logical] = BasisStatus::Basic;
                        }
                        self.position_of[self.basis[position]] = Some(position);
                    }
                },
            }
        }
        warn!("basis repair did not converge after {MAX_REPAIR_ATTEMPTS} attempts");
        Err(SolveStatus::NumericalDifficulties)
    }

    /// Recompute the basic values from the nonbasic ones: solve `B x_B = −N x_N`.
    pub fn compute_basic_values(&mut self) {
        let mut rhs = DenseVector::zeros(self.nr_rows);
        for j in 0..self.nr_variables() {
            if !self.status[j].is_basic() {
                let value = self.x[j];
                if value != 0.0 {
                    for &(i, coefficient) in self.columns.column(j) {
                        rhs[i] -= coefficient * value;
                    }
                }
            }
        }
        self.factorization.ftran(&mut rhs);
        for (position, &j) in self.basis.iter().enumerate() {
            self.x[j] = rhs[position];
        }
    }

    /// The dual values `y = B⁻ᵀ c_B` for the current basis.
    #[must_use]
    pub fn compute_duals(&mut self) -> DenseVector<f64> {
        let mut y = DenseVector::zeros(self.nr_rows);
        for (position, &j) in self.basis.iter().enumerate() {
            y[position] = self.cost[j];
        }
        self.factorization.btran(&mut y);
        y
    }

    /// Reduced cost of a variable against given duals.
    #[must_use]
    pub fn reduced_cost(&self, j: usize, duals: &DenseVector<f64>) -> f64 {
        let mut value = self.cost[j];
        for &(i, coefficient) in self.columns.column(j) {
            value -= duals[i] * coefficient;
        }
        value
    }

    /// Solve `B α = a_q` for the entering column.
    #[must_use]
    pub fn solve_column(&mut self, j: usize) -> DenseVector<f64> {
        let mut alpha = DenseVector::zeros(self.nr_rows);
        for &(i, coefficient) in self.columns.column(j) {
            alpha[i] = coefficient;
        }
        self.factorization.ftran(&mut alpha);
        alpha
    }

    /// Solve `ρ = B⁻ᵀ e_p`, the row of the inverse for basis position `p`.
    #[must_use]
    pub fn solve_row(&mut self, position: usize) -> DenseVector<f64> {
        let mut rho = DenseVector::zeros(self.nr_rows);
        rho[position] = 1.0;
        self.factorization.btran(&mut rho);
        rho
    }

    /// Solve `B τ = v` for an arbitrary row-space vector, used by steepest edge maintenance.
    #[must_use]
    pub fn ftran(&mut self, mut vector: DenseVector<f64>) -> DenseVector<f64> {
        self.factorization.ftran(&mut vector);
        vector
    }

    /// Solve `Bᵀ τ = v` for a basis-position vector.
    #[must_use]
    pub fn btran(&mut self, mut vector: DenseVector<f64>) -> DenseVector<f64> {
        self.factorization.btran(&mut vector);
        vector
    }

    /// The inner product of a column with the duals, `y · aⱼ`.
    #[must_use]
    pub fn column_activity(&self, j: usize, duals: &DenseVector<f64>) -> f64 {
        self.columns.column_dot(j, duals)
    }

    /// Duals priced against the composite phase one cost vector: `−1` for basics below their
    /// lower bound, `+1` above their upper bound, zero elsewhere.
    ///
    /// # Return value
    ///
    /// The duals, or `None` when every basic variable is within bounds.
    #[must_use]
    pub fn compute_phase1_duals(&mut self) -> Option<DenseVector<f64>> {
        let mut c_basic = DenseVector::zeros(self.nr_rows);
        let mut any = false;
        for (position, &j) in self.basis.iter().enumerate() {
            let value = self.x[j];
            if value < self.lower[j] - self.tolerances.primal_feasibility {
                c_basic[position] = -1.0;
                any = true;
            } else if value > self.upper[j] + self.tolerances.primal_feasibility {
                c_basic[position] = 1.0;
                any = true;
            }
        }
        if !any {
            return None;
        }
        self.factorization.btran(&mut c_basic);
        Some(c_basic)
    }

    /// The tableau row over all variables for a row of the inverse: `αₚⱼ = ρ · aⱼ` for every
    /// nonbasic `j`, zero for basic ones.
    #[must_use]
    pub fn pivot_row(&self, rho: &DenseVector<f64>) -> Vec<f64> {
        let n = self.nr_variables();
        let mut row = vec![0.0; n];
        for (j, value) in row.iter_mut().enumerate() {
            if !self.status[j].is_basic() {
                *value = self.columns.column_dot(j, rho);
            }
        }
        row
    }

    /// Move a nonbasic variable to its opposite bound without a basis change.
    pub fn flip_bound(&mut self, j: usize) {
        debug_assert!(matches!(
            classify(self.lower[j], self.upper[j]),
            Boundedness::Ranged,
        ));
        let (new_status, new_value) = match self.status[j] {
            BasisStatus::AtLower => (BasisStatus::AtUpper, self.upper[j]),
            BasisStatus::AtUpper => (BasisStatus::AtLower, self.lower[j]),
            other => unreachable!("cannot flip a variable with status {other}"),
        };
        let delta = new_value - self.x[j];
        self.status[j] = new_status;
        self.x[j] = new_value;
        // Basic values absorb the move.
        let mut rhs = DenseVector::zeros(self.nr_rows);
        for &(i, coefficient) in self.columns.column(j) {
            rhs[i] = -coefficient * delta;
        }
        self.factorization.ftran(&mut rhs);
        for (position, &basic) in self.basis.iter().enumerate() {
            self.x[basic] += rhs[position];
        }
    }

    /// Execute a basis change: `entering` replaces the variable at `leaving_position`.
    ///
    /// # Arguments
    ///
    /// * `alpha`: The solved entering column `B⁻¹ a_q`.
    /// * `step`: Primal step length along the entering variable.
    /// * `leaving_to_upper`: Whether the leaving variable lands on its upper bound.
    ///
    /// # Return value
    ///
    /// `Err` when the factorization update was too unstable and the subsequent refactorization
    /// failed.
    pub fn pivot(
        &mut self,
        entering: usize,
        leaving_position: usize,
        alpha: &DenseVector<f64>,
        step: f64,
        leaving_to_upper: bool,
    ) -> Result<(), SolveStatus> {
        let leaving = self.basis[leaving_position];
        debug_assert_ne!(entering, leaving);
        debug_assert!(!self.status[entering].is_basic());

        // Update primal values along the solved column.
        for (position, &basic) in self.basis.iter().enumerate() {
            self.x[basic] -= alpha[position] * step;
        }
        self.x[entering] += step;

        self.status[leaving] = if (self.upper[leaving] - self.lower[leaving]).abs()
            <= self.tolerances.zero
        {
            BasisStatus::Fixed
        } else if leaving_to_upper {
            BasisStatus::AtUpper
        } else {
            BasisStatus::AtLower
        };
        self.x[leaving] = self.nonbasic_value(leaving);
        self.position_of[leaving] = None;
        self.basis[leaving_position] = entering;
        self.position_of[entering] = Some(leaving_position);
        self.status[entering] = BasisStatus::Basic;
        self.iterations += 1;

        let stability = self.factorization.update(leaving_position, alpha);
        if stability < self.tolerances.update_stability || self.factorization.should_refactorize() {
            self.refactorize().map_err(|status| {
                warn!("refactorization after pivot failed");
                status
            })?;
        }
        Ok(())
    }

    /// Sum and count of primal bound violations over the basic variables.
    #[must_use]
    pub fn primal_infeasibility(&self) -> (f64, usize) {
        let mut sum = 0.0;
        let mut count = 0;
        for &j in &self.basis {
            let value = self.x[j];
            let below = self.lower[j] - value;
            let above = value - self.upper[j];
            let violation = below.max(above);
            if violation > self.tolerances.primal_feasibility {
                sum += violation;
                count += 1;
            }
        }
        (sum, count)
    }

    /// Objective of the current point in the user's orientation, offset included.
    #[must_use]
    pub fn objective_value(&self) -> f64 {
        let inner: f64 = self.x.iter().zip(&self.cost).map(|(x, c)| x * c).sum();
        self.objective.direction() * inner + self.objective_offset
    }

    /// Basis statuses for all variables, structurals first.
    #[must_use]
    pub fn statuses(&self) -> Vec<BasisStatus> {
        self.status.clone()
    }

    /// Package the current point as a solution with the given status.
    #[must_use]
    pub fn extract_solution(&mut self, status: SolveStatus) -> Solution {
        let duals = self.compute_duals();
        let direction = self.objective.direction();

        let mut solution = Solution::empty(self.nr_rows, self.nr_structurals);
        solution.status = status;
        solution.objective_value = self.objective_value();
        solution.iterations = self.iterations;
        for j in 0..self.nr_structurals {
            solution.primal_columns[j] = self.x[j];
            solution.dual_columns[j] = direction * self.reduced_cost(j, &duals);
            solution.column_status[j] = self.status[j];
        }
        for i in 0..self.nr_rows {
            let logical = self.nr_structurals + i;
            solution.primal_rows[i] = self.x[logical];
            solution.dual_rows[i] = direction * duals[i];
            solution.row_status[i] = self.status[logical];
        }
        solution
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn small_model() -> Model {
        // max x + y, x + y <= 4, x <= 3, y <= 3, x, y >= 0
        let mut model = Model::new(Objective::Maximize);
        model.add_row(f64::NEG_INFINITY, 4.0);
        model.add_row(f64::NEG_INFINITY, 3.0);
        model.add_row(f64::NEG_INFINITY, 3.0);
        model.add_column(1.0, 0.0, f64::INFINITY, &[(0, 1.0), (1, 1.0)]);
        model.add_column(1.0, 0.0, f64::INFINITY, &[(0, 1.0), (2, 1.0)]);
        model
    }

    #[test]
    fn internal_form_dimensions() {
        let model = small_model();
        let engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        assert_eq!(engine.nr_variables(), 5);
        assert_eq!(engine.nr_rows(), 3);
        assert_eq!(engine.basis(), &[2, 3, 4]);
    }

    #[test]
    fn logical_columns_are_negative_unit() {
        let model = small_model();
        let engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        assert_eq!(engine.column(3), &[(1, -1.0)]);
    }

    #[test]
    fn maximization_negates_costs() {
        let model = small_model();
        let engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        assert_eq!(engine.cost(0), -1.0);
        assert_eq!(engine.cost(2), 0.0);
    }

    #[test]
    fn logical_basis_factorizes() {
        let model = small_model();
        let mut engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        assert!(engine.refactorize().is_ok());
        // All structurals at zero, so the logicals sit at zero as well.
        for j in 0..engine.nr_variables() {
            assert_eq!(engine.value(j), 0.0);
        }
    }

    #[test]
    fn duals_of_logical_basis_are_zero() {
        let model = small_model();
        let mut engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        engine.refactorize().unwrap();
        let duals = engine.compute_duals();
        for i in 0..engine.nr_rows() {
            assert_eq!(duals[i], 0.0);
        }
        // Reduced costs then equal the raw costs.
        assert_eq!(engine.reduced_cost(0, &duals), -1.0);
    }

    #[test]
    fn fixed_variable_leaves_with_fixed_status() {
        // The logical of an equality row must come out of the basis as Fixed whichever side
        // the ratio test reports, or pricing would try to flip it later.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(1.0, 1.0);
        model.add_column(-1.0, 0.0, 2.0, &[(0, 1.0)]);
        let mut engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        engine.refactorize().unwrap();

        let mut alpha = DenseVector::zeros(1);
        alpha[0] = -1.0;
        engine.pivot(0, 0, &alpha, 1.0, true).unwrap();
        assert_eq!(engine.statuses()[1], BasisStatus::Fixed);
        assert_eq!(engine.value(0), 1.0);
    }

    #[test]
    fn install_basis_repairs_short_count() {
        let model = small_model();
        let mut engine = SimplexEngine::from_model(&model, Tolerances::default(), 100);
        // Only one variable marked basic for three rows.
        let mut statuses = vec![BasisStatus::AtLower; 5];
        statuses[0] = BasisStatus::Basic;
        engine.install_basis(&statuses);
        assert_eq!(engine.basis().len(), 3);
        assert!(engine.refactorize().is_ok());
    }
}
