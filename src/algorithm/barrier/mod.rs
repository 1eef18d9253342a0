//! # Barrier method
//!
//! A primal-dual interior point method on the internal bounded form: variables are the
//! structurals followed by one logical per row, the constraints are `W x = 0` with
//! `W = [A | −I]`, and all inequality information lives in the variable bounds. Each iteration
//! eliminates the bound multipliers, assembles the normal equations `W Θ Wᵀ + δI`, factorizes
//! them with the cached-symbolic sparse Cholesky and takes a Mehrotra predictor-corrector step
//! with a fraction-to-boundary line search.
//!
//! Variables whose scaling entry collapses are dropped (temporarily pinned); too many drops
//! abort the method in favor of the simplex.
use log::{debug, info, warn};

use crate::algorithm::barrier::cholesky::SparseCholesky;
use crate::algorithm::solve::CancelToken;
use crate::data::linear_algebra::SparseTuple;
use crate::data::linear_program::model::Model;

pub mod cholesky;
pub mod crossover;

/// Barrier method tuning knobs.
#[derive(Clone, Debug)]
pub struct BarrierConfig {
    /// Relative duality gap and residual target.
    pub tolerance: f64,
    /// Maximum number of interior point iterations.
    pub iteration_limit: usize,
    /// Diagonal regularization `δ` of the normal equations.
    pub regularization: f64,
    /// A scaling entry below this drops its column for the iteration.
    pub theta_floor: f64,
    /// Abort when more than this fraction of the columns is dropped.
    pub max_drop_fraction: f64,
    /// Fraction-to-boundary multiplier.
    pub step_scale: f64,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            iteration_limit: 200,
            regularization: 1e-10,
            theta_floor: 1e-12,
            max_drop_fraction: 0.25,
            step_scale: 0.995,
        }
    }
}

/// The iterate a barrier run ends on.
#[derive(Debug)]
pub struct InteriorPoint {
    /// Values for all variables, structurals then logicals.
    pub x: Vec<f64>,
    /// Equality duals.
    pub y: Vec<f64>,
    /// Net bound multiplier per variable, the interior analogue of a reduced cost.
    pub reduced_costs: Vec<f64>,
    /// Iterations spent reaching this point.
    pub iterations: usize,
}

/// How a barrier run ended.
#[derive(Debug)]
pub enum BarrierOutcome {
    /// Gap and residuals reached the tolerance.
    Converged(InteriorPoint),
    /// The iteration budget ran out; the last iterate may still be useful.
    IterationLimit(InteriorPoint),
    /// Factorization failure, collapsed scaling, or a problem shape the method cannot handle.
    Failed,
    /// The cancellation token fired.
    Cancelled,
}

/// Per-variable bound bookkeeping for the interior point iteration.
struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
    has_lower: Vec<bool>,
    has_upper: Vec<bool>,
    /// Number of finite bounds, the complementarity pair count.
    count: usize,
}

impl Bounds {
    fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        let has_lower: Vec<bool> = lower.iter().map(|l| l.is_finite()).collect();
        let has_upper: Vec<bool> = upper.iter().map(|u| u.is_finite()).collect();
        let count = has_lower.iter().filter(|&&h| h).count()
            + has_upper.iter().filter(|&&h| h).count();
        Self { lower, upper, has_lower, has_upper, count }
    }
}

/// Precomputed scatter of `W Θ Wᵀ` into a fixed upper triangular CSC pattern.
struct NormalEquations {
    starts: Vec<usize>,
    rows: Vec<usize>,
    values: Vec<f64>,
    /// Per instruction: target slot, source variable, constant `W_ik · W_jk` product.
    instructions: Vec<(usize, usize, f64)>,
    /// Slot of each diagonal entry.
    diagonal_slots: Vec<usize>,
}

impl NormalEquations {
    fn new(m: usize, columns: &[Vec<SparseTuple<f64>>]) -> Self {
        // Pattern first: all (row, column) pairs of the upper triangle that some variable hits.
        let mut keys: Vec<(usize, usize)> = Vec::new();
        for entries in columns {
            for (a, &(i, _)) in entries.iter().enumerate() {
                for &(j, _) in &entries[a..] {
                    keys.push((i.max(j), i.min(j)));
                }
            }
        }
        for i in 0..m {
            keys.push((i, i));
        }
        keys.sort_unstable();
        keys.dedup();

        let mut starts = vec![0; m + 1];
        for &(column, _) in &keys {
            starts[column + 1] += 1;
        }
        for column in 0..m {
            starts[column + 1] += starts[column];
        }
        let rows: Vec<usize> = keys.iter().map(|&(_, row)| row).collect();
        let slot_of = |column: usize, row: usize| -> usize {
            let range = starts[column]..starts[column + 1];
            range.start + rows[range.clone()].partition_point(|&r| r < row)
        };

        let mut instructions = Vec::new();
        for (k, entries) in columns.iter().enumerate() {
            for (a, &(i, v)) in entries.iter().enumerate() {
                for &(j, w) in &entries[a..] {
                    instructions.push((slot_of(i.max(j), i.min(j)), k, v * w));
                }
            }
        }
        let diagonal_slots: Vec<usize> = (0..m).map(|i| slot_of(i, i)).collect();

        let nonzeros = keys.len();
        Self { starts, rows, values: vec![0.0; nonzeros], instructions, diagonal_slots }
    }

    fn assemble(&mut self, theta: &[f64], delta: f64) {
        self.values.fill(0.0);
        for &(slot, k, product) in &self.instructions {
            self.values[slot] += theta[k] * product;
        }
        for &slot in &self.diagonal_slots {
            self.values[slot] += delta;
        }
    }
}

/// Run the barrier method on a validated model.
#[must_use]
pub fn barrier(model: &Model, config: &BarrierConfig, cancel: &CancelToken) -> BarrierOutcome {
    let m = model.nr_rows();
    let nr_structurals = model.nr_columns();
    let n = nr_structurals + m;
    let direction = model.objective().direction();

    // Internal form: W = [A | −I], costs zero on the logicals.
    let mut columns: Vec<Vec<SparseTuple<f64>>> = (0..nr_structurals)
        .map(|j| model.constraints().column(j).to_vec())
        .collect();
    columns.extend((0..m).map(|i| vec![(i, -1.0)]));
    let mut cost = vec![0.0; n];
    for (j, &c) in model.cost().iter().enumerate() {
        cost[j] = direction * c;
    }
    let mut lower = model.column_lower().to_vec();
    let mut upper = model.column_upper().to_vec();
    lower.extend_from_slice(model.row_lower());
    upper.extend_from_slice(model.row_upper());
    let bounds = Bounds::new(lower, upper);
    if bounds.count == 0 {
        warn!("barrier needs at least one finite bound, handing back");
        return BarrierOutcome::Failed;
    }

    let mut state = State::initial(&bounds, n, m);
    let mut normal = NormalEquations::new(m, &columns);
    let mut cholesky = SparseCholesky::new(m, 0.0);
    let mut delta = config.regularization;

    for iteration in 0..config.iteration_limit {
        if cancel.is_cancelled() {
            return BarrierOutcome::Cancelled;
        }

        let residuals = state.residuals(&columns, &cost, m, n);
        let mu = state.mu(&bounds);
        let (primal_objective, dual_objective) = state.objectives(&cost, &bounds);
        let gap = (primal_objective - dual_objective).abs() / (1.0 + primal_objective.abs());
        debug!(
            "barrier iteration {iteration}: mu {mu:.3e}, gap {gap:.3e}, \
             residuals {:.3e}/{:.3e}",
            residuals.primal_norm, residuals.dual_norm,
        );
        if gap < config.tolerance
            && residuals.primal_norm < config.tolerance * (1.0 + state.x_norm())
            && residuals.dual_norm < config.tolerance * (1.0 + max_abs(&cost))
        {
            info!("barrier converged in {iteration} iterations, gap {gap:.3e}");
            return BarrierOutcome::Converged(state.into_point(&bounds, direction, iteration));
        }

        // Diagonal scaling with collapse detection.
        let mut dropped = 0_usize;
        let theta: Vec<f64> = (0..n).map(|j| {
            let mut q = delta;
            if bounds.has_lower[j] {
                q += state.z_lower[j] / state.s_lower[j];
            }
            if bounds.has_upper[j] {
                q += state.z_upper[j] / state.s_upper[j];
            }
            let theta = 1.0 / q;
            if theta < config.theta_floor {
                // A variable with equal bounds has no interior; its scaling collapsing is the
                // iteration pinning it, not a numerical breakdown.
                if bounds.lower[j] < bounds.upper[j] {
                    dropped += 1;
                }
                0.0
            } else {
                theta
            }
        }).collect();
        if dropped as f64 > config.max_drop_fraction * n as f64 {
            warn!("barrier dropped {dropped} of {n} columns, giving up");
            return BarrierOutcome::Failed;
        }

        // Factorize W Θ Wᵀ + δI, bumping the regularization on failure.
        let mut factorized = false;
        for _ in 0..3 {
            normal.assemble(&theta, delta);
            match cholesky.factorize(&normal.starts, &normal.rows, &normal.values) {
                Ok(()) => {
                    factorized = true;
                    break;
                },
                Err(error) => {
                    delta = (delta * 100.0).max(1e-12);
                    debug!("normal equations factorization failed ({error}), delta now {delta:e}");
                },
            }
        }
        if !factorized {
            warn!("normal equations stayed indefinite after regularization bumps");
            return BarrierOutcome::Failed;
        }

        // Predictor: pure Newton step on the complementarity products.
        let affine = state.newton_step(
            &columns, &bounds, &theta, &cholesky, &residuals,
            |j, state| {
                let lower = if bounds.has_lower[j] {
                    -state.s_lower[j] * state.z_lower[j]
                } else {
                    0.0
                };
                let upper = if bounds.has_upper[j] {
                    -state.s_upper[j] * state.z_upper[j]
                } else {
                    0.0
                };
                (lower, upper)
            },
        );
        let (alpha_primal_affine, alpha_dual_affine) = state.step_lengths(&bounds, &affine, 1.0);
        let mu_affine = state.mu_after(&bounds, &affine, alpha_primal_affine, alpha_dual_affine);
        let sigma = (mu_affine / mu).powi(3).clamp(0.0, 1.0);

        // Corrector: recentre toward σμ and compensate the affine product terms.
        let step = state.newton_step(
            &columns, &bounds, &theta, &cholesky, &residuals,
            |j, state| {
                let lower = if bounds.has_lower[j] {
                    sigma * mu
                        - state.s_lower[j] * state.z_lower[j]
                        - affine.dx[j] * affine.dz_lower[j]
                } else {
                    0.0
                };
                let upper = if bounds.has_upper[j] {
                    sigma * mu
                        - state.s_upper[j] * state.z_upper[j]
                        + affine.dx[j] * affine.dz_upper[j]
                } else {
                    0.0
                };
                (lower, upper)
            },
        );
        let (alpha_primal, alpha_dual) = state.step_lengths(&bounds, &step, config.step_scale);
        state.apply(&bounds, &step, alpha_primal, alpha_dual);
    }

    info!("barrier hit its iteration limit");
    BarrierOutcome::IterationLimit(state.into_point(
        &bounds,
        direction,
        config.iteration_limit,
    ))
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

/// Primal and dual residuals with their infinity norms.
struct Residuals {
    primal: Vec<f64>,
    dual: Vec<f64>,
    primal_norm: f64,
    dual_norm: f64,
}

/// A Newton direction in all iterate components.
struct Direction {
    dx: Vec<f64>,
    dy: Vec<f64>,
    dz_lower: Vec<f64>,
    dz_upper: Vec<f64>,
}

/// The full primal-dual iterate.
struct State {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Distance to the finite lower bound, `x − l`.
    s_lower: Vec<f64>,
    /// Distance to the finite upper bound, `u − x`.
    s_upper: Vec<f64>,
    z_lower: Vec<f64>,
    z_upper: Vec<f64>,
}

impl State {
    /// A strictly interior starting point: variables centered within their bounds, unit
    /// multipliers on every finite bound.
    fn initial(bounds: &Bounds, n: usize, m: usize) -> Self {
        let mut x = vec![0.0; n];
        for j in 0..n {
            x[j] = match (bounds.has_lower[j], bounds.has_upper[j]) {
                (true, true) => 0.5 * (bounds.lower[j] + bounds.upper[j]),
                (true, false) => bounds.lower[j] + 1.0,
                (false, true) => bounds.upper[j] - 1.0,
                (false, false) => 0.0,
            };
        }
        let mut state = Self {
            x,
            y: vec![0.0; m],
            s_lower: vec![1.0; n],
            s_upper: vec![1.0; n],
            z_lower: vec![0.0; n],
            z_upper: vec![0.0; n],
        };
        for j in 0..n {
            // Fixed variables have no interior; the tiny floor collapses their scaling so the
            // iteration pins them in place.
            if bounds.has_lower[j] {
                state.s_lower[j] = (state.x[j] - bounds.lower[j]).max(1e-8);
                state.z_lower[j] = 1.0;
            }
            if bounds.has_upper[j] {
                state.s_upper[j] = (bounds.upper[j] - state.x[j]).max(1e-8);
                state.z_upper[j] = 1.0;
            }
        }
        state
    }

    fn residuals(
        &self,
        columns: &[Vec<SparseTuple<f64>>],
        cost: &[f64],
        m: usize,
        n: usize,
    ) -> Residuals {
        let mut primal = vec![0.0; m];
        for (j, entries) in columns.iter().enumerate() {
            let value = self.x[j];
            for &(i, coefficient) in entries {
                primal[i] -= coefficient * value;
            }
        }
        let mut dual = vec![0.0; n];
        for j in 0..n {
            let mut value = cost[j] - self.z_lower[j] + self.z_upper[j];
            for &(i, coefficient) in &columns[j] {
                value -= coefficient * self.y[i];
            }
            dual[j] = value;
        }
        let primal_norm = max_abs(&primal);
        let dual_norm = max_abs(&dual);
        Residuals { primal, dual, primal_norm, dual_norm }
    }

    fn mu(&self, bounds: &Bounds) -> f64 {
        let mut total = 0.0;
        for j in 0..self.x.len() {
            if bounds.has_lower[j] {
                total += self.s_lower[j] * self.z_lower[j];
            }
            if bounds.has_upper[j] {
                total += self.s_upper[j] * self.z_upper[j];
            }
        }
        total / bounds.count as f64
    }

    fn objectives(&self, cost: &[f64], bounds: &Bounds) -> (f64, f64) {
        let primal = cost.iter().zip(&self.x).map(|(c, x)| c * x).sum();
        let mut dual = 0.0;
        for j in 0..self.x.len() {
            if bounds.has_lower[j] {
                dual += bounds.lower[j] * self.z_lower[j];
            }
            if bounds.has_upper[j] {
                dual -= bounds.upper[j] * self.z_upper[j];
            }
        }
        (primal, dual)
    }

    fn x_norm(&self) -> f64 {
        max_abs(&self.x)
    }

    /// Solve the Newton system for given complementarity right-hand sides.
    ///
    /// `complementarity(j, state)` returns the targets for `z_l ds_l + s_l dz_l` and
    /// `z_u ds_u + s_u dz_u`.
    fn newton_step(
        &self,
        columns: &[Vec<SparseTuple<f64>>],
        bounds: &Bounds,
        theta: &[f64],
        cholesky: &SparseCholesky,
        residuals: &Residuals,
        complementarity: impl Fn(usize, &Self) -> (f64, f64),
    ) -> Direction {
        let n = self.x.len();

        // Reduced dual residual after eliminating the bound multipliers.
        let mut reduced = vec![0.0; n];
        let mut rc_lower = vec![0.0; n];
        let mut rc_upper = vec![0.0; n];
        for j in 0..n {
            let (lower, upper) = complementarity(j, self);
            rc_lower[j] = lower;
            rc_upper[j] = upper;
            let mut value = residuals.dual[j];
            if bounds.has_lower[j] {
                value -= lower / self.s_lower[j];
            }
            if bounds.has_upper[j] {
                value += upper / self.s_upper[j];
            }
            reduced[j] = value;
        }

        // Normal equations right-hand side: r_p + W Θ r̂.
        let mut rhs = residuals.primal.clone();
        for (j, entries) in columns.iter().enumerate() {
            let scaled = theta[j] * reduced[j];
            if scaled != 0.0 {
                for &(i, coefficient) in entries {
                    rhs[i] += coefficient * scaled;
                }
            }
        }
        cholesky.solve(&mut rhs);
        let dy = rhs;

        let mut dx = vec![0.0; n];
        for (j, entries) in columns.iter().enumerate() {
            let mut wt_dy = 0.0;
            for &(i, coefficient) in entries {
                wt_dy += coefficient * dy[i];
            }
            dx[j] = theta[j] * (wt_dy - reduced[j]);
        }

        let mut dz_lower = vec![0.0; n];
        let mut dz_upper = vec![0.0; n];
        for j in 0..n {
            if bounds.has_lower[j] {
                dz_lower[j] = (rc_lower[j] - self.z_lower[j] * dx[j]) / self.s_lower[j];
            }
            if bounds.has_upper[j] {
                dz_upper[j] = (rc_upper[j] + self.z_upper[j] * dx[j]) / self.s_upper[j];
            }
        }
        Direction { dx, dy, dz_lower, dz_upper }
    }

    /// Largest primal and dual steps keeping slacks and multipliers strictly positive.
    fn step_lengths(&self, bounds: &Bounds, direction: &Direction, scale: f64) -> (f64, f64) {
        let mut alpha_primal: f64 = 1.0;
        let mut alpha_dual: f64 = 1.0;
        for j in 0..self.x.len() {
            if bounds.has_lower[j] {
                if direction.dx[j] < 0.0 {
                    alpha_primal = alpha_primal.min(-self.s_lower[j] / direction.dx[j]);
                }
                if direction.dz_lower[j] < 0.0 {
                    alpha_dual = alpha_dual.min(-self.z_lower[j] / direction.dz_lower[j]);
                }
            }
            if bounds.has_upper[j] {
                if direction.dx[j] > 0.0 {
                    alpha_primal = alpha_primal.min(self.s_upper[j] / direction.dx[j]);
                }
                if direction.dz_upper[j] < 0.0 {
                    alpha_dual = alpha_dual.min(-self.z_upper[j] / direction.dz_upper[j]);
                }
            }
        }
        ((scale * alpha_primal).min(1.0), (scale * alpha_dual).min(1.0))
    }

    /// Average complementarity after a hypothetical step, for the Mehrotra centering weight.
    fn mu_after(
        &self,
        bounds: &Bounds,
        direction: &Direction,
        alpha_primal: f64,
        alpha_dual: f64,
    ) -> f64 {
        let mut total = 0.0;
        for j in 0..self.x.len() {
            if bounds.has_lower[j] {
                total += (self.s_lower[j] + alpha_primal * direction.dx[j])
                    * (self.z_lower[j] + alpha_dual * direction.dz_lower[j]);
            }
            if bounds.has_upper[j] {
                total += (self.s_upper[j] - alpha_primal * direction.dx[j])
                    * (self.z_upper[j] + alpha_dual * direction.dz_upper[j]);
            }
        }
        total / bounds.count as f64
    }

    fn apply(
        &mut self,
        bounds: &Bounds,
        direction: &Direction,
        alpha_primal: f64,
        alpha_dual: f64,
    ) {
        for j in 0..self.x.len() {
            self.x[j] += alpha_primal * direction.dx[j];
            if bounds.has_lower[j] {
                self.s_lower[j] = self.x[j] - bounds.lower[j];
                self.z_lower[j] += alpha_dual * direction.dz_lower[j];
            }
            if bounds.has_upper[j] {
                self.s_upper[j] = bounds.upper[j] - self.x[j];
                self.z_upper[j] += alpha_dual * direction.dz_upper[j];
            }
        }
        for (y, dy) in self.y.iter_mut().zip(&direction.dy) {
            *y += alpha_dual * dy;
        }
    }

    fn into_point(self, bounds: &Bounds, direction: f64, iterations: usize) -> InteriorPoint {
        let reduced_costs = (0..self.x.len())
            .map(|j| {
                let mut value = 0.0;
                if bounds.has_lower[j] {
                    value += self.z_lower[j];
                }
                if bounds.has_upper[j] {
                    value -= self.z_upper[j];
                }
                direction * value
            })
            .collect();
        InteriorPoint {
            x: self.x,
            y: self.y.iter().map(|&y| direction * y).collect(),
            reduced_costs,
            iterations,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::linear_program::elements::Objective;

    fn solve_small(model: &Model) -> InteriorPoint {
        let cancel = CancelToken::new();
        match barrier(model, &BarrierConfig::default(), &cancel) {
            BarrierOutcome::Converged(point) => point,
            other => panic!("expected convergence, got {other:?}"),
        }
    }

    #[test]
    fn bounded_box_problem_converges() {
        // min -x - y, x + y <= 1, 0 <= x, y <= 1. Optimum on the diagonal: x + y = 1.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(f64::NEG_INFINITY, 1.0);
        model.add_column(-1.0, 0.0, 1.0, &[(0, 1.0)]);
        model.add_column(-1.0, 0.0, 1.0, &[(0, 1.0)]);

        let point = solve_small(&model);
        assert!((point.x[0] + point.x[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equality_problem_converges_to_known_optimum() {
        // min x + 2y with x + y = 1, x, y in [0, 1]: optimum x = 1, y = 0.
        let mut model = Model::new(Objective::Minimize);
        model.add_row(1.0, 1.0);
        model.add_column(1.0, 0.0, 1.0, &[(0, 1.0)]);
        model.add_column(2.0, 0.0, 1.0, &[(0, 1.0)]);

        let point = solve_small(&model);
        assert!((point.x[0] - 1.0).abs() < 1e-5);
        assert!(point.x[1].abs() < 1e-5);
    }

    #[test]
    fn unbounded_variables_without_any_bound_fail_over() {
        let mut model = Model::new(Objective::Minimize);
        model.add_row(f64::NEG_INFINITY, f64::INFINITY);
        model.add_column(1.0, f64::NEG_INFINITY, f64::INFINITY, &[(0, 1.0)]);

        let cancel = CancelToken::new();
        assert!(matches!(
            barrier(&model, &BarrierConfig::default(), &cancel),
            BarrierOutcome::Failed,
        ));
    }
}
