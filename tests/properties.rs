//! # Property tests
//!
//! The crate-level guarantees: presolve round-trips the objective, bases stay accurate over
//! long update sequences, optimal solutions satisfy the optimality conditions, repeated and
//! warm-started solves behave, and degenerate problems terminate.
use linprog::algorithm::factorization::{Factorization, FactorizeResult};
use linprog::data::linear_algebra::vector::DenseVector;
use linprog::io::basis::BasisState;
use linprog::{
    solve, BasisStatus, Model, Objective, PresolveMode, PricingRule, SolveOptions, SolveStatus,
    SolveStrategy,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A model exercising several presolve rules at once: a fixed column, a singleton row, a
/// doubleton equality and a pair of proportional rows.
fn layered_model() -> Model {
    let mut model = Model::new(Objective::Minimize);
    model.add_row(f64::NEG_INFINITY, 12.0);
    model.add_row(f64::NEG_INFINITY, 24.0);
    model.add_row(f64::NEG_INFINITY, 5.0);
    model.add_row(3.0, 3.0);
    model.add_row(1.0, f64::INFINITY);
    model.add_column(-2.0, 0.0, 10.0, &[(0, 1.0), (1, 2.0), (4, 1.0)]);
    model.add_column(-3.0, 0.0, 10.0, &[(0, 2.0), (1, 4.0), (3, 1.0)]);
    model.add_column(1.0, 2.0, 2.0, &[(0, 1.0), (3, 1.0)]);
    model.add_column(0.5, 0.0, f64::INFINITY, &[(2, 1.0)]);
    model
}

#[test]
fn presolve_round_trips_the_objective() {
    init_logging();
    let model = layered_model();
    let with = solve(
        &model,
        &SolveOptions { presolve: PresolveMode::On, ..SolveOptions::default() },
    )
    .unwrap();
    let without = solve(
        &model,
        &SolveOptions { presolve: PresolveMode::Off, ..SolveOptions::default() },
    )
    .unwrap();

    assert_eq!(with.status, SolveStatus::Optimal);
    assert_eq!(without.status, SolveStatus::Optimal);
    let difference = (with.objective_value - without.objective_value).abs();
    assert!(difference <= 1e-6 * (1.0 + without.objective_value.abs()));

    // The postsolved point must satisfy the original constraints.
    for j in 0..model.nr_columns() {
        let value = with.primal_columns[j];
        assert!(value >= model.column_lower()[j] - 1e-6);
        assert!(value <= model.column_upper()[j] + 1e-6);
    }
    for i in 0..model.nr_rows() {
        let activity = with.primal_rows[i];
        assert!(activity >= model.row_lower()[i] - 1e-6);
        assert!(activity <= model.row_upper()[i] + 1e-6);
    }
}

#[test]
fn repeated_solves_are_identical() {
    let options = SolveOptions::default();
    let first = solve(&layered_model(), &options).unwrap();
    let second = solve(&layered_model(), &options).unwrap();
    assert_eq!(first.status, second.status);
    assert_eq!(first.objective_value, second.objective_value);
}

#[test]
fn optimality_conditions_hold_at_the_reported_optimum() {
    let model = layered_model();
    let solution = solve(
        &model,
        &SolveOptions { presolve: PresolveMode::Off, ..SolveOptions::default() },
    )
    .unwrap();
    assert_eq!(solution.status, SolveStatus::Optimal);

    // Row activities recomputed from scratch agree with the reported ones.
    for i in 0..model.nr_rows() {
        let activity: f64 = (0..model.nr_columns())
            .map(|j| {
                model
                    .constraints()
                    .column(j)
                    .iter()
                    .filter(|&&(row, _)| row == i)
                    .map(|&(_, coefficient)| coefficient * solution.primal_columns[j])
                    .sum::<f64>()
            })
            .sum();
        assert!((activity - solution.primal_rows[i]).abs() < 1e-6, "row {i}");
    }

    // Complementary slackness: a minimization problem needs nonnegative reduced costs at
    // lower bounds, nonpositive at upper bounds, zero on basics.
    for j in 0..model.nr_columns() {
        let reduced = solution.dual_columns[j];
        match solution.column_status[j] {
            BasisStatus::Basic => assert!(reduced.abs() < 1e-6, "column {j}"),
            BasisStatus::AtLower => assert!(reduced > -1e-6, "column {j}"),
            BasisStatus::AtUpper => assert!(reduced < 1e-6, "column {j}"),
            BasisStatus::Fixed | BasisStatus::Free => {},
        }
    }
    // Rows not at a bound carry no dual value.
    for i in 0..model.nr_rows() {
        if solution.row_status[i].is_basic() {
            assert!(solution.dual_rows[i].abs() < 1e-6, "row {i}");
        }
    }
}

/// Beale's cycling example: degenerate at the origin, known to cycle under naive largest
/// coefficient pricing. The progress monitor has to step in and finish the solve.
#[test]
fn beale_cycling_example_terminates() {
    init_logging();
    let mut model = Model::new(Objective::Minimize);
    model.add_row(f64::NEG_INFINITY, 0.0);
    model.add_row(f64::NEG_INFINITY, 0.0);
    model.add_row(f64::NEG_INFINITY, 1.0);
    model.add_column(-0.75, 0.0, f64::INFINITY, &[(0, 0.25), (1, 0.5)]);
    model.add_column(150.0, 0.0, f64::INFINITY, &[(0, -60.0), (1, -90.0)]);
    model.add_column(-0.02, 0.0, f64::INFINITY, &[(0, -0.04), (1, -0.02), (2, 1.0)]);
    model.add_column(6.0, 0.0, f64::INFINITY, &[(0, 9.0), (1, 3.0)]);

    let options = SolveOptions {
        strategy: SolveStrategy::Primal,
        presolve: PresolveMode::Off,
        pricing: PricingRule::Dantzig,
        iteration_limit: 1_000,
        ..SolveOptions::default()
    };
    let solution = solve(&model, &options).unwrap();
    assert_eq!(solution.status, SolveStatus::Optimal);
    assert!((solution.objective_value - (-0.05)).abs() < 1e-6);
    assert!(solution.iterations < 1_000);
}

#[test]
fn basis_file_round_trip_and_warm_start() {
    init_logging();
    let mut model = Model::new(Objective::Maximize);
    model.add_row(f64::NEG_INFINITY, 14.0);
    model.add_row(f64::NEG_INFINITY, 28.0);
    model.add_row(f64::NEG_INFINITY, 30.0);
    model.add_column(8.0, 0.0, f64::INFINITY, &[(0, 2.0), (1, 1.0), (2, 2.0)]);
    model.add_column(6.0, 0.0, f64::INFINITY, &[(0, 1.0), (1, 3.0), (2, 1.0)]);
    model.add_column(5.0, 0.0, f64::INFINITY, &[(0, 1.0), (1, 1.0), (2, 3.0)]);

    let cold_options =
        SolveOptions { presolve: PresolveMode::Off, ..SolveOptions::default() };
    let cold = solve(&model, &cold_options).unwrap();
    assert_eq!(cold.status, SolveStatus::Optimal);

    // Through the file format and back.
    let mut buffer = Vec::new();
    BasisState::from_solution(&cold).write(&mut buffer).unwrap();
    let state = BasisState::read(buffer.as_slice()).unwrap();
    assert_eq!(state, BasisState::from_solution(&cold));

    let warm_options = SolveOptions {
        warm_start: Some(state),
        ..SolveOptions::default()
    };
    let warm = solve(&model, &warm_options).unwrap();
    assert_eq!(warm.status, SolveStatus::Optimal);
    assert!((warm.objective_value - cold.objective_value).abs() < 1e-6);
    assert!(warm.iterations <= cold.iterations);
}

/// Deterministic pseudo-random stream for building well-conditioned test bases.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1_u64 << 53) as f64
    }
}

#[test]
fn hundred_updates_match_fresh_factorization() {
    init_logging();
    const M: usize = 6;
    const PIVOTS: usize = 100;

    let mut columns: Vec<Vec<(usize, f64)>> = (0..M).map(|i| vec![(i, 1.0)]).collect();
    let mut factorization = Factorization::new(M, 1e-9, 10 * PIVOTS);
    assert_eq!(factorization.factorize(&columns), FactorizeResult::Ok);

    let mut random = Lcg(0x5eed);
    for pivot in (0..M).cycle().take(PIVOTS) {
        // Diagonally dominant replacement column keeps the basis comfortably invertible.
        let mut column = vec![(pivot, 2.0 + random.next())];
        let neighbour = (pivot + 1) % M;
        column.push((neighbour, 0.3 * random.next()));

        let mut alpha = DenseVector::zeros(M);
        for &(i, v) in &column {
            alpha[i] = v;
        }
        factorization.ftran(&mut alpha);
        factorization.update(pivot, &alpha);
        columns[pivot] = column;
    }
    assert_eq!(factorization.nr_updates(), PIVOTS);

    let mut fresh = Factorization::new(M, 1e-9, 10 * PIVOTS);
    assert_eq!(fresh.factorize(&columns), FactorizeResult::Ok);

    let mut probe = DenseVector::zeros(M);
    for i in 0..M {
        probe[i] = 1.0 + i as f64;
    }
    let mut updated_result = probe.clone();
    factorization.ftran(&mut updated_result);
    let mut fresh_result = probe;
    fresh.ftran(&mut fresh_result);
    for k in 0..M {
        assert!(
            (updated_result[k] - fresh_result[k]).abs()
                < 1e-5 * (1.0 + fresh_result[k].abs()),
            "position {k}: {} vs {}",
            updated_result[k],
            fresh_result[k],
        );
    }
}
