//! # Small example problems
//!
//! End-to-end solves of hand-checkable problems through the public interface, covering all
//! three conclusive outcomes and both presolve settings.
use linprog::data::linear_program::solution::Ray;
use linprog::{
    solve, Model, Objective, PresolveMode, SolveOptions, SolveStatus, SolveStrategy,
};

fn options(presolve: PresolveMode) -> SolveOptions {
    SolveOptions { presolve, ..SolveOptions::default() }
}

/// `min x + y` with `x + y >= 2`, `x <= 3`, `y <= 3`: degenerate alternate optima, both with
/// objective two.
#[test]
fn degenerate_alternate_optima() {
    let mut model = Model::new(Objective::Minimize);
    model.add_row(2.0, f64::INFINITY);
    model.add_column(1.0, 0.0, 3.0, &[(0, 1.0)]);
    model.add_column(1.0, 0.0, 3.0, &[(0, 1.0)]);

    for presolve in [PresolveMode::Off, PresolveMode::On] {
        let solution = solve(&model, &options(presolve)).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal, "{presolve:?}");
        assert!((solution.objective_value - 2.0).abs() < 1e-6);
        let (x, y) = (solution.primal_columns[0], solution.primal_columns[1]);
        assert!((x + y - 2.0).abs() < 1e-6);
        assert!((-1e-9..=3.0 + 1e-9).contains(&x));
        assert!((-1e-9..=3.0 + 1e-9).contains(&y));
    }
}

/// `min x` with the row demanding `x >= 1` while the column bound caps `x <= 0`.
#[test]
fn crossed_bounds_are_primal_infeasible() {
    let mut model = Model::new(Objective::Minimize);
    model.add_row(1.0, f64::INFINITY);
    model.add_column(1.0, f64::NEG_INFINITY, 0.0, &[(0, 1.0)]);

    for presolve in [PresolveMode::Off, PresolveMode::On] {
        let solution = solve(&model, &options(presolve)).unwrap();
        assert_eq!(solution.status, SolveStatus::PrimalInfeasible, "{presolve:?}");
    }
}

/// `max x` with `x >= 0` and nothing above: unbounded, with the improving direction as the
/// certificate.
#[test]
fn missing_upper_bound_is_unbounded_with_ray() {
    let mut model = Model::new(Objective::Maximize);
    model.add_row(0.0, f64::INFINITY);
    model.add_column(1.0, 0.0, f64::INFINITY, &[(0, 1.0)]);

    let solution = solve(&model, &options(PresolveMode::Off)).unwrap();
    assert_eq!(solution.status, SolveStatus::DualInfeasible);
    match solution.ray {
        Some(Ray::Primal(direction)) => assert!((direction[0] - 1.0).abs() < 1e-9),
        other => panic!("expected a primal ray, got {other:?}"),
    }

    // Presolve reaches the same conclusion from the cost alone, without a certificate.
    let solution = solve(&model, &options(PresolveMode::On)).unwrap();
    assert_eq!(solution.status, SolveStatus::DualInfeasible);
}

/// The interior point path agrees with the simplex on a bounded problem.
#[test]
fn barrier_and_simplex_agree() {
    let mut model = Model::new(Objective::Maximize);
    model.add_row(f64::NEG_INFINITY, 10.0);
    model.add_row(f64::NEG_INFINITY, 15.0);
    model.add_column(3.0, 0.0, 8.0, &[(0, 1.0), (1, 2.0)]);
    model.add_column(2.0, 0.0, 8.0, &[(0, 1.0), (1, 1.0)]);

    let simplex = solve(&model, &options(PresolveMode::Off)).unwrap();
    let barrier = solve(
        &model,
        &SolveOptions {
            strategy: SolveStrategy::Barrier,
            presolve: PresolveMode::Off,
            ..SolveOptions::default()
        },
    )
    .unwrap();
    assert_eq!(simplex.status, SolveStatus::Optimal);
    assert_eq!(barrier.status, SolveStatus::Optimal);
    assert!((simplex.objective_value - barrier.objective_value).abs() < 1e-5);
}
