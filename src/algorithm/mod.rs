//! # Algorithms
//!
//! The solvers and the machinery they share: factorized basis handling, the simplex method in
//! primal and dual form, presolve with its postsolve mirror, a barrier method with crossover,
//! decomposition schemes, and the orchestrator that ties them together.
pub mod barrier;
pub mod decomposition;
pub mod factorization;
pub mod presolve;
pub mod simplex;
pub mod solve;
