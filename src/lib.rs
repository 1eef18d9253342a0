//! # A numerical linear program solver
//!
//! Linear programs are solved with the revised simplex method (primal and dual variants) or a
//! primal-dual interior point method, after an optional presolve reduction. The implementation is
//! tolerance driven: all comparisons against bounds and all pivot decisions happen relative to
//! configurable feasibility and pivot tolerances, and an anti-cycling monitor watches every
//! simplex iteration.
#![warn(missing_docs)]

pub mod algorithm;
pub mod data;
pub mod io;

pub use algorithm::solve::{
    solve, CancelToken, PresolveMode, PricingRule, SolveOptions, SolveStrategy,
};
pub use data::linear_program::elements::{BasisStatus, Objective, SolveStatus};
pub use data::linear_program::model::{Model, ModelError};
pub use data::linear_program::solution::Solution;
