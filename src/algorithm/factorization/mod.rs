//! # Basis factorization
//!
//! Maintains an invertible representation of the basis matrix: an LU decomposition computed from
//! scratch, kept current across pivots through eta file updates. The simplex core asks for
//! `ftran`/`btran` solves every iteration and refactorizes when the update file grows too long,
//! too dense, or too inaccurate.
pub mod eta_file;
pub mod lu;

pub use lu::{Factorization, FactorizeResult};
