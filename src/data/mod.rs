//! # Data structures
//!
//! Everything the algorithms operate on: sparse linear algebra containers and the representation
//! of linear programs and their solutions.
pub mod linear_algebra;
pub mod linear_program;
