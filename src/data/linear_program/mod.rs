//! # Representation of linear programs
//!
//! The in-memory model of a linear program, the enumerated building blocks describing it, and the
//! solution object a solve call produces.
pub mod elements;
pub mod model;
pub mod solution;
