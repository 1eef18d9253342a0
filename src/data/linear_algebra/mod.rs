//! # Linear algebra
//!
//! Sparse and dense containers used throughout the solver. The containers are generic over a
//! floating point type; the algorithms instantiate them with `f64`.
pub mod matrix;
pub mod vector;

/// A nonzero at a known index.
///
/// Whether the index refers to a row or a column depends on context.
pub type SparseTuple<F> = (usize, F);
