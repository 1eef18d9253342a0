//! # Reading and writing
//!
//! Persistence for solver state that outlives a process. Models themselves are built through
//! the in-memory `Model` interface; only the basis has a file format.
pub mod basis;
