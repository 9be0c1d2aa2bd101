// src/dag/mod.rs

//! Graph structure and admission control.
//!
//! - [`graph`] answers structural questions about a set of jobs
//!   (ordering, entries/exits, neighbours, closures).
//! - [`window`] bounds how many jobs of one scheduler run simultaneously.

pub mod graph;
pub mod window;

pub use graph::topological_order;
pub use window::Window;
