// src/render/mod.rs

//! Graph renderings for external tools.

pub mod dot;

pub use dot::DotStyle;
