// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate names, scopes, durations and acyclicity (`validate.rs`).
//! - Build the scheduler tree from a validated config (`build.rs`).

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::build_scheduler;
pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, JobConfig, NestedConfig, RawConfigFile};
