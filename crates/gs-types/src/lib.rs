//! # gs-types
//!
//! Core types for the feature grid search: feature universes and
//! combinations, materialized datasets, sweep configuration, result records
//! and the error taxonomy shared by every crate in the workspace.

pub mod config;
pub mod dataset;
pub mod errors;
pub mod features;
pub mod results;

pub use config::*;
pub use dataset::*;
pub use errors::*;
pub use features::*;
pub use results::*;
