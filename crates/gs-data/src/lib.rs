//! Dataset materialization and persistence for the feature grid search.
//!
//! - [`providers`]: the [`DatasetBuilder`] seam and a CSV cohort builder
//! - [`cache`]: the per-task Parquet dataset cache
//! - [`storage`]: the binary result artifact store

pub mod cache;
pub mod providers;
pub mod storage;

pub use cache::*;
pub use providers::*;
pub use storage::*;
