//! # gs-optimizer
//!
//! Exhaustive feature-combination search for the grid search workspace.
//!
//! Provides the power-set combination generator, the scorer seam with a
//! built-in cross-validated scorer, the bounded worker pool that executes
//! sweep tasks, and the reduction that picks the best (task, fold count)
//! pair.

mod aggregate;
mod scheduler;
mod scoring;
mod search;
mod task;

pub use aggregate::{aggregate, Aggregation, FailedTask};
pub use scheduler::WorkerPool;
pub use scoring::{roc_auc, CentroidScorer, Scorer};
pub use search::{CombinationGenerator, SweepTask};
pub use task::TaskRunner;
