// Feature grid search engine
// Ties combination enumeration, the worker pool, the dataset cache and the
// result store together into a single sweep run.

pub mod engine;
pub mod logging;
pub mod summary;

pub use engine::{SweepEngine, SweepReport};
pub use summary::SweepSummary;
