//! Execution of a single sweep task.

use gs_data::{DatasetBuilder, TaskCache};
use gs_types::{FoldResult, GsResult, ResultRecord, TaskFailure};
use tracing::{debug, warn};

use crate::scoring::Scorer;
use crate::search::SweepTask;

/// Runs the per-task procedure: resolve the dataset through the cache, then
/// score it once per configured fold count.
pub struct TaskRunner<'a, B: ?Sized, S: ?Sized> {
    cache: &'a TaskCache,
    builder: &'a B,
    scorer: &'a S,
}

impl<'a, B, S> TaskRunner<'a, B, S>
where
    B: DatasetBuilder + ?Sized,
    S: Scorer + ?Sized,
{
    pub fn new(cache: &'a TaskCache, builder: &'a B, scorer: &'a S) -> Self {
        Self {
            cache,
            builder,
            scorer,
        }
    }

    /// Execute `task`, converting any failure into a failed record.
    ///
    /// The empty combination is never built or scored and yields a skipped
    /// record with sentinel scores.
    pub fn run(&self, task: &SweepTask) -> ResultRecord {
        if task.combination.is_empty() {
            debug!("Task {} has no features; skipping", task.index);
            return ResultRecord::skipped(task.index, task.fold_counts());
        }

        match self.evaluate(task) {
            Ok(scores) => {
                debug!("Task {} {} scored {:?}", task.index, task.combination, scores);
                ResultRecord::completed(task.index, task.combination.names(), scores)
            }
            Err(e) => {
                warn!("Task {} {} failed: {}", task.index, task.combination, e);
                ResultRecord::failed(
                    task.index,
                    task.combination.names(),
                    task.fold_counts(),
                    TaskFailure::from(&e),
                )
            }
        }
    }

    fn evaluate(&self, task: &SweepTask) -> GsResult<Vec<FoldResult>> {
        let dataset =
            self.cache
                .resolve(task.index, &task.combination, self.builder, &task.context)?;

        task.fold_counts()
            .iter()
            .map(|&folds| {
                let score = self.scorer.score(&dataset, folds, &task.context.model)?;
                Ok(FoldResult::new(folds, score))
            })
            .collect()
    }
}
