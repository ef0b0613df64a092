//! Reduction of result records to the sweep's best outcome.

use gs_types::{BestOutcome, ResultRecord, TaskFailure, TaskStatus};
use serde::{Deserialize, Serialize};

/// A task that failed, by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTask {
    pub index: usize,
    pub features: Vec<String>,
    pub failure: TaskFailure,
}

/// Result of scanning every (task, fold count) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// `None` when no task completed successfully.
    pub best: Option<BestOutcome>,
    pub completed: usize,
    pub skipped: usize,
    pub failed: Vec<FailedTask>,
}

impl Aggregation {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Pick the highest-scoring (task, fold count) pair.
///
/// Records are scanned in task-index order and, within a record, in the
/// order of `fold_counts`; a pair replaces the current best only if its score
/// is strictly greater, so the first of several equal maxima wins. Skipped
/// and failed records never compete, and NaN scores are ignored.
pub fn aggregate(records: &[ResultRecord], fold_counts: &[u32]) -> Aggregation {
    let mut ordered: Vec<&ResultRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.index);

    let mut best: Option<(&ResultRecord, u32, f64)> = None;
    let mut completed = 0;
    let mut skipped = 0;
    let mut failed = Vec::new();

    for record in ordered {
        match &record.status {
            TaskStatus::Completed => completed += 1,
            TaskStatus::Skipped => {
                skipped += 1;
                continue;
            }
            TaskStatus::Failed(failure) => {
                failed.push(FailedTask {
                    index: record.index,
                    features: record.features.clone(),
                    failure: failure.clone(),
                });
                continue;
            }
        }

        for &folds in fold_counts {
            let Some(score) = record.score(folds) else {
                continue;
            };
            if score.is_nan() {
                continue;
            }
            let improves = match best {
                None => true,
                Some((_, _, current)) => score > current,
            };
            if improves {
                best = Some((record, folds, score));
            }
        }
    }

    Aggregation {
        best: best.map(|(record, folds, score)| BestOutcome {
            task_index: record.index,
            folds,
            score,
            features: record.features.clone(),
        }),
        completed,
        skipped,
        failed,
    }
}
