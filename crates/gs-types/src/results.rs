//! Per-task result records and the assembled sweep outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ExperimentId;
use crate::errors::TaskFailure;

/// Placeholder score for (task, fold count) pairs that were never scored.
pub const SENTINEL_SCORE: f64 = 0.0;

/// Unique sweep run identifier.
pub type SweepId = Uuid;

/// Score of one task under one fold count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub folds: u32,
    pub score: f64,
}

impl FoldResult {
    pub fn new(folds: u32, score: f64) -> Self {
        Self { folds, score }
    }

    pub fn sentinel(folds: u32) -> Self {
        Self::new(folds, SENTINEL_SCORE)
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Every fold count was scored.
    Completed,
    /// The empty combination; never built or scored.
    Skipped,
    /// The task failed; scores keep the sentinel.
    Failed(TaskFailure),
}

/// The result of exactly one sweep task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub index: usize,
    pub features: Vec<String>,
    /// One entry per configured fold count, in configuration order.
    pub scores: Vec<FoldResult>,
    pub status: TaskStatus,
}

impl ResultRecord {
    pub fn completed(index: usize, features: Vec<String>, scores: Vec<FoldResult>) -> Self {
        Self {
            index,
            features,
            scores,
            status: TaskStatus::Completed,
        }
    }

    /// Record for the empty combination: no features, sentinel scores.
    pub fn skipped(index: usize, fold_counts: &[u32]) -> Self {
        Self {
            index,
            features: Vec::new(),
            scores: fold_counts.iter().copied().map(FoldResult::sentinel).collect(),
            status: TaskStatus::Skipped,
        }
    }

    pub fn failed(
        index: usize,
        features: Vec<String>,
        fold_counts: &[u32],
        failure: TaskFailure,
    ) -> Self {
        Self {
            index,
            features,
            scores: fold_counts.iter().copied().map(FoldResult::sentinel).collect(),
            status: TaskStatus::Failed(failure),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, TaskStatus::Completed)
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match &self.status {
            TaskStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Score recorded for `folds`, if that fold count was configured.
    pub fn score(&self, folds: u32) -> Option<f64> {
        self.scores.iter().find(|r| r.folds == folds).map(|r| r.score)
    }
}

/// The winning (task, fold count) pair of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestOutcome {
    pub task_index: usize,
    pub folds: u32,
    pub score: f64,
    pub features: Vec<String>,
}

/// Everything a sweep produced, as persisted in the result artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub id: SweepId,
    pub universe: String,
    pub experiment: ExperimentId,
    pub post_hour: u32,
    pub fold_counts: Vec<u32>,
    /// Aligned with task index: `records[i].index == i`.
    pub records: Vec<ResultRecord>,
    /// `None` when no task completed successfully.
    pub best: Option<BestOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepOutcome {
    pub fn failed_records(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter().filter(|r| r.failure().is_some())
    }

    pub fn completed_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_completed()).count()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
