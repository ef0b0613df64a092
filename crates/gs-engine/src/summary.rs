//! Human-readable console summary of a finished sweep.

use std::fmt;

use gs_optimizer::Aggregation;
use gs_types::SweepOutcome;

/// How many failed tasks are listed individually.
const MAX_LISTED_FAILURES: usize = 10;

pub struct SweepSummary<'a> {
    outcome: &'a SweepOutcome,
    aggregation: &'a Aggregation,
}

impl<'a> SweepSummary<'a> {
    pub fn new(outcome: &'a SweepOutcome, aggregation: &'a Aggregation) -> Self {
        Self {
            outcome,
            aggregation,
        }
    }
}

impl fmt::Display for SweepSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let agg = self.aggregation;

        writeln!(
            f,
            "Sweep {} (experiment {}, {} universe, post-hour {})",
            self.outcome.id, self.outcome.experiment, self.outcome.universe, self.outcome.post_hour
        )?;
        writeln!(
            f,
            "Tasks: {} completed, {} skipped, {} failed in {:.1}s",
            agg.completed,
            agg.skipped,
            agg.failed.len(),
            self.outcome.elapsed().num_milliseconds() as f64 / 1000.0
        )?;

        match &agg.best {
            Some(best) => {
                writeln!(f, "Best AUC: {}", best.score)?;
                writeln!(
                    f,
                    "Best features: [{}] (task {}, {} folds)",
                    best.features.join(", "),
                    best.task_index,
                    best.folds
                )?;
            }
            None => writeln!(f, "No task completed successfully; there is no best score")?,
        }

        if !agg.failed.is_empty() {
            writeln!(f, "Failed tasks:")?;
            for task in agg.failed.iter().take(MAX_LISTED_FAILURES) {
                writeln!(
                    f,
                    "  #{} [{}]: {}",
                    task.index,
                    task.features.join(", "),
                    task.failure
                )?;
            }
            if agg.failed.len() > MAX_LISTED_FAILURES {
                writeln!(f, "  ... and {} more", agg.failed.len() - MAX_LISTED_FAILURES)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gs_optimizer::aggregate;
    use gs_types::{
        ExperimentId, FailureKind, FoldResult, ResultRecord, TaskFailure,
    };
    use uuid::Uuid;

    fn outcome(records: Vec<ResultRecord>) -> SweepOutcome {
        let now = Utc::now();
        SweepOutcome {
            id: Uuid::new_v4(),
            universe: "narrow".into(),
            experiment: ExperimentId::single(1),
            post_hour: 24,
            fold_counts: vec![5, 10],
            records,
            best: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_summary_reports_best() {
        let outcome = outcome(vec![
            ResultRecord::skipped(0, &[5, 10]),
            ResultRecord::completed(
                1,
                vec!["iTime".into()],
                vec![FoldResult::new(5, 0.5), FoldResult::new(10, 0.75)],
            ),
        ]);
        let agg = aggregate(&outcome.records, &outcome.fold_counts);
        let text = SweepSummary::new(&outcome, &agg).to_string();

        assert!(text.contains("Best AUC: 0.75"));
        assert!(text.contains("Best features: [iTime] (task 1, 10 folds)"));
        assert!(text.contains("1 completed, 1 skipped, 0 failed"));
        assert!(!text.contains("Failed tasks"));
    }

    #[test]
    fn test_summary_distinguishes_no_success() {
        let outcome = outcome(vec![
            ResultRecord::skipped(0, &[5, 10]),
            ResultRecord::failed(
                1,
                vec!["PIP".into()],
                &[5, 10],
                TaskFailure::new(FailureKind::DatasetBuild, "no rows"),
            ),
        ]);
        let agg = aggregate(&outcome.records, &outcome.fold_counts);
        let text = SweepSummary::new(&outcome, &agg).to_string();

        assert!(text.contains("No task completed successfully"));
        assert!(!text.contains("Best AUC"));
        assert!(text.contains("#1 [PIP]: dataset build failure: no rows"));
    }
}
