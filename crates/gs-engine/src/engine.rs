use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use gs_data::{CacheStats, DatasetBuilder, ResultStore, TaskCache};
use gs_optimizer::{aggregate, Aggregation, CombinationGenerator, Scorer, TaskRunner, WorkerPool};
use gs_types::{FeatureUniverse, GsResult, SweepConfig, SweepOutcome};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::summary::SweepSummary;

/// Drives a full sweep: enumerate, execute, aggregate, persist.
#[derive(Debug, Clone)]
pub struct SweepEngine {
    config: SweepConfig,
    universe: Arc<FeatureUniverse>,
}

/// Everything a finished sweep hands back to its caller.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub outcome: SweepOutcome,
    pub aggregation: Aggregation,
    /// Where the result artifact was written.
    pub artifact: PathBuf,
    pub cache_stats: CacheStats,
}

impl SweepReport {
    pub fn summary(&self) -> SweepSummary<'_> {
        SweepSummary::new(&self.outcome, &self.aggregation)
    }

    /// Whether at least one task produced a real score.
    pub fn succeeded(&self) -> bool {
        self.aggregation.best.is_some()
    }
}

impl SweepEngine {
    /// Create an engine over the configured built-in universe.
    pub fn new(config: SweepConfig) -> GsResult<Self> {
        config.validate()?;
        let universe = Arc::new(config.universe.universe());
        Ok(Self { config, universe })
    }

    /// Sweep a custom catalog instead of the configured built-in one.
    pub fn with_universe(mut self, universe: FeatureUniverse) -> Self {
        self.universe = Arc::new(universe);
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn universe(&self) -> &FeatureUniverse {
        &self.universe
    }

    /// Run the sweep to completion and persist its outcome.
    ///
    /// Task failures do not abort the sweep; they are recorded and reported
    /// in the returned [`SweepReport`]. Errors are returned only for problems
    /// that affect the sweep as a whole (cache directory, worker pool, result
    /// artifact).
    pub fn run<B, S>(&self, builder: &B, scorer: &S) -> GsResult<SweepReport>
    where
        B: DatasetBuilder + ?Sized,
        S: Scorer + ?Sized,
    {
        let started_at = Utc::now();
        let id = Uuid::new_v4();
        let generator = CombinationGenerator::new(Arc::clone(&self.universe));

        info!(
            "Starting sweep {} over '{}' ({} features, {} combinations) for experiment {}, post-hour {}",
            id,
            self.universe.name(),
            self.universe.len(),
            generator.total(),
            self.config.experiment,
            self.config.post_hour
        );
        info!(
            "Dataset builder: {}, scorer: {}, fold counts: {:?}",
            builder.name(),
            scorer.name(),
            self.config.fold_counts
        );

        let cache = TaskCache::open(self.config.cache_dir(self.universe.name()))?;
        let pool = WorkerPool::new(self.config.worker_count())?;
        let runner = TaskRunner::new(&cache, builder, scorer);

        let context = Arc::new(self.config.task_context());
        let records = pool.run(generator.into_tasks(context), |task| runner.run(task))?;

        let aggregation = aggregate(&records, &self.config.fold_counts);
        let cache_stats = cache.get_stats();

        let outcome = SweepOutcome {
            id,
            universe: self.universe.name().to_string(),
            experiment: self.config.experiment.clone(),
            post_hour: self.config.post_hour,
            fold_counts: self.config.fold_counts.clone(),
            records,
            best: aggregation.best.clone(),
            started_at,
            finished_at: Utc::now(),
        };

        let failed = outcome.failed_records().count();
        if failed > 0 {
            warn!("{} of {} tasks failed", failed, outcome.records.len());
        }
        info!(
            "{} of {} tasks completed",
            outcome.completed_count(),
            outcome.records.len()
        );
        match &aggregation.best {
            Some(best) => info!(
                "Best score {} at task {} with {} folds",
                best.score, best.task_index, best.folds
            ),
            None => error!("No task completed successfully"),
        }
        info!(
            "Cache: {} hits, {} misses, {} stores",
            cache_stats.hits, cache_stats.misses, cache_stats.stores
        );

        let store = ResultStore::new(&self.config.output_dir)?;
        let artifact = store.save(&outcome)?;

        Ok(SweepReport {
            outcome,
            aggregation,
            artifact,
            cache_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::{ModelConfig, UniverseKind};

    #[test]
    fn test_engine_uses_configured_universe() {
        let engine = SweepEngine::new(SweepConfig::new(
            UniverseKind::Broad,
            "2".parse().unwrap(),
        ))
        .unwrap();
        assert_eq!(engine.universe().name(), "broad");
        assert_eq!(engine.universe().len(), 14);
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let config = SweepConfig::default().with_model(ModelConfig {
            stacks: 0,
            ..ModelConfig::default()
        });
        assert!(SweepEngine::new(config).is_err());
        assert!(SweepEngine::new(SweepConfig::default().with_workers(0)).is_err());
    }
}
