use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use gs_data::{DatasetBuilder, ResultStore};
use gs_engine::SweepEngine;
use gs_optimizer::{CentroidScorer, Scorer};
use gs_types::{
    Dataset, DatasetError, ExperimentId, Feature, FeatureCombination, FeatureUniverse,
    FailureKind, GsResult, ModelConfig, Observation, SweepConfig, TaskContext, TaskStatus,
    UniverseKind,
};
use tempfile::tempdir;

/// Builds a small two-class table and counts how often it is asked to.
struct StubBuilder {
    calls: AtomicUsize,
    fail_on: Option<&'static str>,
}

impl StubBuilder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    fn failing_on(feature: &'static str) -> Self {
        Self {
            fail_on: Some(feature),
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DatasetBuilder for StubBuilder {
    fn build(&self, combination: &FeatureCombination, _context: &TaskContext) -> GsResult<Dataset> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(feature) = self.fail_on {
            if combination.names() == [feature] {
                return Err(DatasetError::InsufficientData {
                    message: format!("no rows carry {feature}"),
                }
                .into());
            }
        }
        let mut dataset = Dataset::new(combination.names());
        for i in 0..6 {
            let values = (0..combination.len()).map(|j| (i + j) as f64).collect();
            dataset.push(Observation::new(format!("p{i}"), (i % 2) as u8, values))?;
        }
        Ok(dataset)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Looks scores up by the dataset's feature names and fold count.
struct TableScorer {
    calls: AtomicUsize,
    table: HashMap<(String, u32), f64>,
}

impl TableScorer {
    fn new(entries: &[(&str, u32, f64)]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            table: entries
                .iter()
                .map(|(names, folds, score)| ((names.to_string(), *folds), *score))
                .collect(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Scorer for TableScorer {
    fn score(&self, dataset: &Dataset, folds: u32, _model: &ModelConfig) -> GsResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = (dataset.feature_names.join(","), folds);
        Ok(self.table.get(&key).copied().unwrap_or(0.5))
    }

    fn name(&self) -> &str {
        "table"
    }
}

fn universe(names: &[&str]) -> FeatureUniverse {
    let features = names
        .iter()
        .enumerate()
        .map(|(i, name)| Feature::new(*name, i as u32))
        .collect();
    FeatureUniverse::new("test", features).unwrap()
}

fn config(root: &Path) -> SweepConfig {
    SweepConfig::new(UniverseKind::Narrow, ExperimentId::single(1))
        .with_workers(2)
        .with_data_dir(root.join("data"))
        .with_output_dir(root.join("out"))
}

fn pair_scorer() -> TableScorer {
    TableScorer::new(&[
        ("A", 5, 0.61),
        ("A", 10, 0.63),
        ("B", 5, 0.58),
        ("B", 10, 0.60),
        ("A,B", 5, 0.70),
        ("A,B", 10, 0.74),
    ])
}

#[test]
fn empty_universe_yields_single_skipped_task() {
    let dir = tempdir().unwrap();
    let engine = SweepEngine::new(config(dir.path()))
        .unwrap()
        .with_universe(universe(&[]));
    let builder = StubBuilder::new();
    let scorer = pair_scorer();

    let report = engine.run(&builder, &scorer).unwrap();

    assert_eq!(report.outcome.records.len(), 1);
    assert_eq!(report.outcome.records[0].status, TaskStatus::Skipped);
    assert_eq!(report.outcome.records[0].score(5), Some(0.0));
    assert_eq!(builder.calls(), 0);
    assert_eq!(scorer.calls(), 0);
    assert!(!report.succeeded());
}

#[test]
fn two_feature_sweep_picks_full_set_at_ten_folds() {
    let dir = tempdir().unwrap();
    let engine = SweepEngine::new(config(dir.path()))
        .unwrap()
        .with_universe(universe(&["A", "B"]));
    let builder = StubBuilder::new();

    let report = engine.run(&builder, &pair_scorer()).unwrap();
    let records = &report.outcome.records;

    assert_eq!(records.len(), 4);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.index, i);
    }
    assert_eq!(records[1].features, vec!["A"]);
    assert_eq!(records[2].features, vec!["B"]);
    assert_eq!(records[3].score(10), Some(0.74));

    let best = report.outcome.best.as_ref().unwrap();
    assert_eq!((best.task_index, best.folds, best.score), (3, 10, 0.74));
    assert_eq!(builder.calls(), 3);
    assert_eq!(report.cache_stats.stores, 3);
}

#[test]
fn rerun_reuses_cached_datasets() {
    let dir = tempdir().unwrap();
    let engine = SweepEngine::new(config(dir.path()))
        .unwrap()
        .with_universe(universe(&["A", "B"]));

    let first_builder = StubBuilder::new();
    let first = engine.run(&first_builder, &pair_scorer()).unwrap();
    assert_eq!(first_builder.calls(), 3);

    let second_builder = StubBuilder::new();
    let second = engine.run(&second_builder, &pair_scorer()).unwrap();

    assert_eq!(second_builder.calls(), 0);
    assert_eq!(second.cache_stats.hits, 3);
    assert_eq!(second.cache_stats.misses, 0);
    assert_eq!(first.outcome.best, second.outcome.best);
    assert_eq!(first.outcome.records, second.outcome.records);
}

#[test]
fn equal_maxima_resolve_to_lowest_task_index() {
    let dir = tempdir().unwrap();
    let engine = SweepEngine::new(config(dir.path()).with_workers(4))
        .unwrap()
        .with_universe(universe(&["A", "B", "C"]));
    let scorer = TableScorer::new(&[("B", 10, 0.9), ("A,C", 5, 0.9), ("A,B,C", 5, 0.9)]);

    let report = engine.run(&StubBuilder::new(), &scorer).unwrap();
    let best = report.outcome.best.unwrap();

    assert_eq!((best.task_index, best.folds), (2, 10));
    assert_eq!(best.features, vec!["B"]);
}

#[test]
fn failing_task_does_not_abort_sweep() {
    let dir = tempdir().unwrap();
    let engine = SweepEngine::new(config(dir.path()))
        .unwrap()
        .with_universe(universe(&["A", "B"]));
    let builder = StubBuilder::failing_on("A");

    let report = engine.run(&builder, &pair_scorer()).unwrap();
    let records = &report.outcome.records;

    assert_eq!(records.len(), 4);
    let failure = records[1].failure().unwrap();
    assert_eq!(failure.kind, FailureKind::DatasetBuild);
    assert!(failure.message.contains("no rows carry A"));
    assert!(records[2].is_completed());
    assert!(records[3].is_completed());

    assert_eq!(report.aggregation.failed.len(), 1);
    assert_eq!(report.aggregation.failed[0].index, 1);
    assert_eq!(report.outcome.best.as_ref().unwrap().task_index, 3);
    assert!(report.summary().to_string().contains("#1 [A]"));
}

#[test]
fn unreadable_cache_slot_fails_only_its_task() {
    let dir = tempdir().unwrap();
    let sweep_config = config(dir.path());
    let cache_dir = sweep_config.cache_dir("test");
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(cache_dir.join("dataset-1.parquet"), b"not a parquet file").unwrap();

    let engine = SweepEngine::new(sweep_config)
        .unwrap()
        .with_universe(universe(&["A", "B"]));
    let builder = StubBuilder::new();

    let report = engine.run(&builder, &pair_scorer()).unwrap();
    let records = &report.outcome.records;

    assert_eq!(records[1].failure().unwrap().kind, FailureKind::CacheIo);
    assert!(records[2].is_completed());
    assert!(records[3].is_completed());
    assert_eq!(builder.calls(), 2);

    let best = report.outcome.best.as_ref().unwrap();
    assert_eq!((best.task_index, best.folds), (3, 10));
}

#[test]
fn sweep_with_no_success_has_no_best() {
    let dir = tempdir().unwrap();
    let engine = SweepEngine::new(config(dir.path()))
        .unwrap()
        .with_universe(universe(&["A"]));
    let builder = StubBuilder::failing_on("A");

    let report = engine.run(&builder, &pair_scorer()).unwrap();

    assert!(report.outcome.best.is_none());
    assert!(!report.succeeded());
    assert_eq!(report.aggregation.completed, 0);
    assert_eq!(report.aggregation.failed.len(), 1);
    assert!(report
        .summary()
        .to_string()
        .contains("No task completed successfully"));
}

#[test]
fn artifact_round_trips_through_store() {
    let dir = tempdir().unwrap();
    let engine = SweepEngine::new(config(dir.path()))
        .unwrap()
        .with_universe(universe(&["A", "B"]));

    let report = engine.run(&StubBuilder::new(), &pair_scorer()).unwrap();

    assert_eq!(
        report.artifact,
        dir.path().join("out").join("experiment1_test_grid_search_results.bin")
    );
    let loaded = ResultStore::load(&report.artifact).unwrap();
    assert_eq!(loaded, report.outcome);
}

#[test]
fn csv_cohort_end_to_end() {
    let dir = tempdir().unwrap();
    let cohort = dir.path().join("cohort.csv");

    let mut csv = String::from("patient,experiment,hour,label,signal,noise\n");
    for p in 0..12 {
        let label = u8::from(p < 6);
        for row in 0..3 {
            let signal = f64::from(label) + 0.1 * row as f64;
            let noise = ((p * 7 + row * 3) % 5) as f64;
            csv.push_str(&format!("p{p:02},1,{row},{label},{signal},{noise}\n"));
        }
        // Outside the post-hour window and from another experiment.
        csv.push_str(&format!("p{p:02},1,30,{label},9,9\n"));
        csv.push_str(&format!("q{p:02},2,1,{label},9,9\n"));
    }
    fs::write(&cohort, csv).unwrap();

    let builder = gs_data::CsvCohortBuilder::from_path(&cohort).unwrap();
    let engine = SweepEngine::new(config(dir.path()).with_fold_counts(vec![2, 3]))
        .unwrap()
        .with_universe(universe(&["signal", "noise"]));

    let report = engine.run(&builder, &CentroidScorer::new()).unwrap();

    assert_eq!(report.aggregation.completed, 3);
    assert!(!report.aggregation.has_failures());
    let best = report.outcome.best.as_ref().unwrap();
    assert_eq!(best.task_index, 1);
    assert_eq!(best.features, vec!["signal"]);
    assert!((best.score - 1.0).abs() < 1e-12);
}
