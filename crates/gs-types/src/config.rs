//! Sweep configuration surface.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config_error;
use crate::errors::{GsError, GsResult};
use crate::features::UniverseKind;

/// Fold counts evaluated for every combination unless overridden.
pub const DEFAULT_FOLD_COUNTS: [u32; 2] = [5, 10];

/// Default hours of data after the anchor event used to build datasets.
pub const DEFAULT_POST_HOUR: u32 = 24;

/// One or more experiment numbers whose patients are pooled, written `1+3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentId {
    ids: Vec<u32>,
}

impl ExperimentId {
    pub fn new(ids: Vec<u32>) -> GsResult<Self> {
        if ids.is_empty() {
            return Err(GsError::Validation(
                "experiment id needs at least one experiment number".to_string(),
            ));
        }
        Ok(Self { ids })
    }

    pub fn single(id: u32) -> Self {
        Self { ids: vec![id] }
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ids.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("+"))
    }
}

impl FromStr for ExperimentId {
    type Err = GsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ids = s
            .split('+')
            .map(|part| {
                part.trim().parse::<u32>().map_err(|_| {
                    GsError::Validation(format!("invalid experiment number '{part}' in '{s}'"))
                })
            })
            .collect::<GsResult<Vec<u32>>>()?;
        Self::new(ids)
    }
}

impl TryFrom<String> for ExperimentId {
    type Error = GsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExperimentId> for String {
    fn from(value: ExperimentId) -> Self {
        value.to_string()
    }
}

/// Model settings shared by every task in a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Keep every patient's rows inside a single fold.
    pub cross_patient_kfold: bool,
    /// Number of consecutive per-patient rows averaged into one observation.
    pub stacks: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            cross_patient_kfold: true,
            stacks: 1,
        }
    }
}

/// Top-level configuration for a sweep run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub universe: UniverseKind,
    pub post_hour: u32,
    pub experiment: ExperimentId,
    /// Worker threads; `None` uses the host's available parallelism.
    pub workers: Option<usize>,
    pub fold_counts: Vec<u32>,
    /// Root of the dataset cache tree.
    pub data_dir: PathBuf,
    /// Directory receiving the final result artifact.
    pub output_dir: PathBuf,
    pub model: ModelConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            universe: UniverseKind::Narrow,
            post_hour: DEFAULT_POST_HOUR,
            experiment: ExperimentId::single(1),
            workers: None,
            fold_counts: DEFAULT_FOLD_COUNTS.to_vec(),
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("."),
            model: ModelConfig::default(),
        }
    }
}

impl SweepConfig {
    pub fn new(universe: UniverseKind, experiment: ExperimentId) -> Self {
        Self {
            universe,
            experiment,
            ..Self::default()
        }
    }

    /// Load a config from a JSON file; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> GsResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_post_hour(mut self, post_hour: u32) -> Self {
        self.post_hour = post_hour;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_fold_counts(mut self, fold_counts: Vec<u32>) -> Self {
        self.fold_counts = fold_counts;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn validate(&self) -> GsResult<()> {
        if self.workers == Some(0) {
            return Err(config_error!("worker count must be positive"));
        }
        if self.fold_counts.is_empty() {
            return Err(config_error!("at least one fold count is required"));
        }
        for (i, folds) in self.fold_counts.iter().enumerate() {
            if *folds < 2 {
                return Err(config_error!(
                    "fold count {folds} is invalid; cross-validation needs at least 2 folds"
                ));
            }
            if self.fold_counts[..i].contains(folds) {
                return Err(config_error!("fold count {folds} listed twice"));
            }
        }
        if self.model.stacks == 0 {
            return Err(config_error!("stacks must be at least 1"));
        }
        Ok(())
    }

    /// Directory holding cached datasets for a universe, e.g.
    /// `data/experiment1+3/training/grid_search/narrow/24`.
    pub fn cache_dir(&self, universe_name: &str) -> PathBuf {
        self.data_dir
            .join(format!("experiment{}", self.experiment))
            .join("training")
            .join("grid_search")
            .join(universe_name)
            .join(self.post_hour.to_string())
    }

    /// Settings handed to every task of this sweep.
    pub fn task_context(&self) -> TaskContext {
        TaskContext {
            experiment: self.experiment.clone(),
            post_hour: self.post_hour,
            fold_counts: self.fold_counts.clone(),
            model: self.model.clone(),
        }
    }
}

/// Immutable settings shared by every task: what the dataset builder and
/// scorer need beyond the combination itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub experiment: ExperimentId,
    pub post_hour: u32,
    pub fold_counts: Vec<u32>,
    pub model: ModelConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_id_parsing() {
        let id: ExperimentId = "1+3".parse().unwrap();
        assert_eq!(id.ids(), &[1, 3]);
        assert_eq!(id.to_string(), "1+3");
        assert!(id.contains(3));
        assert!(!id.contains(2));

        assert!("".parse::<ExperimentId>().is_err());
        assert!("1+x".parse::<ExperimentId>().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = SweepConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fold_counts, vec![5, 10]);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let base = SweepConfig::default();
        assert!(base.clone().with_workers(0).validate().is_err());
        assert!(base.clone().with_fold_counts(vec![]).validate().is_err());
        assert!(base.clone().with_fold_counts(vec![1]).validate().is_err());
        assert!(base.clone().with_fold_counts(vec![5, 5]).validate().is_err());
        assert!(base
            .with_model(ModelConfig {
                stacks: 0,
                ..ModelConfig::default()
            })
            .validate()
            .is_err());
    }

    #[test]
    fn derived_paths() {
        let config = SweepConfig::new(UniverseKind::Broad, "1+2".parse().unwrap())
            .with_post_hour(48)
            .with_data_dir("/tmp/data")
            .with_output_dir("/tmp/out");

        assert_eq!(
            config.cache_dir("broad"),
            PathBuf::from("/tmp/data/experiment1+2/training/grid_search/broad/48")
        );
    }

    #[test]
    fn json_config_fills_defaults() {
        let json = r#"{"universe": "broad", "experiment": "2+3", "workers": 3}"#;
        let config: SweepConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.universe, UniverseKind::Broad);
        assert_eq!(config.experiment.ids(), &[2, 3]);
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.post_hour, DEFAULT_POST_HOUR);
        assert_eq!(config.fold_counts, vec![5, 10]);
    }

    #[test]
    fn partial_model_section_keeps_other_defaults() {
        let json = r#"{"experiment": "1", "model": {"stacks": 2}}"#;
        let config: SweepConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.model.stacks, 2);
        assert!(config.model.cross_patient_kfold);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_errors_are_config_errors() {
        let err = SweepConfig::default()
            .with_fold_counts(vec![5, 5])
            .validate()
            .unwrap_err();
        assert!(matches!(err, GsError::Config(ref m) if m == "fold count 5 listed twice"));
    }
}
