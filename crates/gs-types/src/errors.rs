use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the grid search system
#[derive(Error, Debug)]
pub enum GsError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while materializing a dataset for a feature combination
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("Missing column: {column}")]
    MissingColumn { column: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Data parsing error at line {line}: {message}")]
    ParseError { line: u64, message: String },
}

/// Errors raised while cross-validating a model on a dataset
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Cannot score an empty dataset")]
    EmptyDataset,

    #[error("Invalid fold count: {folds}")]
    InvalidFolds { folds: u32 },

    #[error("Not enough groups for {folds} folds: only {groups} available")]
    InsufficientGroups { folds: u32, groups: usize },

    #[error("Degenerate label distribution: {message}")]
    DegenerateLabels { message: String },
}

/// Errors raised while reading or writing persisted artifacts
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("Corrupt artifact {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// Result type alias for grid search operations
pub type GsResult<T> = Result<T, GsError>;

/// Coarse classification of why a single sweep task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    DatasetBuild,
    Scoring,
    CacheIo,
    Panicked,
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::DatasetBuild => "dataset build failure",
            Self::Scoring => "scoring failure",
            Self::CacheIo => "cache I/O failure",
            Self::Panicked => "task panicked",
            Self::Internal => "internal failure",
        };
        f.write_str(label)
    }
}

/// Serializable record of a task failure, stored alongside the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Panicked, message)
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&GsError> for TaskFailure {
    fn from(error: &GsError) -> Self {
        let kind = match error {
            GsError::Dataset(_) => FailureKind::DatasetBuild,
            GsError::Scoring(_) => FailureKind::Scoring,
            GsError::Cache(_) | GsError::Io(_) | GsError::Encoding(_) => FailureKind::CacheIo,
            _ => FailureKind::Internal,
        };
        Self::new(kind, error.to_string())
    }
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::GsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::GsError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::GsError::Config(format!($($arg)*))
    };
}
