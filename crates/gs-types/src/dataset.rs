use serde::{Deserialize, Serialize};

use crate::errors::{DatasetError, GsResult};

/// One labelled row of a materialized dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Grouping key used for cross-patient folds.
    pub patient: String,
    /// Binary class label (0 = negative, 1 = positive).
    pub label: u8,
    /// Feature values, aligned with [`Dataset::feature_names`].
    pub values: Vec<f64>,
}

impl Observation {
    pub fn new(patient: impl Into<String>, label: u8, values: Vec<f64>) -> Self {
        Self {
            patient: patient.into(),
            label,
            values,
        }
    }
}

/// A feature-combination-specific training table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<Observation>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            rows: Vec::new(),
        }
    }

    /// Append a row, checking it matches the column layout.
    pub fn push(&mut self, row: Observation) -> GsResult<()> {
        if row.values.len() != self.feature_names.len() {
            return Err(DatasetError::InvalidFormat {
                message: format!(
                    "row for patient {} has {} values, expected {}",
                    row.patient,
                    row.values.len(),
                    self.feature_names.len()
                ),
            }
            .into());
        }
        if row.label > 1 {
            return Err(DatasetError::InvalidFormat {
                message: format!("label {} is not binary", row.label),
            }
            .into());
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    /// Distinct patients in first-seen order.
    pub fn patients(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.rows
            .iter()
            .map(|r| r.patient.as_str())
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Count of (negative, positive) rows.
    pub fn label_counts(&self) -> (usize, usize) {
        let positives = self.rows.iter().filter(|r| r.label == 1).count();
        (self.rows.len() - positives, positives)
    }
}
