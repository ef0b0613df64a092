use csv::{ReaderBuilder, StringRecord};
use gs_types::{
    Dataset, DatasetError, FeatureCombination, GsResult, Observation, TaskContext,
};
use std::collections::HashMap;
use std::path::Path;

/// Trait for anything that can materialize a dataset for a feature combination.
///
/// Implementations are shared by every worker of a sweep and are only called
/// on a task cache miss.
pub trait DatasetBuilder: Send + Sync {
    /// Build the training table restricted to `combination`'s features.
    fn build(&self, combination: &FeatureCombination, context: &TaskContext) -> GsResult<Dataset>;

    /// Get builder name
    fn name(&self) -> &str;
}

/// Column names every cohort file must carry.
const PATIENT_COLUMN: &str = "patient";
const EXPERIMENT_COLUMN: &str = "experiment";
const HOUR_COLUMN: &str = "hour";
const LABEL_COLUMN: &str = "label";

#[derive(Debug, Clone)]
struct CohortRow {
    patient: String,
    experiment: u32,
    hour: f64,
    label: u8,
    values: Vec<Option<f64>>,
}

/// Builds datasets from a per-breath cohort table stored as CSV.
///
/// The file has one row per observation with the columns `patient`,
/// `experiment`, `hour` and `label`; every other column is a feature named by
/// its header. Empty feature cells are treated as missing and drop the row
/// for any combination that selects that feature.
#[derive(Debug, Clone)]
pub struct CsvCohortBuilder {
    name: String,
    columns: HashMap<String, usize>,
    rows: Vec<CohortRow>,
}

impl CsvCohortBuilder {
    /// Load the cohort table into memory.
    pub fn from_path<P: AsRef<Path>>(path: P) -> GsResult<Self> {
        let path = path.as_ref();
        tracing::info!("Loading cohort data from: {}", path.display());

        if !path.exists() {
            return Err(DatasetError::SourceNotFound(path.display().to_string()).into());
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DatasetError::InvalidFormat {
                message: format!("Failed to open CSV file {}: {}", path.display(), e),
            })?;

        let headers = rdr
            .headers()
            .map_err(|e| DatasetError::InvalidFormat {
                message: format!("Failed to read CSV headers: {}", e),
            })?
            .clone();
        tracing::debug!("Cohort headers: {:?}", headers);

        let layout = ColumnLayout::detect(&headers)?;

        let mut rows = Vec::new();
        for (line_num, result) in rdr.records().enumerate() {
            let line = line_num as u64 + 2;
            let record = result.map_err(|e| DatasetError::ParseError {
                line,
                message: e.to_string(),
            })?;
            rows.push(layout.parse(&record, line)?);
        }

        tracing::info!(
            "Loaded {} cohort rows with {} feature columns",
            rows.len(),
            layout.features.len()
        );

        Ok(Self {
            name: format!("csv:{}", path.display()),
            columns: layout.features,
            rows,
        })
    }

    /// Feature names available in the cohort file.
    pub fn feature_names(&self) -> Vec<&str> {
        let mut names: Vec<(&str, usize)> =
            self.columns.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        names.sort_by_key(|(_, idx)| *idx);
        names.into_iter().map(|(name, _)| name).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl DatasetBuilder for CsvCohortBuilder {
    fn build(&self, combination: &FeatureCombination, context: &TaskContext) -> GsResult<Dataset> {
        let selected = combination
            .features()
            .iter()
            .map(|feature| {
                self.columns
                    .get(&feature.name)
                    .copied()
                    .ok_or_else(|| DatasetError::MissingColumn {
                        column: feature.name.clone(),
                    })
            })
            .collect::<Result<Vec<usize>, DatasetError>>()?;

        let window = f64::from(context.post_hour);
        let stacks = context.model.stacks.max(1);

        // Consecutive usable rows per patient, in file order.
        let mut order: Vec<&str> = Vec::new();
        let mut per_patient: HashMap<&str, (u8, Vec<Vec<f64>>)> = HashMap::new();

        for row in &self.rows {
            if !context.experiment.contains(row.experiment) || row.hour < 0.0 || row.hour >= window
            {
                continue;
            }
            let values: Option<Vec<f64>> = selected.iter().map(|idx| row.values[*idx]).collect();
            let Some(values) = values else {
                continue;
            };
            let entry = per_patient.entry(row.patient.as_str()).or_insert_with(|| {
                order.push(row.patient.as_str());
                (row.label, Vec::new())
            });
            entry.1.push(values);
        }

        let mut dataset = Dataset::new(combination.names());
        for patient in order {
            let (label, values) = &per_patient[patient];
            for chunk in values.chunks_exact(stacks) {
                let mut mean = vec![0.0; selected.len()];
                for row in chunk {
                    for (acc, v) in mean.iter_mut().zip(row) {
                        *acc += v;
                    }
                }
                for acc in &mut mean {
                    *acc /= stacks as f64;
                }
                dataset.push(Observation::new(patient, *label, mean))?;
            }
        }

        if dataset.is_empty() {
            return Err(DatasetError::InsufficientData {
                message: format!(
                    "no rows for experiment {} within {} hours for {}",
                    context.experiment, context.post_hour, combination
                ),
            }
            .into());
        }

        tracing::debug!(
            "Built dataset for {} with {} rows",
            combination,
            dataset.len()
        );
        Ok(dataset)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Column positions detected from the CSV header.
struct ColumnLayout {
    patient: usize,
    experiment: usize,
    hour: usize,
    label: usize,
    /// Feature name -> position in [`CohortRow::values`].
    features: HashMap<String, usize>,
    /// Record index of each feature value, aligned with `CohortRow::values`.
    feature_columns: Vec<usize>,
}

impl ColumnLayout {
    fn detect(headers: &StringRecord) -> GsResult<Self> {
        let find = |name: &str| -> GsResult<usize> {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    DatasetError::MissingColumn {
                        column: name.to_string(),
                    }
                    .into()
                })
        };

        let patient = find(PATIENT_COLUMN)?;
        let experiment = find(EXPERIMENT_COLUMN)?;
        let hour = find(HOUR_COLUMN)?;
        let label = find(LABEL_COLUMN)?;

        let mut features = HashMap::new();
        let mut feature_columns = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if [patient, experiment, hour, label].contains(&idx) {
                continue;
            }
            if features.insert(header.to_string(), feature_columns.len()).is_some() {
                return Err(DatasetError::InvalidFormat {
                    message: format!("duplicate feature column '{header}'"),
                }
                .into());
            }
            feature_columns.push(idx);
        }

        Ok(Self {
            patient,
            experiment,
            hour,
            label,
            features,
            feature_columns,
        })
    }

    fn parse(&self, record: &StringRecord, line: u64) -> GsResult<CohortRow> {
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let parse_error = |column: &str, value: &str| DatasetError::ParseError {
            line,
            message: format!("invalid {column} '{value}'"),
        };

        let patient = field(self.patient);
        if patient.is_empty() {
            return Err(parse_error(PATIENT_COLUMN, patient).into());
        }
        let experiment = field(self.experiment)
            .parse::<u32>()
            .map_err(|_| parse_error(EXPERIMENT_COLUMN, field(self.experiment)))?;
        let hour = field(self.hour)
            .parse::<f64>()
            .map_err(|_| parse_error(HOUR_COLUMN, field(self.hour)))?;
        let label = match field(self.label) {
            "0" => 0,
            "1" => 1,
            other => return Err(parse_error(LABEL_COLUMN, other).into()),
        };

        let values = self
            .feature_columns
            .iter()
            .map(|idx| match field(*idx) {
                "" => Ok(None),
                raw => raw
                    .parse::<f64>()
                    .map(|v| if v.is_finite() { Some(v) } else { None })
                    .map_err(|_| parse_error("feature value", raw)),
            })
            .collect::<Result<Vec<Option<f64>>, DatasetError>>()?;

        Ok(CohortRow {
            patient: patient.to_string(),
            experiment,
            hour,
            label,
            values,
        })
    }
}
