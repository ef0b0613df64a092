//! On-disk dataset cache keyed by sweep task index.
//!
//! Each task index owns exactly one slot, `dataset-<index>.parquet`, inside
//! the cache directory. Slots are written once through a temporary file in
//! the same directory and renamed into place, so readers never observe a
//! partially written artifact.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use gs_types::{
    validation_error, CacheError, Dataset, FeatureCombination, GsResult, Observation, TaskContext,
};
use parking_lot::Mutex;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::providers::DatasetBuilder;

/// Persistent cache of materialized datasets
#[derive(Debug)]
pub struct TaskCache {
    dir: PathBuf,
    stats: Mutex<CacheStats>,
}

impl TaskCache {
    /// Open (creating if needed) the cache rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> GsResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Write {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            dir,
            stats: Mutex::new(CacheStats::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Slot path for a task index.
    pub fn path_for(&self, task_index: usize) -> PathBuf {
        self.dir.join(format!("dataset-{}.parquet", task_index))
    }

    pub fn contains(&self, task_index: usize) -> bool {
        self.path_for(task_index).is_file()
    }

    /// Return the dataset for `task_index`, building and persisting it on a miss.
    ///
    /// The builder is never invoked when the slot already exists.
    pub fn resolve<B: DatasetBuilder + ?Sized>(
        &self,
        task_index: usize,
        combination: &FeatureCombination,
        builder: &B,
        context: &TaskContext,
    ) -> GsResult<Dataset> {
        if combination.is_empty() {
            return Err(validation_error!(
                "task {} has an empty combination and cannot be cached",
                task_index
            ));
        }

        let path = self.path_for(task_index);
        if path.is_file() {
            let dataset = read_dataset(&path)?;
            let expected = combination.names();
            if dataset.feature_names != expected {
                return Err(CacheError::Corrupt {
                    path: path.display().to_string(),
                    message: format!(
                        "slot holds columns {:?} but task {} selects {:?}",
                        dataset.feature_names, task_index, expected
                    ),
                }
                .into());
            }
            self.stats.lock().hits += 1;
            tracing::debug!("Cache hit for task {}: {}", task_index, path.display());
            return Ok(dataset);
        }

        self.stats.lock().misses += 1;

        let dataset = builder.build(combination, context).inspect_err(|_| {
            self.stats.lock().build_failures += 1;
        })?;

        write_dataset(&self.dir, &path, &dataset)?;
        self.stats.lock().stores += 1;
        tracing::info!(
            "Cached dataset for task {} ({} rows) at {}",
            task_index,
            dataset.len(),
            path.display()
        );

        Ok(dataset)
    }

    pub fn get_stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub build_failures: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

const PATIENT_FIELD: &str = "patient";
const LABEL_FIELD: &str = "label";

fn dataset_schema(dataset: &Dataset) -> Arc<Schema> {
    let mut fields = vec![
        Field::new(PATIENT_FIELD, DataType::Utf8, false),
        Field::new(LABEL_FIELD, DataType::UInt8, false),
    ];
    fields.extend(
        dataset
            .feature_names
            .iter()
            .map(|name| Field::new(name, DataType::Float64, false)),
    );
    Arc::new(Schema::new(fields))
}

/// Convert a dataset to a single Arrow batch: patient, label, then one
/// column per feature.
fn dataset_to_record_batch(dataset: &Dataset) -> Result<RecordBatch, String> {
    let patients: Vec<&str> = dataset.rows.iter().map(|r| r.patient.as_str()).collect();
    let labels: Vec<u8> = dataset.rows.iter().map(|r| r.label).collect();

    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(patients)),
        Arc::new(UInt8Array::from(labels)),
    ];
    for col in 0..dataset.width() {
        let values: Vec<f64> = dataset.rows.iter().map(|r| r.values[col]).collect();
        arrays.push(Arc::new(Float64Array::from(values)));
    }

    RecordBatch::try_new(dataset_schema(dataset), arrays).map_err(|e| e.to_string())
}

fn record_batch_into_dataset(batch: &RecordBatch, dataset: &mut Dataset) -> Result<(), String> {
    let patients = batch
        .column(0)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or("Invalid patient column")?;
    let labels = batch
        .column(1)
        .as_any()
        .downcast_ref::<UInt8Array>()
        .ok_or("Invalid label column")?;
    let features = (2..batch.num_columns())
        .map(|i| {
            batch
                .column(i)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| format!("Invalid feature column {}", i - 2))
        })
        .collect::<Result<Vec<&Float64Array>, String>>()?;

    for row in 0..batch.num_rows() {
        if patients.is_null(row) || labels.is_null(row) {
            return Err(format!("null key at row {row}"));
        }
        let values = features.iter().map(|col| col.value(row)).collect();
        dataset
            .push(Observation::new(patients.value(row), labels.value(row), values))
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn read_dataset(path: &Path) -> GsResult<Dataset> {
    let corrupt = |message: String| CacheError::Corrupt {
        path: path.display().to_string(),
        message,
    };

    let file = File::open(path).map_err(|e| CacheError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| corrupt(format!("Failed to create Parquet reader: {}", e)))?;

    let schema = reader.schema().clone();
    if schema.fields().len() < 2 {
        return Err(corrupt(format!("expected at least 2 columns, found {}", schema.fields().len())).into());
    }
    let feature_names = schema
        .fields()
        .iter()
        .skip(2)
        .map(|f| f.name().clone())
        .collect();

    let reader = reader
        .build()
        .map_err(|e| corrupt(format!("Failed to build Parquet reader: {}", e)))?;

    let mut dataset = Dataset::new(feature_names);
    for batch_result in reader {
        let batch =
            batch_result.map_err(|e| corrupt(format!("Failed to read Parquet batch: {}", e)))?;
        record_batch_into_dataset(&batch, &mut dataset).map_err(corrupt)?;
    }
    Ok(dataset)
}

fn write_dataset(dir: &Path, path: &Path, dataset: &Dataset) -> GsResult<()> {
    let write_error = |message: String| CacheError::Write {
        path: path.display().to_string(),
        message,
    };

    let batch = dataset_to_record_batch(dataset).map_err(write_error)?;

    // Dropping the temp file on any early return removes it.
    let mut temp = tempfile::Builder::new()
        .prefix(".dataset-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| write_error(e.to_string()))?;

    let mut writer = ArrowWriter::try_new(temp.as_file_mut(), batch.schema(), None)
        .map_err(|e| write_error(e.to_string()))?;
    writer.write(&batch).map_err(|e| write_error(e.to_string()))?;
    writer.close().map_err(|e| write_error(e.to_string()))?;

    temp.as_file()
        .sync_all()
        .map_err(|e| write_error(e.to_string()))?;
    temp.persist(path)
        .map_err(|e| write_error(e.error.to_string()))?;
    Ok(())
}
