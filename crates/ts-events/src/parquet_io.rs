//! Parquet / Arrow event I/O.
//!
//! # Schema: `tmdstat_events_v1`
//!
//! | Column      | Arrow Type                          | Description               |
//! |-------------|-------------------------------------|---------------------------|
//! | `<branch>`  | `Float64` (reader also accepts `Float32`, `Int32`, `Int64`) | One column per branch |
//! | `Weight`    | `Float64`                           | Per-event weight (optional) |
//!
//! Null entries in observable columns are read as `NaN`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;

use ts_core::{Error, Result};

use crate::sample::EventSample;
use crate::source::{DEFAULT_WEIGHT_BRANCH, EventSource, ReadRequest};

/// Schema version string embedded in Parquet key-value metadata.
pub const EVENTS_SCHEMA_V1: &str = "tmdstat_events_v1";

/// Parquet metadata key for the schema version.
pub const META_KEY_SCHEMA_VERSION: &str = "tmdstat.schema_version";

/// Event source backed by a Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    path: PathBuf,
}

impl ParquetSource {
    /// Source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EventSource for ParquetSource {
    fn read(&self, request: &ReadRequest) -> Result<EventSample> {
        request.validate()?;
        let file = std::fs::File::open(&self.path).map_err(|e| {
            Error::EventSource(format!("failed to open {}: {e}", self.path.display()))
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::EventSource(format!("failed to read Parquet: {e}")))?;

        let schema = builder.schema().clone();
        let reader = builder
            .build()
            .map_err(|e| Error::EventSource(format!("failed to build Parquet reader: {e}")))?;

        let batches: std::result::Result<Vec<_>, _> = reader.collect();
        let batches = batches
            .map_err(|e| Error::EventSource(format!("failed to read Parquet batches: {e}")))?;

        let merged = arrow::compute::concat_batches(&schema, &batches)
            .map_err(|e| Error::EventSource(format!("failed to concat batches: {e}")))?;

        log::debug!("read {} rows from {}", merged.num_rows(), self.path.display());
        let sample = sample_from_record_batch(&merged, request)?;
        Ok(request.finish(sample))
    }

    fn describe(&self) -> String {
        format!("parquet:{}", self.path.display())
    }
}

/// Build an [`EventSample`] from the requested columns of a [`RecordBatch`].
pub fn sample_from_record_batch(batch: &RecordBatch, request: &ReadRequest) -> Result<EventSample> {
    let schema = batch.schema();

    let mut columns = Vec::with_capacity(request.branches.len());
    for name in request.unique_branches() {
        let idx = schema.index_of(&name).map_err(|_| {
            Error::EventSource(format!("missing column '{name}' in Parquet file"))
        })?;
        columns.push((name.clone(), column_as_f64(batch.column(idx), &name)?));
    }

    let weights = match &request.weight {
        Some(w) => {
            let idx = schema.index_of(w).map_err(|_| {
                Error::EventSource(format!("missing weight column '{w}' in Parquet file"))
            })?;
            Some(column_as_f64(batch.column(idx), w)?)
        }
        None => None,
    };

    EventSample::from_columns(columns, weights)
}

fn column_as_f64(arr: &ArrayRef, name: &str) -> Result<Vec<f64>> {
    let values: Vec<f64> = match arr.data_type() {
        DataType::Float64 => {
            arr.as_primitive::<Float64Type>().iter().map(|v| v.unwrap_or(f64::NAN)).collect()
        }
        DataType::Float32 => arr
            .as_primitive::<Float32Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect(),
        DataType::Int32 => arr
            .as_primitive::<Int32Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect(),
        DataType::Int64 => arr
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, |x| x as f64))
            .collect(),
        other => {
            return Err(Error::EventSource(format!(
                "column '{name}' has type {other:?}, expected a numeric type"
            )));
        }
    };
    Ok(values)
}

/// Build an Arrow [`RecordBatch`] from an [`EventSample`].
///
/// Weights are written as a `Weight` column when the sample is weighted.
pub fn sample_to_record_batch(sample: &EventSample) -> Result<RecordBatch> {
    let mut fields: Vec<Field> = sample
        .column_names()
        .iter()
        .map(|n| Field::new(n, DataType::Float64, false))
        .collect();
    let mut arrays: Vec<ArrayRef> = sample
        .column_names()
        .iter()
        .map(|name| {
            let col = sample.require_column(name)?;
            Ok(Arc::new(Float64Array::from(col.to_vec())) as ArrayRef)
        })
        .collect::<Result<_>>()?;

    let write_weights = sample.is_weighted()
        && !sample.column_names().iter().any(|n| n == DEFAULT_WEIGHT_BRANCH);
    if write_weights {
        fields.push(Field::new(DEFAULT_WEIGHT_BRANCH, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(sample.weights().to_vec())) as ArrayRef);
    }

    let metadata =
        HashMap::from([(META_KEY_SCHEMA_VERSION.to_string(), EVENTS_SCHEMA_V1.to_string())]);
    let schema = Arc::new(Schema::new(fields).with_metadata(metadata));

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| Error::EventSource(format!("failed to build RecordBatch: {e}")))
}

/// Write an [`EventSample`] to a Parquet file (Snappy compressed).
pub fn write_parquet(sample: &EventSample, path: &Path) -> Result<()> {
    let batch = sample_to_record_batch(sample)?;
    let file = std::fs::File::create(path).map_err(|e| {
        Error::EventSource(format!("failed to create {}: {e}", path.display()))
    })?;

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| Error::EventSource(format!("failed to create Parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| Error::EventSource(format!("failed to write Parquet: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::EventSource(format!("failed to close Parquet writer: {e}")))?;
    Ok(())
}
