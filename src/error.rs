//! Error types for W-HEART
//!
//! The engine itself is infallible; everything here belongs to ingestion,
//! column mapping, and persistence.

use thiserror::Error;

/// A cell could not be converted to the type a field needs
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot read {field} from {value:?}: expected {expected}")]
pub struct CoercionError {
    pub field: String,
    pub value: String,
    pub expected: &'static str,
}

/// Errors raised while mapping a dataset row onto a `RiskInput`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("Missing required column {column:?} for field {field}")]
    MissingColumn { field: String, column: String },

    #[error("Field {0} has no source column and no default")]
    UnmappedField(String),

    #[error("Field {0} is empty")]
    EmptyValue(String),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("Invalid column map: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur outside the engine
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("Row {row}: {source}")]
    RowMapping {
        row: usize,
        #[source]
        source: MappingError,
    },

    #[error("Dataset has no rows")]
    EmptyDataset,

    #[error("Column length mismatch: dataset has {rows} rows, got {values} values")]
    LengthMismatch { rows: usize, values: usize },
}
