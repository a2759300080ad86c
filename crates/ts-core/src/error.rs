//! Error types for tmdstat

use thiserror::Error;

/// tmdstat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Event source (Parquet / ROOT) error
    #[error("Event source error: {0}")]
    EventSource(String),

    /// Lookup of a kinematic variable name that is not in the catalogue
    #[error("unknown variable '{0}' (allowed: X, Q2, Q, Z, Mh, PhPerp)")]
    UnknownVariable(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
