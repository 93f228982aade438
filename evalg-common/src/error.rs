//! Common error types for evalg
//!
//! Three families share one enum:
//! - configuration problems (missing files, malformed documents, missing keys)
//! - concurrency-model misuse of a `ConcurrentParam`
//! - pipeline assembly problems (unknown algorithms, duplicate names, missing banks)

use std::path::PathBuf;
use thiserror::Error;

use crate::params::ConcurrencyKey;

/// Common result type for evalg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across evalg crates
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration file could not be located on the search path
    #[error("Configuration file not found: {0}")]
    ConfigFileNotFound(String),

    /// A configuration document failed to parse
    #[error("Malformed configuration document {path:?}: {message}")]
    MalformedDocument { path: PathBuf, message: String },

    /// A hard lookup found no value at the requested node
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    /// A value exists but has the wrong type for the request
    #[error("Type mismatch for '{key}': expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Run ranges in a container overlap (strict validation only)
    #[error("Overlapping run ranges in '{0}'")]
    OverlappingRunRanges(String),

    /// No value stored for a concurrency key
    #[error("No value stored for concurrency key {0}")]
    KeyNotFound(ConcurrencyKey),

    /// Operation not valid for the parameter's concurrency model
    #[error("Concurrency model misuse: {0}")]
    ModelMisuse(String),

    /// Feature not yet implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// No constructor registered under this algorithm name
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Instance name already used within a sequence
    #[error("Duplicate algorithm instance name: {0}")]
    DuplicateInstance(String),

    /// No member with this instance name, or not of the requested type
    #[error("Unknown algorithm instance: {0}")]
    UnknownInstance(String),

    /// A bank required by an algorithm is absent from the bank list
    #[error("Required input bank '{bank}' not found for algorithm '{algorithm}'")]
    MissingInput { bank: String, algorithm: String },

    /// A bank does not have the requested column
    #[error("Bank '{bank}' has no column '{column}'")]
    MissingColumn { bank: String, column: String },

    /// Row index beyond the bank's row count
    #[error("Row {row} out of range for bank '{bank}' ({rows} rows)")]
    RowOutOfRange { bank: String, row: usize, rows: usize },

    /// Lifecycle call made in the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Settings loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decode error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Internal error (poisoned locks and the like)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a poisoned lock into an internal error
    pub(crate) fn poisoned<T>(_err: std::sync::PoisonError<T>) -> Self {
        Error::Internal("lock poisoned by a panicking thread".to_string())
    }
}
