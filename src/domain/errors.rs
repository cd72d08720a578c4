//! Domain error types
//!
//! This module defines the error hierarchy for Conduit. Each pipeline stage
//! has its own error type, and all of them fold into [`ConduitError`].
//! None of the variants expose third-party driver types.

use crate::domain::ids::RecordId;
use thiserror::Error;

/// Main Conduit error type
///
/// This is the primary error type used throughout the crate.
/// It wraps stage-specific error types and provides context for error handling.
#[derive(Debug, Clone, Error)]
pub enum ConduitError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reading from the source failed
    #[error("Source read error: {0}")]
    Source(#[from] SourceReadError),

    /// The processing function failed or timed out
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    /// Persisting a batch failed
    #[error("Sink write error: {0}")]
    Sink(#[from] SinkWriteError),

    /// Errors raised by a store adapter outside a running pipeline
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Pipeline lifecycle errors (e.g. running a finished pipeline again)
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl ConduitError {
    /// Short machine-friendly name of the error class, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ConduitError::Configuration(_) => "configuration",
            ConduitError::Source(_) => "source_read",
            ConduitError::Processing(ProcessingError::Timeout { .. }) => "processing_timeout",
            ConduitError::Processing(_) => "processing",
            ConduitError::Sink(_) => "sink_write",
            ConduitError::Store(_) => "store",
            ConduitError::Pipeline(_) => "pipeline",
            ConduitError::Validation(_) => "validation",
            ConduitError::Serialization(_) => "serialization",
            ConduitError::Io(_) => "io",
            ConduitError::Other(_) => "other",
        }
    }
}

/// Errors raised by a store adapter
///
/// Adapters map driver errors into these variants. The pipeline stages then
/// decide whether a given variant is fatal.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A record with the same id already exists
    #[error("Duplicate key: {message}")]
    DuplicateKey {
        message: String,
        /// Records the driver reports as written before the conflict
        inserted_before_conflict: Option<u64>,
    },

    /// Failed to connect to or acquire a connection from the store
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A read query failed
    #[error("Query failed: {0}")]
    Query(String),

    /// A write failed for a reason other than a duplicate key
    #[error("Write failed: {0}")]
    Write(String),

    /// A stored document could not be decoded
    #[error("Invalid document: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true for duplicate-key conflicts
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

/// Fatal failure while reading pages from the source
#[derive(Debug, Clone, Error)]
#[error("failed to read page after id {after}: {cause}")]
pub struct SourceReadError {
    /// Last id seen before the failing page (0 for the first page)
    pub after: u64,
    /// Underlying store failure
    pub cause: StoreError,
}

/// Fatal failure inside the processing function
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    /// The processing function returned an error
    #[error("record {record_id} failed: {message}")]
    Failed { record_id: RecordId, message: String },

    /// The processing function did not finish in time
    #[error("record {record_id} timed out after {timeout_ms}ms")]
    Timeout { record_id: RecordId, timeout_ms: u64 },

    /// The processing function panicked
    #[error("record {record_id} panicked: {message}")]
    Panicked { record_id: RecordId, message: String },
}

/// Fatal failure while persisting a batch
#[derive(Debug, Clone, Error)]
#[error("batch {batch_sequence} ({batch_size} records) failed: {cause}")]
pub struct SinkWriteError {
    /// Sequence number of the failing batch
    pub batch_sequence: u64,
    /// Number of records in the failing batch
    pub batch_size: usize,
    /// Underlying store failure
    pub cause: StoreError,
}

// Conversion from std::io::Error
impl From<std::io::Error> for ConduitError {
    fn from(err: std::io::Error) -> Self {
        ConduitError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ConduitError {
    fn from(err: serde_json::Error) -> Self {
        ConduitError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ConduitError {
    fn from(err: toml::de::Error) -> Self {
        ConduitError::Configuration(format!("TOML parse error: {err}"))
    }
}
