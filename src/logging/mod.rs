//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with thread and span information
//! - JSON-formatted local log files with rotation
//! - Log macros for the pipeline's lifecycle events
//!
//! # Example
//!
//! ```no_run
//! use conduit::logging::init_logging;
//! use conduit::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a pipeline run
///
/// # Example
///
/// ```no_run
/// use conduit::log_pipeline_start;
///
/// log_pipeline_start!("6f1c", "memory:records", 1000usize, 4usize, 500usize);
/// ```
#[macro_export]
macro_rules! log_pipeline_start {
    ($run_id:expr, $source:expr, $page_size:expr, $concurrency:expr, $batch_size:expr) => {
        tracing::info!(
            run_id = %$run_id,
            source = %$source,
            page_size = $page_size,
            concurrency = $concurrency,
            batch_size = $batch_size,
            "Starting pipeline"
        );
    };
}

/// Log the end of a pipeline run
///
/// # Example
///
/// ```no_run
/// use conduit::log_pipeline_complete;
/// use std::time::Duration;
///
/// log_pipeline_complete!("6f1c", "completed", 42u64, Duration::from_secs(10));
/// ```
#[macro_export]
macro_rules! log_pipeline_complete {
    ($run_id:expr, $status:expr, $count:expr, $duration:expr) => {
        tracing::info!(
            run_id = %$run_id,
            status = %$status,
            total_processed = $count,
            duration_ms = $duration.as_millis() as u64,
            "Pipeline finished"
        );
    };
}

/// Log a batch persisted by the sink
///
/// # Example
///
/// ```no_run
/// use conduit::log_batch_written;
///
/// log_batch_written!(3u64, 500usize, 500u64, 2000u64);
/// ```
#[macro_export]
macro_rules! log_batch_written {
    ($sequence:expr, $size:expr, $inserted:expr, $total:expr) => {
        tracing::debug!(
            batch = $sequence,
            size = $size,
            inserted = $inserted,
            total_inserted = $total,
            "Batch written"
        );
    };
}
