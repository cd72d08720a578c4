//! Pipeline run report
//!
//! This module defines the report produced by every run, including failed
//! and cancelled ones.

use crate::core::monitor::performance::MonitorReport;
use crate::domain::ConduitError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// The source was exhausted (or hit its limit) and the sink acknowledged
    /// the final batch
    Completed,
    /// A stage raised a fatal error
    Failed,
    /// An external shutdown stopped the run
    Cancelled,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStatus::Completed => write!(f, "completed"),
            PipelineStatus::Failed => write!(f, "failed"),
            PipelineStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Counts, timings and memory figures for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    /// Unique id of the run
    pub run_id: Uuid,

    /// Terminal status
    pub status: PipelineStatus,

    /// Sum of all batch sizes handed to the sink
    pub total_processed: u64,

    /// Records the sink reported as inserted
    pub total_inserted: u64,

    /// Batches acknowledged by the sink, duplicates included
    pub batches_written: u64,

    /// Batches counted as 0 because of a duplicate key
    pub duplicate_batches: u64,

    /// Wall-clock duration of the run
    pub total_time_ms: u64,

    /// `total_processed` per second of wall-clock time
    pub records_per_second: f64,

    #[serde(rename = "peakMemoryMB")]
    pub peak_memory_mb: f64,

    #[serde(rename = "averageMemoryMB")]
    pub average_memory_mb: f64,

    #[serde(rename = "startMemoryMB")]
    pub start_memory_mb: f64,

    #[serde(rename = "endMemoryMB")]
    pub end_memory_mb: f64,

    #[serde(rename = "minMemoryMB")]
    pub min_memory_mb: f64,

    /// Always 0, see [`crate::core::monitor::performance`]
    pub gc_count: u64,

    /// Always 0, see [`crate::core::monitor::performance`]
    pub gc_time_ms: f64,

    pub avg_event_loop_lag_ms: f64,

    pub max_event_loop_lag_ms: f64,
}

impl PipelineReport {
    /// Create an empty report for `run_id` with the given status
    pub fn new(run_id: Uuid, status: PipelineStatus) -> Self {
        Self {
            run_id,
            status,
            total_processed: 0,
            total_inserted: 0,
            batches_written: 0,
            duplicate_batches: 0,
            total_time_ms: 0,
            records_per_second: 0.0,
            peak_memory_mb: 0.0,
            average_memory_mb: 0.0,
            start_memory_mb: 0.0,
            end_memory_mb: 0.0,
            min_memory_mb: 0.0,
            gc_count: 0,
            gc_time_ms: 0.0,
            avg_event_loop_lag_ms: 0.0,
            max_event_loop_lag_ms: 0.0,
        }
    }

    /// Set the duration and derive the throughput from it
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_time_ms = duration.as_millis() as u64;
        let secs = duration.as_secs_f64();
        self.records_per_second = if secs > 0.0 {
            (self.total_processed as f64 / secs * 100.0).round() / 100.0
        } else {
            0.0
        };
        self
    }

    /// Copy memory, GC and lag figures from a monitor report
    pub fn with_monitor(mut self, monitor: &MonitorReport) -> Self {
        self.peak_memory_mb = monitor.peak_memory_mb;
        self.average_memory_mb = monitor.average_memory_mb;
        self.start_memory_mb = monitor.start_memory_mb;
        self.end_memory_mb = monitor.end_memory_mb;
        self.min_memory_mb = monitor.min_memory_mb;
        self.gc_count = monitor.gc_count;
        self.gc_time_ms = monitor.gc_time_ms;
        self.avg_event_loop_lag_ms = monitor.avg_lag_ms;
        self.max_event_loop_lag_ms = monitor.max_lag_ms;
        self
    }

    /// Completed without any duplicate-key batch
    pub fn is_clean(&self) -> bool {
        self.status == PipelineStatus::Completed && self.duplicate_batches == 0
    }

    /// Log the report
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            status = %self.status,
            total_processed = self.total_processed,
            total_inserted = self.total_inserted,
            batches = self.batches_written,
            duplicate_batches = self.duplicate_batches,
            total_time_ms = self.total_time_ms,
            records_per_second = self.records_per_second,
            peak_memory_mb = self.peak_memory_mb,
            max_lag_ms = self.max_event_loop_lag_ms,
            "Pipeline report"
        );

        if self.duplicate_batches > 0 {
            tracing::warn!(
                duplicate_batches = self.duplicate_batches,
                "Run completed with duplicate-key batches counted as 0 inserted"
            );
        }
    }
}

/// A failed run: the fatal error plus what had been done before it
#[derive(Debug, Clone, Error)]
#[error("pipeline failed after {} records: {error}", .report.total_processed)]
pub struct PipelineFailure {
    /// The first fatal error of the run
    #[source]
    pub error: ConduitError,

    /// Partial report with status `failed`
    pub report: PipelineReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_camel_case() {
        let mut report = PipelineReport::new(Uuid::new_v4(), PipelineStatus::Completed);
        report.total_processed = 10;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["totalProcessed"], 10);
        assert!(json.get("peakMemoryMB").is_some());
        assert!(json.get("averageMemoryMB").is_some());
        assert!(json.get("avgEventLoopLagMs").is_some());
        assert!(json.get("maxEventLoopLagMs").is_some());
        assert_eq!(json["gcCount"], 0);
    }

    #[test]
    fn test_with_duration_computes_rate() {
        let mut report = PipelineReport::new(Uuid::new_v4(), PipelineStatus::Completed);
        report.total_processed = 500;
        let report = report.with_duration(Duration::from_millis(2000));

        assert_eq!(report.total_time_ms, 2000);
        assert_eq!(report.records_per_second, 250.0);

        let zero = PipelineReport::new(Uuid::new_v4(), PipelineStatus::Completed)
            .with_duration(Duration::ZERO);
        assert_eq!(zero.records_per_second, 0.0);
    }

    #[test]
    fn test_with_monitor_copies_figures() {
        let monitor = MonitorReport {
            peak_memory_mb: 64.0,
            average_memory_mb: 48.0,
            max_lag_ms: 3.5,
            ..Default::default()
        };
        let report =
            PipelineReport::new(Uuid::new_v4(), PipelineStatus::Failed).with_monitor(&monitor);

        assert_eq!(report.peak_memory_mb, 64.0);
        assert_eq!(report.average_memory_mb, 48.0);
        assert_eq!(report.max_event_loop_lag_ms, 3.5);
        assert_eq!(report.gc_time_ms, 0.0);
    }

    #[test]
    fn test_is_clean() {
        let mut report = PipelineReport::new(Uuid::new_v4(), PipelineStatus::Completed);
        assert!(report.is_clean());

        report.duplicate_batches = 1;
        assert!(!report.is_clean());

        let cancelled = PipelineReport::new(Uuid::new_v4(), PipelineStatus::Cancelled);
        assert!(!cancelled.is_clean());
    }

    #[test]
    fn test_failure_display() {
        let mut report = PipelineReport::new(Uuid::new_v4(), PipelineStatus::Failed);
        report.total_processed = 6;
        let failure = PipelineFailure {
            error: ConduitError::Other("boom".to_string()),
            report,
        };
        assert_eq!(failure.to_string(), "pipeline failed after 6 records: boom");
    }
}
