//! Cross-cutting observers
//!
//! - [`progress`] - Throughput reporting over the processed-record stream
//! - [`performance`] - Memory, CPU and scheduler-lag sampling

pub mod performance;
pub mod progress;

pub use performance::{MonitorReport, PerformanceMonitor, Sample};
pub use progress::{
    logging_callback, run_progress_ticker, ProgressCallback, ProgressStream, ProgressTracker,
    ProgressUpdate,
};
