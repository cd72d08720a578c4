//! Integration tests for the performance monitor and progress tracking

use conduit::config::MonitorConfig;
use conduit::core::monitor::{PerformanceMonitor, ProgressStream, ProgressTracker, ProgressUpdate};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        enabled: true,
        sample_interval_ms: 20,
        lag_interval_ms: 10,
    }
}

#[tokio::test]
async fn test_monitor_collects_samples_while_running() {
    let mut monitor = PerformanceMonitor::new(fast_config());
    assert!(!monitor.is_running());

    monitor.start();
    assert!(monitor.is_running());

    // Allocate something so the process has measurable memory
    let ballast: Vec<u8> = vec![1; 4 * 1024 * 1024];
    tokio::time::sleep(Duration::from_millis(150)).await;

    let report = monitor.stop().await;
    assert!(!monitor.is_running());
    assert_eq!(ballast.len(), 4 * 1024 * 1024);

    // Baseline, at least a few timer samples, and the final one
    assert!(report.sample_count >= 3, "got {} samples", report.sample_count);
    assert_eq!(report.sample_count, monitor.samples().len());
    assert!(report.lag_sample_count >= 1);
    assert!(report.peak_memory_mb >= report.min_memory_mb);
    assert!(report.average_memory_mb <= report.peak_memory_mb);
    assert!(report.max_lag_ms >= report.avg_lag_ms);
    assert_eq!(report.gc_count, 0);
    assert!(report.duration_ms >= 150);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut monitor = PerformanceMonitor::new(fast_config());
    monitor.start();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let first = monitor.stop().await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    let second = monitor.stop().await;

    assert_eq!(first, second);
    assert_eq!(monitor.report(), Some(&first));
}

#[tokio::test]
async fn test_report_serializes_with_memory_units() {
    let mut monitor = PerformanceMonitor::new(fast_config());
    monitor.start();
    let report = monitor.stop().await;

    let json = serde_json::to_value(&report).unwrap();
    for key in [
        "startMemoryMB",
        "endMemoryMB",
        "minMemoryMB",
        "peakMemoryMB",
        "averageMemoryMB",
        "gcCount",
        "avgLagMs",
        "maxLagMs",
    ] {
        assert!(json.get(key).is_some(), "missing {key} in {json}");
    }
}

#[tokio::test]
async fn test_progress_stream_final_report_on_error() {
    let seen = Arc::new(Mutex::new(Vec::<ProgressUpdate>::new()));
    let sink = seen.clone();
    let tracker = Arc::new(ProgressTracker::new(
        Duration::from_secs(3600),
        4,
        Arc::new(move |u: &ProgressUpdate| sink.lock().unwrap().push(*u)),
    ));
    let items = (0..6u32)
        .map(Ok)
        .chain(std::iter::once(Err("upstream failed")))
        .chain((6..10u32).map(Ok));

    let mut stream = ProgressStream::new(futures::stream::iter(items), tracker);
    let mut passed = Vec::new();
    while let Some(item) = stream.next().await {
        passed.push(item);
    }

    // Items after the error still pass through but are no longer counted
    assert_eq!(passed.len(), 11);
    assert!(stream.tracker().is_finished());
    assert_eq!(stream.tracker().items(), 6);

    let seen = seen.lock().unwrap();
    let counts: Vec<(u64, bool)> = seen.iter().map(|u| (u.items, u.is_final)).collect();
    assert_eq!(counts, vec![(4, false), (6, true)]);
}
