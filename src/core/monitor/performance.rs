//! Performance monitor
//!
//! Samples process memory, CPU and system load on one timer and scheduler
//! lag on another, independently of the pipeline. Each monitor owns its
//! timers and samples; any number can run at once.
//!
//! Rust has no tracing garbage collector, so `gc_count` and `gc_time_ms`
//! are always reported as 0.

use crate::config::schema::MonitorConfig;
use serde::Serialize;
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One memory/CPU/load snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Milliseconds since the monitor started
    pub elapsed_ms: u64,
    /// Resident set size of this process
    pub rss_bytes: u64,
    /// Virtual memory of this process
    pub virtual_bytes: u64,
    /// Process CPU usage (100.0 = one core)
    pub cpu_percent: f32,
    /// Memory in use system-wide
    pub system_used_bytes: u64,
    /// One-minute load average (0 where unsupported)
    pub load_avg_one: f64,
}

impl Sample {
    /// Resident memory in MB
    pub fn rss_mb(&self) -> f64 {
        self.rss_bytes as f64 / BYTES_PER_MB
    }
}

/// Summary computed once by [`PerformanceMonitor::stop`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorReport {
    pub duration_ms: u64,
    pub sample_count: usize,
    #[serde(rename = "startMemoryMB")]
    pub start_memory_mb: f64,
    #[serde(rename = "endMemoryMB")]
    pub end_memory_mb: f64,
    #[serde(rename = "minMemoryMB")]
    pub min_memory_mb: f64,
    #[serde(rename = "peakMemoryMB")]
    pub peak_memory_mb: f64,
    #[serde(rename = "averageMemoryMB")]
    pub average_memory_mb: f64,
    pub gc_count: u64,
    pub gc_time_ms: f64,
    pub lag_sample_count: usize,
    pub avg_lag_ms: f64,
    pub max_lag_ms: f64,
}

impl MonitorReport {
    fn from_samples(duration: Duration, samples: &[Sample], lags: &[f64]) -> Self {
        let mut report = MonitorReport {
            duration_ms: duration.as_millis() as u64,
            sample_count: samples.len(),
            lag_sample_count: lags.len(),
            ..Default::default()
        };

        if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
            let memory: Vec<f64> = samples.iter().map(Sample::rss_mb).collect();
            report.start_memory_mb = round2(first.rss_mb());
            report.end_memory_mb = round2(last.rss_mb());
            report.min_memory_mb = round2(memory.iter().copied().fold(f64::INFINITY, f64::min));
            report.peak_memory_mb = round2(memory.iter().copied().fold(0.0, f64::max));
            report.average_memory_mb = round2(memory.iter().sum::<f64>() / memory.len() as f64);
        }

        if !lags.is_empty() {
            report.avg_lag_ms = round2(lags.iter().sum::<f64>() / lags.len() as f64);
            report.max_lag_ms = round2(lags.iter().copied().fold(0.0, f64::max));
        }

        report
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reads process and system figures through sysinfo
struct Probe {
    system: System,
    pid: Option<Pid>,
    started_at: Instant,
}

impl Probe {
    fn new(started_at: Instant) -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            started_at,
        }
    }

    fn sample(&mut self) -> Sample {
        let (rss_bytes, virtual_bytes, cpu_percent) = match self.pid {
            Some(pid) if self.system.refresh_process(pid) => self
                .system
                .process(pid)
                .map(|p| (p.memory(), p.virtual_memory(), p.cpu_usage()))
                .unwrap_or_default(),
            _ => (0, 0, 0.0),
        };
        self.system.refresh_memory();

        Sample {
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
            rss_bytes,
            virtual_bytes,
            cpu_percent,
            system_used_bytes: self.system.used_memory(),
            load_avg_one: System::load_average().one,
        }
    }
}

async fn sample_loop(
    mut probe: Probe,
    mut samples: Vec<Sample>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> (Probe, Vec<Sample>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => samples.push(probe.sample()),
        }
    }
    (probe, samples)
}

async fn lag_loop(period: Duration, mut stop: watch::Receiver<bool>) -> Vec<f64> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lags = Vec::new();

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                let scheduled = Instant::now();
                if tokio::spawn(async {}).await.is_ok() {
                    lags.push(scheduled.elapsed().as_secs_f64() * 1000.0);
                }
            }
        }
    }
    lags
}

/// Samples resource usage while a pipeline runs
pub struct PerformanceMonitor {
    config: MonitorConfig,
    started_at: Option<Instant>,
    stop_tx: Option<watch::Sender<bool>>,
    sampler: Option<JoinHandle<(Probe, Vec<Sample>)>>,
    lag_probe: Option<JoinHandle<Vec<f64>>>,
    samples: Vec<Sample>,
    report: Option<MonitorReport>,
}

impl PerformanceMonitor {
    /// Create a stopped monitor
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            started_at: None,
            stop_tx: None,
            sampler: None,
            lag_probe: None,
            samples: Vec::new(),
            report: None,
        }
    }

    /// Capture a baseline and start both timers
    ///
    /// Must be called from within a tokio runtime. Starting twice does
    /// nothing.
    pub fn start(&mut self) {
        if self.started_at.is_some() {
            return;
        }
        let started_at = Instant::now();
        let mut probe = Probe::new(started_at);
        let baseline = probe.sample();
        let (stop_tx, stop_rx) = watch::channel(false);

        self.sampler = Some(tokio::spawn(sample_loop(
            probe,
            vec![baseline],
            Duration::from_millis(self.config.sample_interval_ms.max(1)),
            stop_rx.clone(),
        )));
        self.lag_probe = Some(tokio::spawn(lag_loop(
            Duration::from_millis(self.config.lag_interval_ms.max(1)),
            stop_rx,
        )));
        self.stop_tx = Some(stop_tx);
        self.started_at = Some(started_at);

        tracing::debug!(
            baseline_mb = round2(baseline.rss_mb()),
            sample_interval_ms = self.config.sample_interval_ms,
            lag_interval_ms = self.config.lag_interval_ms,
            "Performance monitor started"
        );
    }

    /// Stop the timers and return the final report
    ///
    /// The first call computes and caches the report; later calls return
    /// the cached copy.
    pub async fn stop(&mut self) -> MonitorReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }

        let mut lags = Vec::new();
        if let Some(handle) = self.lag_probe.take() {
            lags = handle.await.unwrap_or_default();
        }
        if let Some(handle) = self.sampler.take() {
            if let Ok((mut probe, samples)) = handle.await {
                self.samples = samples;
                self.samples.push(probe.sample());
            }
        }

        let duration = self
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let report = MonitorReport::from_samples(duration, &self.samples, &lags);

        tracing::debug!(
            samples = report.sample_count,
            peak_mb = report.peak_memory_mb,
            max_lag_ms = report.max_lag_ms,
            "Performance monitor stopped"
        );

        self.report = Some(report.clone());
        report
    }

    /// Returns true between `start` and `stop`
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.report.is_none()
    }

    /// Samples collected, available after `stop`
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// The cached report, if `stop` has been called
    pub fn report(&self) -> Option<&MonitorReport> {
        self.report.as_ref()
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
        if let Some(handle) = self.lag_probe.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MonitorConfig {
        MonitorConfig {
            enabled: true,
            sample_interval_ms: 10,
            lag_interval_ms: 5,
        }
    }

    fn sample(rss_mb: u64) -> Sample {
        Sample {
            elapsed_ms: 0,
            rss_bytes: rss_mb * 1024 * 1024,
            virtual_bytes: 0,
            cpu_percent: 0.0,
            system_used_bytes: 0,
            load_avg_one: 0.0,
        }
    }

    #[test]
    fn test_report_from_samples() {
        let samples = [sample(10), sample(30), sample(20)];
        let report =
            MonitorReport::from_samples(Duration::from_millis(1500), &samples, &[1.0, 3.0]);

        assert_eq!(report.duration_ms, 1500);
        assert_eq!(report.start_memory_mb, 10.0);
        assert_eq!(report.end_memory_mb, 20.0);
        assert_eq!(report.min_memory_mb, 10.0);
        assert_eq!(report.peak_memory_mb, 30.0);
        assert_eq!(report.average_memory_mb, 20.0);
        assert_eq!(report.avg_lag_ms, 2.0);
        assert_eq!(report.max_lag_ms, 3.0);
        assert_eq!(report.gc_count, 0);
        assert_eq!(report.gc_time_ms, 0.0);
    }

    #[test]
    fn test_report_without_samples() {
        let report = MonitorReport::from_samples(Duration::ZERO, &[], &[]);
        assert_eq!(report, MonitorReport::default());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut monitor = PerformanceMonitor::new(config());
        monitor.start();
        assert!(monitor.is_running());
        tokio::time::sleep(Duration::from_millis(40)).await;

        let first = monitor.stop().await;
        let second = monitor.stop().await;

        assert_eq!(first, second);
        assert!(!monitor.is_running());
        // Baseline plus the final sample at minimum
        assert!(first.sample_count >= 2);
        assert_eq!(monitor.samples().len(), first.sample_count);
        assert!(first.lag_sample_count >= 1);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut monitor = PerformanceMonitor::new(config());
        let report = monitor.stop().await;
        assert_eq!(report.sample_count, 0);
        assert_eq!(monitor.report(), Some(&report));
    }

    #[tokio::test]
    async fn test_monitors_are_independent() {
        let mut a = PerformanceMonitor::new(config());
        let mut b = PerformanceMonitor::new(config());
        a.start();
        b.start();

        let report_a = a.stop().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(b.is_running());
        let report_b = b.stop().await;

        assert!(report_b.duration_ms >= report_a.duration_ms);
    }
}
