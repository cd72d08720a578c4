//! Pipeline runner - wires the stages together and owns the run lifecycle
//!
//! Source, processing and accumulator each run as one tokio task connected
//! by bounded channels; the sink runs on the caller's task. The first fatal
//! error from any stage travels downstream in-band, reaches the sink loop
//! and ends the run. Remaining tasks are then aborted once.

use crate::adapters::store::{RecordReader, RecordWriter};
use crate::config::schema::{MonitorConfig, PipelineConfig};
use crate::core::monitor::performance::{MonitorReport, PerformanceMonitor};
use crate::core::monitor::progress::{
    logging_callback, run_progress_ticker, ProgressCallback, ProgressStream, ProgressTracker,
};
use crate::core::pipeline::accumulator::{run_accumulator, BatchAccumulator};
use crate::core::pipeline::processing::ProcessingStage;
use crate::core::pipeline::report::{PipelineFailure, PipelineReport, PipelineStatus};
use crate::core::pipeline::sink::BatchSink;
use crate::core::pipeline::source::{self, run_source, CursorOptions};
use crate::core::transform::RecordProcessor;
use crate::domain::record::RecordFilter;
use crate::domain::ConduitError;
use crate::{log_pipeline_complete, log_pipeline_start};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Lifecycle of a [`PipelineRunner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineState {
    /// Returns true for completed, failed and cancelled
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Failed | PipelineState::Cancelled
        )
    }
}

impl From<PipelineStatus> for PipelineState {
    fn from(status: PipelineStatus) -> Self {
        match status {
            PipelineStatus::Completed => PipelineState::Completed,
            PipelineStatus::Failed => PipelineState::Failed,
            PipelineStatus::Cancelled => PipelineState::Cancelled,
        }
    }
}

/// Sink-side totals gathered while the run is in progress
#[derive(Debug, Default, Clone, Copy)]
struct RunTotals {
    processed: u64,
    inserted: u64,
    batches: u64,
    duplicate_batches: u64,
}

impl RunTotals {
    fn from_sink(sink: &BatchSink) -> Self {
        Self {
            processed: sink.records_received(),
            inserted: sink.total_inserted(),
            batches: sink.batches_written(),
            duplicate_batches: sink.duplicate_batches(),
        }
    }
}

/// Runs one pipeline from a reader to a writer
///
/// A runner is single-use: once it reaches a terminal state, further calls
/// to [`run`](Self::run) are rejected.
///
/// # Example
///
/// ```rust,no_run
/// use conduit::adapters::memory::InMemoryStore;
/// use conduit::adapters::synthetic::SyntheticSource;
/// use conduit::core::generator::RecordGenerator;
/// use conduit::config::PipelineConfig;
/// use conduit::core::pipeline::PipelineRunner;
/// use conduit::core::transform::PassthroughProcessor;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut runner = PipelineRunner::new(
///     Arc::new(SyntheticSource::new(10_000, RecordGenerator::new(42))),
///     Arc::new(InMemoryStore::new("processed_records")),
///     Arc::new(PassthroughProcessor),
///     PipelineConfig::default(),
/// );
/// let report = runner.run().await?;
/// println!("processed {}", report.total_processed);
/// # Ok(())
/// # }
/// ```
pub struct PipelineRunner {
    run_id: Uuid,
    reader: Arc<dyn RecordReader>,
    writer: Arc<dyn RecordWriter>,
    processor: Arc<dyn RecordProcessor>,
    config: PipelineConfig,
    filter: RecordFilter,
    shutdown: Option<watch::Receiver<bool>>,
    progress: ProgressCallback,
    monitor_config: MonitorConfig,
    dry_run: bool,
    state: PipelineState,
    report: Option<PipelineReport>,
}

impl PipelineRunner {
    /// Create an idle runner
    pub fn new(
        reader: Arc<dyn RecordReader>,
        writer: Arc<dyn RecordWriter>,
        processor: Arc<dyn RecordProcessor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            reader,
            writer,
            processor,
            config,
            filter: RecordFilter::all(),
            shutdown: None,
            progress: logging_callback(),
            monitor_config: MonitorConfig::default(),
            dry_run: false,
            state: PipelineState::Idle,
            report: None,
        }
    }

    /// Only read records matching `filter`
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Stop pulling from the source once `shutdown` becomes true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Replace the default logging progress callback
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = callback;
        self
    }

    /// Configure (or disable) the performance monitor
    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    /// Count batches as written without touching the writer
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Id stamped on logs and on the report
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The final report, once the run has reached a terminal state
    pub fn report(&self) -> Option<&PipelineReport> {
        self.report.as_ref()
    }

    /// Run the pipeline to completion
    ///
    /// # Errors
    ///
    /// Returns [`PipelineFailure`] with a partial report when any stage
    /// fails, when the configuration is invalid, or when the runner has
    /// already been used.
    pub async fn run(&mut self) -> Result<PipelineReport, PipelineFailure> {
        if self.state != PipelineState::Idle {
            let report = self
                .report
                .clone()
                .unwrap_or_else(|| PipelineReport::new(self.run_id, PipelineStatus::Failed));
            return Err(PipelineFailure {
                error: ConduitError::Pipeline(format!(
                    "run {} has already been started",
                    self.run_id
                )),
                report,
            });
        }
        self.state = PipelineState::Running;
        let started_at = Instant::now();

        if let Err(message) = self.config.validate() {
            let error = ConduitError::Configuration(message);
            let report = self.finalize(
                PipelineStatus::Failed,
                RunTotals::default(),
                started_at.elapsed(),
                None,
            );
            return Err(PipelineFailure { error, report });
        }

        let mut monitor = PerformanceMonitor::new(self.monitor_config.clone());
        if self.monitor_config.enabled {
            monitor.start();
        }

        log_pipeline_start!(
            self.run_id,
            self.reader.describe(),
            self.config.page_size,
            self.config.processing_concurrency,
            self.config.insert_batch_size
        );

        match self.reader.count(&self.filter).await {
            Ok(available) => {
                let expected = self
                    .config
                    .limit
                    .map_or(available, |limit| limit.min(available));
                tracing::info!(available, expected, "Source records counted");
            }
            Err(e) => tracing::warn!(error = %e, "Could not count source records"),
        }

        let (totals, outcome) = self.execute().await;

        let monitor_report = monitor.stop().await;
        let (status, error) = match outcome {
            Ok(false) => (PipelineStatus::Completed, None),
            Ok(true) => (PipelineStatus::Cancelled, None),
            Err(e) => (PipelineStatus::Failed, Some(e)),
        };
        let report = self.finalize(status, totals, started_at.elapsed(), Some(&monitor_report));

        match error {
            None => Ok(report),
            Some(error) => {
                tracing::error!(
                    run_id = %self.run_id,
                    kind = error.kind(),
                    error = %error,
                    processed = report.total_processed,
                    "Pipeline failed"
                );
                Err(PipelineFailure { error, report })
            }
        }
    }

    /// Spawn the stages and drive the sink; returns whether the run was
    /// cancelled, or the first fatal error
    async fn execute(&self) -> (RunTotals, Result<bool, ConduitError>) {
        let config = &self.config;

        let (source_tx, source_rx) = mpsc::channel(config.processing_concurrency);
        let (processed_tx, processed_rx) = mpsc::channel(config.insert_batch_size);
        let (batch_tx, mut batch_rx) = mpsc::channel(1);

        let cursor = source::open(
            Arc::clone(&self.reader),
            self.filter.clone(),
            CursorOptions {
                limit: config.limit,
                page_size: config.page_size,
            },
        );
        let source_task = tokio::spawn(run_source(cursor, source_tx, self.shutdown.clone()));

        let stage = ProcessingStage::new(
            Arc::clone(&self.processor),
            config.processing_concurrency,
            config.processing_timeout(),
        );
        let processing_task = tokio::spawn(stage.run(source_rx, processed_tx));

        let tracker = Arc::new(ProgressTracker::new(
            config.progress_report_interval(),
            config.progress_report_every_items,
            Arc::clone(&self.progress),
        ));
        let ticker_task = tokio::spawn(run_progress_ticker(Arc::clone(&tracker)));
        let accumulator_task = tokio::spawn(run_accumulator(
            BatchAccumulator::new(config.insert_batch_size),
            ProgressStream::new(ReceiverStream::new(processed_rx), Arc::clone(&tracker)),
            batch_tx,
            config.flush_timeout(),
        ));

        let mut sink = BatchSink::new(Arc::clone(&self.writer), config.sink_log_every_records)
            .dry_run(self.dry_run);
        let mut failure = None;

        while let Some(item) = batch_rx.recv().await {
            let written = match item {
                Ok(batch) => sink.write(batch).await.map_err(ConduitError::from),
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                failure = Some(e);
                break;
            }
        }
        drop(batch_rx);

        if failure.is_some() {
            source_task.abort();
            processing_task.abort();
            accumulator_task.abort();
        }

        let mut cancelled = false;
        match source_task.await {
            Ok(summary) => {
                cancelled = summary.cancelled;
                tracing::debug!(state = ?summary.state, yielded = summary.yielded, "Source finished");
            }
            Err(e) => note_join_error("source", e, &mut failure),
        }
        if let Err(e) = processing_task.await {
            note_join_error("processing", e, &mut failure);
        }
        match accumulator_task.await {
            Ok(summary) => tracing::debug!(
                batches = summary.batches,
                idle_flushes = summary.idle_flushes,
                "Accumulator finished"
            ),
            Err(e) => note_join_error("accumulator", e, &mut failure),
        }

        // An aborted accumulator never reaches the end of its stream
        tracker.finish();
        ticker_task.abort();

        let totals = RunTotals::from_sink(&sink);
        match failure {
            Some(e) => (totals, Err(e)),
            None => (totals, Ok(cancelled)),
        }
    }

    /// Move to a terminal state and build the report
    ///
    /// Only the first call has any effect; later calls return the cached
    /// report.
    fn finalize(
        &mut self,
        status: PipelineStatus,
        totals: RunTotals,
        duration: Duration,
        monitor: Option<&MonitorReport>,
    ) -> PipelineReport {
        if let (true, Some(report)) = (self.state.is_terminal(), &self.report) {
            return report.clone();
        }

        let mut report = PipelineReport::new(self.run_id, status);
        report.total_processed = totals.processed;
        report.total_inserted = totals.inserted;
        report.batches_written = totals.batches;
        report.duplicate_batches = totals.duplicate_batches;
        let mut report = report.with_duration(duration);
        if let Some(monitor) = monitor {
            report = report.with_monitor(monitor);
        }

        self.state = status.into();
        log_pipeline_complete!(self.run_id, status, report.total_processed, duration);
        report.log_summary();

        self.report = Some(report.clone());
        report
    }
}

/// A stage task that ended abnormally is a fatal error unless the run has
/// already failed (then it was aborted on purpose)
fn note_join_error(stage: &str, error: tokio::task::JoinError, failure: &mut Option<ConduitError>) {
    if failure.is_some() {
        return;
    }
    tracing::error!(stage, error = %error, "Pipeline stage ended abnormally");
    *failure = Some(ConduitError::Pipeline(format!("{stage} stage ended abnormally: {error}")));
}

/// Run a pipeline with default observers
///
/// Shorthand for [`PipelineRunner::new`] followed by [`PipelineRunner::run`].
pub async fn run_pipeline(
    reader: Arc<dyn RecordReader>,
    writer: Arc<dyn RecordWriter>,
    processor: Arc<dyn RecordProcessor>,
    config: PipelineConfig,
) -> Result<PipelineReport, PipelineFailure> {
    PipelineRunner::new(reader, writer, processor, config)
        .run()
        .await
}
