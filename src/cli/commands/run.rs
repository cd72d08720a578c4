//! Run command implementation
//!
//! This module implements the `run` command, which streams records from the
//! configured source through the processing function into the sink.

use crate::adapters::factory::{create_stores, StoreHandles};
use crate::adapters::memory::InMemoryStore;
use crate::adapters::synthetic::SyntheticSource;
use crate::cli::commands::build_filter;
use crate::cli::exit_code;
use crate::config::{load_config, ConduitConfig};
use crate::core::generator::RecordGenerator;
use crate::core::pipeline::{PipelineReport, PipelineRunner, PipelineStatus};
use crate::core::transform;
use crate::domain::{Category, ConduitError, StoreError};
use clap::{Args, ValueEnum};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// How the final report is printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Table,
    /// The report as pretty-printed JSON
    Json,
}

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Stop after this many records
    #[arg(long)]
    pub limit: Option<u64>,

    /// Override the insert batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override the processing concurrency
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Read N generated records instead of the configured store; the sink
    /// is kept in memory
    #[arg(long, value_name = "N")]
    pub synthetic: Option<u64>,

    /// Count batches as written without writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Only process records of this category (A, B, C or D)
    #[arg(long)]
    pub category: Option<Category>,

    /// Only process records with at least this value
    #[arg(long)]
    pub min_value: Option<f64>,

    /// Skip records already marked processed
    #[arg(long)]
    pub unprocessed_only: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match self.load(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(exit_code::CONFIGURATION);
        }

        if config.application.dry_run {
            tracing::info!("Dry run mode enabled - no data will be written");
            println!("🔍 DRY RUN MODE - No data will be written to the sink");
            println!();
        }

        let stores = match self.stores(&config).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create stores");
                eprintln!("Failed to initialize stores: {e}");
                return Ok(exit_code::CONNECTION);
            }
        };

        let processor = transform::from_config(&config.processing);
        tracing::info!(
            processor = processor.name(),
            source = %stores.source.describe(),
            sink = %stores.sink.describe(),
            "Pipeline wired"
        );

        let mut runner = PipelineRunner::new(
            stores.source,
            stores.sink,
            processor,
            config.pipeline.clone(),
        )
        .with_filter(build_filter(
            self.category,
            self.min_value,
            self.unprocessed_only,
        ))
        .with_shutdown(shutdown_signal)
        .with_monitor_config(config.monitor.clone())
        .dry_run(config.application.dry_run);

        if self.output == OutputFormat::Table {
            println!("🚀 Starting pipeline...");
            println!();
        }

        match runner.run().await {
            Ok(report) => {
                self.print_report(&report)?;
                Ok(exit_code_for(&report))
            }
            Err(failure) => {
                self.print_report(&failure.report)?;
                eprintln!("Pipeline failed: {}", failure.error);
                Ok(exit_code_for_error(&failure.error))
            }
        }
    }

    fn load(&self, config_path: &str) -> crate::domain::Result<ConduitConfig> {
        // A synthetic run needs nothing from the file
        if self.synthetic.is_some() && !Path::new(config_path).exists() {
            tracing::info!(config_path, "No configuration file, using defaults for synthetic run");
            return Ok(ConduitConfig::default());
        }
        load_config(config_path)
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut ConduitConfig) {
        if let Some(limit) = self.limit {
            tracing::info!(limit, "Overriding limit from CLI");
            config.pipeline.limit = Some(limit);
        }
        if let Some(batch_size) = self.batch_size {
            tracing::info!(batch_size, "Overriding insert batch size from CLI");
            config.pipeline.insert_batch_size = batch_size;
        }
        if let Some(concurrency) = self.concurrency {
            tracing::info!(concurrency, "Overriding processing concurrency from CLI");
            config.pipeline.processing_concurrency = concurrency;
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
    }

    async fn stores(&self, config: &ConduitConfig) -> crate::domain::Result<StoreHandles> {
        match self.synthetic {
            Some(total) => {
                let source = Arc::new(SyntheticSource::new(
                    total,
                    RecordGenerator::new(config.store.memory.seed),
                ));
                let sink = Arc::new(InMemoryStore::new("processed_records"));
                Ok(StoreHandles {
                    source,
                    sink: sink.clone(),
                    sink_reader: sink,
                    seed_target: None,
                })
            }
            None => create_stores(&config.store).await,
        }
    }

    fn print_report(&self, report: &PipelineReport) -> anyhow::Result<()> {
        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            OutputFormat::Table => print_table(report),
        }
        Ok(())
    }
}

fn print_table(report: &PipelineReport) {
    println!("📊 Pipeline Report:");
    println!("  Run ID: {}", report.run_id);
    println!("  Status: {}", report.status);
    println!("  Total Processed: {}", report.total_processed);
    println!("  Total Inserted: {}", report.total_inserted);
    println!("  Batches Written: {}", report.batches_written);
    println!("  Duplicate Batches: {}", report.duplicate_batches);
    println!("  Duration: {:.2}s", report.total_time_ms as f64 / 1000.0);
    println!("  Throughput: {:.2} records/s", report.records_per_second);
    println!(
        "  Memory (MB): start {:.2}, end {:.2}, min {:.2}, peak {:.2}, avg {:.2}",
        report.start_memory_mb,
        report.end_memory_mb,
        report.min_memory_mb,
        report.peak_memory_mb,
        report.average_memory_mb
    );
    println!(
        "  Scheduler Lag (ms): avg {:.2}, max {:.2}",
        report.avg_event_loop_lag_ms, report.max_event_loop_lag_ms
    );
    println!();

    match report.status {
        PipelineStatus::Completed if report.duplicate_batches == 0 => {
            println!("✅ Pipeline completed successfully!");
        }
        PipelineStatus::Completed => {
            println!("⚠️  Pipeline completed with duplicate-key batches");
        }
        PipelineStatus::Cancelled => {
            println!("⚠️  Pipeline stopped by shutdown signal after draining buffered work.");
        }
        PipelineStatus::Failed => println!("❌ Pipeline failed"),
    }
}

/// Exit code for a run that produced a report
pub fn exit_code_for(report: &PipelineReport) -> i32 {
    match report.status {
        PipelineStatus::Completed if report.duplicate_batches == 0 => exit_code::SUCCESS,
        PipelineStatus::Completed => exit_code::COMPLETED_WITH_DUPLICATES,
        PipelineStatus::Cancelled => exit_code::CANCELLED,
        PipelineStatus::Failed => exit_code::FATAL,
    }
}

/// Exit code for a failed run
pub fn exit_code_for_error(error: &ConduitError) -> i32 {
    match error {
        ConduitError::Configuration(_) => exit_code::CONFIGURATION,
        ConduitError::Store(StoreError::Connection(_)) => exit_code::CONNECTION,
        ConduitError::Source(e) if matches!(e.cause, StoreError::Connection(_)) => {
            exit_code::CONNECTION
        }
        _ => exit_code::FATAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProcessingError, RecordId, SourceReadError};
    use test_case::test_case;
    use uuid::Uuid;

    #[test]
    fn test_run_args_defaults() {
        let args = RunArgs::default();

        assert!(args.limit.is_none());
        assert!(!args.dry_run);
        assert_eq!(args.output, OutputFormat::Table);
    }

    #[test]
    fn test_apply_overrides() {
        let args = RunArgs {
            limit: Some(10),
            batch_size: Some(3),
            concurrency: Some(2),
            dry_run: true,
            ..Default::default()
        };
        let mut config = ConduitConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.pipeline.limit, Some(10));
        assert_eq!(config.pipeline.insert_batch_size, 3);
        assert_eq!(config.pipeline.processing_concurrency, 2);
        assert!(config.application.dry_run);
    }

    #[test_case(PipelineStatus::Completed, 0, 0 ; "clean")]
    #[test_case(PipelineStatus::Completed, 2, 1 ; "duplicates")]
    #[test_case(PipelineStatus::Cancelled, 0, 130 ; "cancelled")]
    #[test_case(PipelineStatus::Failed, 0, 5 ; "failed")]
    fn test_exit_code_for(status: PipelineStatus, duplicates: u64, expected: i32) {
        let mut report = PipelineReport::new(Uuid::new_v4(), status);
        report.duplicate_batches = duplicates;
        assert_eq!(exit_code_for(&report), expected);
    }

    #[test]
    fn test_exit_code_for_error() {
        let config = ConduitError::Configuration("bad".to_string());
        assert_eq!(exit_code_for_error(&config), 2);

        let connection = ConduitError::Source(SourceReadError {
            after: 0,
            cause: StoreError::Connection("refused".to_string()),
        });
        assert_eq!(exit_code_for_error(&connection), 4);

        let timeout = ConduitError::Processing(ProcessingError::Timeout {
            record_id: RecordId::new(1).unwrap(),
            timeout_ms: 5,
        });
        assert_eq!(exit_code_for_error(&timeout), 5);
    }

    #[tokio::test]
    async fn test_synthetic_run_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let args = RunArgs {
            synthetic: Some(25),
            batch_size: Some(10),
            output: OutputFormat::Json,
            ..Default::default()
        };
        let (_tx, rx) = watch::channel(false);

        let code = args
            .execute(missing.to_str().unwrap(), rx)
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let (_tx, rx) = watch::channel(false);

        let code = RunArgs::default()
            .execute(missing.to_str().unwrap(), rx)
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
