// Conduit - Bounded-memory streaming pipeline
// Copyright (c) 2025 Conduit Contributors
// Licensed under the MIT License

//! # Conduit - bounded-memory streaming pipeline
//!
//! Conduit moves documents from one store to another through a
//! backpressure-aware pipeline whose memory use does not grow with the size
//! of the dataset.
//!
//! ## Overview
//!
//! ```text
//! Source ──▶ ProcessingStage ──▶ BatchAccumulator ──▶ Sink
//! ```
//!
//! - **Source** pages through the backing store with a keyset cursor
//! - **ProcessingStage** runs a [`RecordProcessor`](core::transform::RecordProcessor)
//!   with bounded concurrency, a per-record timeout and order preserved
//! - **BatchAccumulator** groups records into bounded batches, flushing
//!   partial ones when input goes idle
//! - **Sink** bulk-inserts each batch; duplicate keys count as zero inserted
//!
//! [`ProgressTracker`](core::monitor::ProgressTracker) and
//! [`PerformanceMonitor`](core::monitor::PerformanceMonitor) observe the run,
//! and every run ends with a [`PipelineReport`](core::pipeline::PipelineReport).
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline stages, processors and observers
//! - [`adapters`] - Store implementations (in-memory, synthetic, PostgreSQL)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conduit::adapters::create_stores;
//! use conduit::config::load_config;
//! use conduit::core::pipeline::PipelineRunner;
//! use conduit::core::transform;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("conduit.toml")?;
//!     let stores = create_stores(&config.store).await?;
//!
//!     let mut runner = PipelineRunner::new(
//!         stores.source,
//!         stores.sink,
//!         transform::from_config(&config.processing),
//!         config.pipeline.clone(),
//!     );
//!     let report = runner.run().await?;
//!
//!     println!("Processed {} records", report.total_processed);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::ConduitError`]; a failed run returns a
//! [`PipelineFailure`](core::pipeline::PipelineFailure) that carries the
//! error and a partial report. `anyhow` is only used at the CLI boundary.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
