//! Core pipeline logic for Conduit.
//!
//! # Modules
//!
//! - [`pipeline`] - Source, processing, batching, sink and the runner that wires them
//! - [`transform`] - Record processors applied by the processing stage
//! - [`monitor`] - Progress and performance observers
//! - [`generator`] - Deterministic record generation for seeding and synthetic runs
//!
//! # Example
//!
//! ```rust,no_run
//! use conduit::adapters::memory::InMemoryStore;
//! use conduit::adapters::synthetic::SyntheticSource;
//! use conduit::config::PipelineConfig;
//! use conduit::core::generator::RecordGenerator;
//! use conduit::core::pipeline::run_pipeline;
//! use conduit::core::transform::EnrichProcessor;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let report = run_pipeline(
//!     Arc::new(SyntheticSource::new(100_000, RecordGenerator::new(42))),
//!     Arc::new(InMemoryStore::new("processed_records")),
//!     Arc::new(EnrichProcessor::new(Duration::ZERO)),
//!     PipelineConfig::default(),
//! )
//! .await?;
//!
//! println!("Processed: {}", report.total_processed);
//! println!("Peak memory: {} MB", report.peak_memory_mb);
//! # Ok(())
//! # }
//! ```

pub mod generator;
pub mod monitor;
pub mod pipeline;
pub mod transform;
