//! Configuration management for Conduit.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Conduit uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CONDUIT_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use conduit::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("conduit.toml")?;
//!
//! println!("Page size: {}", config.pipeline.page_size);
//! println!("Batch size: {}", config.pipeline.insert_batch_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry run
//! - [`PipelineConfig`] - Page, concurrency, batch sizes and timeouts
//! - [`ProcessingConfig`] - Built-in processor selection
//! - [`MonitorConfig`] - Performance sampling
//! - [`StoreConfig`] - Memory or PostgreSQL backend
//! - [`LoggingConfig`] - Local JSON log files
//!
//! # Example Configuration
//!
//! ```toml
//! [pipeline]
//! page_size = 1000
//! processing_concurrency = 4
//! insert_batch_size = 500
//!
//! [store]
//! backend = "postgresql"
//!
//! [store.postgresql]
//! connection_string = "${CONDUIT_PG_DSN}"
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, ConduitConfig, LoggingConfig, MemoryStoreConfig, MonitorConfig,
    PipelineConfig, PostgreSQLConfig, ProcessingConfig, ProcessorKind, StoreBackend, StoreConfig,
};
pub use secrecy::SecretString;
