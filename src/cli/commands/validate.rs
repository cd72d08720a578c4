//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Conduit configuration file.

use crate::adapters::postgresql::client::redact_connection_string;
use crate::cli::exit_code;
use crate::config::load_config;
use crate::config::schema::StoreBackend;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as its last step
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let pipeline = &config.pipeline;
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!(
            "  Limit: {}",
            pipeline
                .limit
                .map_or_else(|| "none".to_string(), |l| l.to_string())
        );
        println!("  Page Size: {}", pipeline.page_size);
        println!("  Processing Concurrency: {}", pipeline.processing_concurrency);
        println!("  Processing Timeout: {}ms", pipeline.processing_timeout_ms);
        println!("  Insert Batch Size: {}", pipeline.insert_batch_size);
        println!("  Flush Timeout: {}ms", pipeline.flush_timeout_ms);
        println!("  Processor: {:?}", config.processing.processor);
        println!("  Monitor Enabled: {}", config.monitor.enabled);

        match config.store.backend {
            StoreBackend::Memory => {
                println!("  Store Backend: memory");
                println!("  Generated Records: {}", config.store.memory.seed_records);
            }
            StoreBackend::PostgreSQL => {
                if let Some(ref pg_config) = config.store.postgresql {
                    use secrecy::ExposeSecret;
                    println!("  Store Backend: PostgreSQL");
                    println!(
                        "  PostgreSQL Connection: {}",
                        redact_connection_string(pg_config.connection_string.expose_secret().as_str())
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                    println!("  Source Table: {}", pg_config.source_table);
                    println!("  Sink Table: {}", pg_config.sink_table);
                }
            }
        }
        println!();

        Ok(exit_code::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\ninsert_batch_size = 100").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nprocessing_concurrency = 0").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
