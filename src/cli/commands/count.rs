//! Count command implementation

use crate::adapters::factory::create_stores;
use crate::cli::commands::build_filter;
use crate::cli::exit_code;
use crate::config::load_config;
use crate::domain::Category;
use clap::Args;

/// Arguments for the count command
#[derive(Args, Debug, Default)]
pub struct CountArgs {
    /// Only count records of this category (A, B, C or D)
    #[arg(long)]
    pub category: Option<Category>,

    /// Only count records with at least this value
    #[arg(long)]
    pub min_value: Option<f64>,

    /// Only count records not yet processed
    #[arg(long)]
    pub unprocessed_only: bool,

    /// Count the sink instead of the source
    #[arg(long)]
    pub sink: bool,
}

impl CountArgs {
    /// Execute the count command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let stores = match create_stores(&config.store).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to initialize stores: {e}");
                return Ok(exit_code::CONNECTION);
            }
        };

        let reader = if self.sink {
            stores.sink_reader
        } else {
            stores.source
        };
        let filter = build_filter(self.category, self.min_value, self.unprocessed_only);

        match reader.count(&filter).await {
            Ok(count) => {
                tracing::info!(store = %reader.describe(), count, "Counted records");
                println!("{}: {count}", reader.describe());
                Ok(exit_code::SUCCESS)
            }
            Err(e) => {
                eprintln!("Count failed: {e}");
                Ok(exit_code::FATAL)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_count_memory_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[store]\nbackend = \"memory\"\n\n[store.memory]\nseed_records = 40\n\n[logging]\nlocal_enabled = false"
        )
        .unwrap();

        let code = CountArgs::default()
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_count_missing_config() {
        let code = CountArgs::default()
            .execute("/nonexistent/conduit.toml")
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
