//! Seed command implementation
//!
//! Writes generated records into the source table so a later `run` has
//! something to read.

use crate::adapters::factory::create_stores;
use crate::adapters::store::RecordWriter;
use crate::cli::exit_code;
use crate::config::load_config;
use crate::core::generator::RecordGenerator;
use crate::domain::{Record, StoreError};
use clap::Args;

/// Arguments for the seed command
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Number of records to generate
    #[arg(long)]
    pub count: u64,

    /// Records written per insert
    #[arg(long, default_value_t = 500)]
    pub batch_size: usize,

    /// Generator seed (defaults to store.memory.seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// First id to generate
    #[arg(long, default_value_t = 1)]
    pub start_id: u64,
}

/// Totals of a seeding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub batches: u64,
    pub inserted: u64,
    pub duplicate_batches: u64,
}

/// Generate `count` records starting at `first_id` and write them in batches
///
/// Batches that hit an existing id are skipped, so seeding twice is safe.
///
/// # Errors
///
/// Returns the first store error other than a duplicate key.
pub async fn seed_records(
    writer: &dyn RecordWriter,
    generator: &RecordGenerator,
    first_id: u64,
    count: u64,
    batch_size: usize,
) -> Result<SeedSummary, StoreError> {
    let mut summary = SeedSummary::default();
    if count == 0 {
        return Ok(summary);
    }

    let last_id = first_id.max(1).saturating_add(count - 1);
    let mut records = generator.generate_range(first_id, last_id).peekable();
    let batch_size = batch_size.max(1);

    while records.peek().is_some() {
        let batch: Vec<Record> = records.by_ref().take(batch_size).collect();
        summary.batches += 1;

        match writer.insert_many(&batch).await {
            Ok(outcome) => summary.inserted += outcome.inserted_count,
            Err(StoreError::DuplicateKey { message, .. }) => {
                summary.duplicate_batches += 1;
                tracing::warn!(batch = summary.batches, reason = %message, "Seed batch skipped");
            }
            Err(e) => return Err(e),
        }

        tracing::debug!(
            batch = summary.batches,
            inserted = summary.inserted,
            "Seed batch written"
        );
    }

    Ok(summary)
}

impl SeedArgs {
    /// Execute the seed command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(count = self.count, "Starting seed command");

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

        let Some(target) = stores.seed_target else {
            println!("❌ The memory backend generates its source on demand.");
            println!("   Set store.memory.seed_records instead, or use the postgresql backend.");
            return Ok(exit_code::CONFIGURATION);
        };

        let generator = RecordGenerator::new(self.seed.unwrap_or(config.store.memory.seed));
        println!(
            "🌱 Seeding {} records into {} (seed {})",
            self.count,
            target.describe(),
            generator.seed()
        );

        match seed_records(
            target.as_ref(),
            &generator,
            self.start_id,
            self.count,
            self.batch_size,
        )
        .await
        {
            Ok(summary) => {
                println!("  Batches: {}", summary.batches);
                println!("  Inserted: {}", summary.inserted);
                println!("  Skipped (duplicate) batches: {}", summary.duplicate_batches);
                Ok(if summary.duplicate_batches > 0 {
                    exit_code::COMPLETED_WITH_DUPLICATES
                } else {
                    exit_code::SUCCESS
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Seeding failed");
                eprintln!("Seeding failed: {e}");
                Ok(exit_code::FATAL)
            }
        }
    }
}
