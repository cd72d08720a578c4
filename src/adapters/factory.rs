//! Store factory
//!
//! Builds the source and sink handles for the configured backend.

use crate::adapters::memory::InMemoryStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgresRecordStore};
use crate::adapters::store::{RecordReader, RecordWriter};
use crate::adapters::synthetic::SyntheticSource;
use crate::config::schema::{StoreBackend, StoreConfig};
use crate::core::generator::RecordGenerator;
use crate::domain::{ConduitError, Result};
use std::sync::Arc;

/// Handles to both ends of a pipeline
#[derive(Clone)]
pub struct StoreHandles {
    /// Where the pipeline reads from
    pub source: Arc<dyn RecordReader>,
    /// Where the pipeline writes to
    pub sink: Arc<dyn RecordWriter>,
    /// Read access to the sink, for counting
    pub sink_reader: Arc<dyn RecordReader>,
    /// Writable source, if the backend supports seeding
    pub seed_target: Option<Arc<dyn RecordWriter>>,
}

/// Create store handles based on the configuration
///
/// For PostgreSQL the tables are created if missing. Both tables share one
/// connection pool.
///
/// # Errors
///
/// Returns an error if the client cannot be created or the tables cannot
/// be ensured.
pub async fn create_stores(config: &StoreConfig) -> Result<StoreHandles> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!(
                seed_records = config.memory.seed_records,
                seed = config.memory.seed,
                "Creating in-memory stores"
            );
            let source = SyntheticSource::new(
                config.memory.seed_records,
                RecordGenerator::new(config.memory.seed),
            );
            let sink = Arc::new(InMemoryStore::new("processed_records"));

            Ok(StoreHandles {
                source: Arc::new(source),
                sink: sink.clone(),
                sink_reader: sink,
                seed_target: None,
            })
        }
        StoreBackend::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                ConduitError::Configuration(
                    "store.postgresql configuration is required when store.backend = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL stores");
            let client = Arc::new(PostgreSQLClient::new(pg_config.clone())?);
            client.test_connection().await?;

            let source = Arc::new(PostgresRecordStore::new(
                client.clone(),
                pg_config.source_table.clone(),
            ));
            let sink = Arc::new(PostgresRecordStore::new(
                client,
                pg_config.sink_table.clone(),
            ));
            source.ensure_table().await?;
            sink.ensure_table().await?;

            Ok(StoreHandles {
                source: source.clone(),
                sink: sink.clone(),
                sink_reader: sink,
                seed_target: Some(source),
            })
        }
    }
}
