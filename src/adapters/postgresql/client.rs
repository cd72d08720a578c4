//! PostgreSQL client implementation
//!
//! Owns the connection pool and the per-connection statement timeout.

use crate::adapters::store::StoreResult;
use crate::config::schema::PostgreSQLConfig;
use crate::domain::{ConduitError, Result, StoreError};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

/// PostgreSQL client for Conduit
///
/// Provides pooled connections with the configured statement timeout applied.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// The pool connects lazily, so this does not touch the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed or the
    /// pool cannot be built.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_str()
            .parse()
            .map_err(|e| {
                ConduitError::Configuration(format!("Invalid PostgreSQL connection string: {}", e))
            })?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .build()
            .map_err(|e| {
                ConduitError::Store(StoreError::Connection(format!(
                    "Failed to create connection pool: {}",
                    e
                )))
            })?;

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if no connection can be made.
    pub async fn test_connection(&self) -> StoreResult<()> {
        let client = self.connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::Connection(format!("Connection test failed: {}", e)))?;

        tracing::info!(target = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Get a connection from the pool with the statement timeout applied
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if a connection cannot be obtained.
    pub async fn connection(&self) -> StoreResult<Object> {
        let client = self.pool.get().await.map_err(|e| {
            StoreError::Connection(format!("Failed to get connection from pool: {}", e))
        })?;

        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.config.statement_timeout_seconds * 1000
        );
        client.batch_execute(&timeout_query).await.map_err(|e| {
            StoreError::Connection(format!("Failed to set statement timeout: {}", e))
        })?;

        Ok(client)
    }

    /// Execute a query and return rows
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the query fails.
    pub async fn query(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> StoreResult<Vec<Row>> {
        let client = self.connection().await?;
        client
            .query(query, params)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Run one or more statements without parameters
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if any statement fails.
    pub async fn batch_execute(&self, statements: &str) -> StoreResult<()> {
        let client = self.connection().await?;
        client
            .batch_execute(statements)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))
    }

    /// Source table name
    pub fn source_table(&self) -> &str {
        &self.config.source_table
    }

    /// Sink table name
    pub fn sink_table(&self) -> &str {
        &self.config.sink_table
    }

    /// Get the connection string (without password)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_str())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

pub fn redact_connection_string(conn: &str) -> String {
    match conn.rsplit_once('@') {
        Some((_, host)) => format!("postgresql://***@{}", host),
        None => conn.to_string(),
    }
}
