//! PostgreSQL store integration
//!
//! Records live as JSONB documents keyed by a BIGINT primary key.

pub mod client;
pub mod store;

pub use client::PostgreSQLClient;
pub use store::PostgresRecordStore;
