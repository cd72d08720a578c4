//! Store integrations for Conduit.
//!
//! This module provides the adapters the pipeline reads from and writes to:
//!
//! - [`store`] - Reader/writer traits the pipeline depends on
//! - [`memory`] - In-process ordered document store
//! - [`synthetic`] - Lazily generated source of any size
//! - [`postgresql`] - JSONB tables in PostgreSQL
//! - [`factory`] - Builds handles for the configured backend
//!
//! # Design Pattern
//!
//! Adapters isolate driver types behind the traits in [`store`], so the
//! pipeline can be tested with in-memory implementations.
//!
//! ```rust
//! use conduit::adapters::memory::InMemoryStore;
//! use conduit::adapters::store::RecordWriter;
//! use conduit::domain::{Category, RecordBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new("demo");
//! let record = RecordBuilder::new().id(1).value(5.0).category(Category::A).build()?;
//! let outcome = store.insert_many(&[record]).await?;
//! assert_eq!(outcome.inserted_count, 1);
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod memory;
pub mod postgresql;
pub mod store;
pub mod synthetic;

pub use factory::{create_stores, StoreHandles};
pub use store::{InsertOutcome, RecordReader, RecordWriter, StoreResult};
