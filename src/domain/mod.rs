//! Domain models and types for Conduit.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`RecordId`])
//! - **Domain models** ([`Record`], [`Batch`], [`RecordFilter`])
//! - **Error types** ([`ConduitError`] and the per-stage errors)
//! - **Result type alias** ([`Result`])
//!
//! # Builder Pattern
//!
//! ```rust
//! use conduit::domain::{Category, RecordBuilder};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let record = RecordBuilder::new()
//!     .id(1)
//!     .value(42.0)
//!     .category(Category::A)
//!     .metadata("origin", serde_json::json!("import"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use batch::Batch;
pub use errors::{ConduitError, ProcessingError, SinkWriteError, SourceReadError, StoreError};
pub use ids::RecordId;
pub use record::{Category, Record, RecordBuilder, RecordFilter};
pub use result::Result;
