//! Record transformation logic
//!
//! The processing stage applies a [`RecordProcessor`] to every record. Two
//! built-in processors are provided, and any async closure can be adapted
//! with [`processor_fn`]:
//!
//! - **Enrich**: marks the record processed and derives value metadata
//! - **Passthrough**: marks the record processed and nothing else

pub mod enrich;
pub mod passthrough;

pub use enrich::EnrichProcessor;
pub use passthrough::PassthroughProcessor;

use crate::config::schema::{ProcessingConfig, ProcessorKind};
use crate::domain::{Record, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A transformation applied to each record
///
/// Implementations must not mutate shared state beyond what they derive into
/// the returned record. Returning an error aborts the whole pipeline.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    /// Produce the processed form of `record`
    async fn process(&self, record: Record) -> Result<Record>;

    /// Name used in logs and in derived metadata
    fn name(&self) -> &str;
}

/// Processor backed by a closure, see [`processor_fn`]
pub struct FnProcessor<F> {
    name: String,
    f: F,
}

/// Adapt an async closure into a [`RecordProcessor`]
///
/// # Examples
///
/// ```
/// use conduit::core::transform::{processor_fn, RecordProcessor};
///
/// let double = processor_fn(|mut record: conduit::domain::Record| async move {
///     record.value *= 2.0;
///     Ok(record)
/// });
/// assert_eq!(double.name(), "fn");
/// ```
pub fn processor_fn<F, Fut>(f: F) -> FnProcessor<F>
where
    F: Fn(Record) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Record>> + Send + 'static,
{
    FnProcessor {
        name: "fn".to_string(),
        f,
    }
}

impl<F> FnProcessor<F> {
    /// Give the processor a name for logs
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<F, Fut> RecordProcessor for FnProcessor<F>
where
    F: Fn(Record) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Record>> + Send + 'static,
{
    async fn process(&self, record: Record) -> Result<Record> {
        (self.f)(record).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build the processor selected in configuration
pub fn from_config(config: &ProcessingConfig) -> Arc<dyn RecordProcessor> {
    match config.processor {
        ProcessorKind::Enrich => Arc::new(EnrichProcessor::new(Duration::from_millis(
            config.simulated_latency_ms,
        ))),
        ProcessorKind::Passthrough => Arc::new(PassthroughProcessor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, ConduitError, RecordBuilder};

    fn record() -> Record {
        RecordBuilder::new()
            .id(1)
            .value(250.0)
            .category(Category::C)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_processor_fn() {
        let processor = processor_fn(|mut r: Record| async move {
            r.value += 1.0;
            Ok(r)
        })
        .named("increment");

        let out = processor.process(record()).await.unwrap();
        assert_eq!(out.value, 251.0);
        assert_eq!(processor.name(), "increment");
    }

    #[tokio::test]
    async fn test_processor_fn_error() {
        let processor = processor_fn(|_r: Record| async move {
            Err(ConduitError::Other("boom".to_string()))
        });
        assert!(processor.process(record()).await.is_err());
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = ProcessingConfig::default();
        assert_eq!(from_config(&config).name(), "enrich");

        config.processor = ProcessorKind::Passthrough;
        let processor = from_config(&config);
        assert_eq!(processor.name(), "passthrough");
        let out = processor.process(record()).await.unwrap();
        assert!(out.processed);
    }
}
