//! Passthrough processor

use super::RecordProcessor;
use crate::domain::{Record, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Map;

/// Marks records processed without deriving anything
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

#[async_trait]
impl RecordProcessor for PassthroughProcessor {
    async fn process(&self, record: Record) -> Result<Record> {
        Ok(record.into_processed(Utc::now(), Map::new()))
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, RecordBuilder};

    #[tokio::test]
    async fn test_passthrough_keeps_metadata() {
        let record = RecordBuilder::new()
            .id(3)
            .value(12.0)
            .category(Category::D)
            .metadata("k", serde_json::json!(1))
            .build()
            .unwrap();
        let before = record.metadata.clone();

        let out = PassthroughProcessor.process(record).await.unwrap();
        assert!(out.processed);
        assert_eq!(out.metadata, before);
    }
}
