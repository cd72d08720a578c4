//! Enrichment processor
//!
//! Marks the record processed and derives three metadata fields:
//! `valueBand`, `normalizedValue` and `processedBy`.

use super::RecordProcessor;
use crate::domain::{ConduitError, Record, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map};
use std::time::Duration;

/// Upper bound (exclusive) of the `low` band
const LOW_BAND_LIMIT: f64 = 100.0;
/// Upper bound (exclusive) of the `medium` band
const MEDIUM_BAND_LIMIT: f64 = 1000.0;

const PROCESSED_BY: &str = "conduit-enrich";

/// Processor that derives value metadata
#[derive(Debug, Clone, Default)]
pub struct EnrichProcessor {
    simulated_latency: Duration,
}

impl EnrichProcessor {
    /// Create an enrich processor; a non-zero latency sleeps once per record
    pub fn new(simulated_latency: Duration) -> Self {
        Self { simulated_latency }
    }
}

/// Band label for a value
pub fn value_band(value: f64) -> &'static str {
    if value < LOW_BAND_LIMIT {
        "low"
    } else if value < MEDIUM_BAND_LIMIT {
        "medium"
    } else {
        "high"
    }
}

/// Value divided by 1000, rounded to 4 decimals
pub fn normalized_value(value: f64) -> f64 {
    (value / 1000.0 * 10_000.0).round() / 10_000.0
}

#[async_trait]
impl RecordProcessor for EnrichProcessor {
    async fn process(&self, record: Record) -> Result<Record> {
        record.validate().map_err(ConduitError::Validation)?;

        if !self.simulated_latency.is_zero() {
            tokio::time::sleep(self.simulated_latency).await;
        }

        let mut derived = Map::new();
        derived.insert("valueBand".to_string(), json!(value_band(record.value)));
        derived.insert(
            "normalizedValue".to_string(),
            json!(normalized_value(record.value)),
        );
        derived.insert("processedBy".to_string(), json!(PROCESSED_BY));

        Ok(record.into_processed(Utc::now(), derived))
    }

    fn name(&self) -> &str {
        "enrich"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, RecordBuilder};
    use test_case::test_case;

    #[test_case(0.0, "low")]
    #[test_case(99.99, "low")]
    #[test_case(100.0, "medium")]
    #[test_case(999.99, "medium")]
    #[test_case(1000.0, "high")]
    #[test_case(1999.5, "high")]
    fn test_value_band(value: f64, expected: &str) {
        assert_eq!(value_band(value), expected);
    }

    #[test_case(1234.5678, 1.2346)]
    #[test_case(0.0, 0.0)]
    #[test_case(50.0, 0.05)]
    fn test_normalized_value(value: f64, expected: f64) {
        assert!((normalized_value(value) - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_enrich_sets_metadata() {
        let record = RecordBuilder::new()
            .id(7)
            .value(450.0)
            .category(Category::B)
            .metadata("origin", json!("test"))
            .build()
            .unwrap();

        let out = EnrichProcessor::default().process(record).await.unwrap();

        assert!(out.processed);
        assert!(out.processed_at.is_some());
        assert_eq!(out.metadata["valueBand"], json!("medium"));
        assert_eq!(out.metadata["normalizedValue"], json!(0.45));
        assert_eq!(out.metadata["processedBy"], json!(PROCESSED_BY));
        assert_eq!(out.metadata["origin"], json!("test"));
        assert_eq!(out.id.get(), 7);
    }

    #[tokio::test]
    async fn test_enrich_rejects_invalid_value() {
        let mut record = RecordBuilder::new()
            .id(1)
            .value(1.0)
            .category(Category::A)
            .build()
            .unwrap();
        record.value = f64::NAN;

        let err = EnrichProcessor::default().process(record).await.unwrap_err();
        assert!(matches!(err, ConduitError::Validation(_)));
    }
}
