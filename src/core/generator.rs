//! Deterministic record generator
//!
//! Produces synthetic records for seeding a store and for the synthetic
//! source. The same `(seed, id)` pair always yields the same record, so a
//! generated dataset never has to be materialized to be reproduced.

use crate::domain::ids::RecordId;
use crate::domain::record::{Category, Record};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map};

/// 2024-01-01T00:00:00Z
const BASE_TIMESTAMP_SECS: i64 = 1_704_067_200;

const TAGS: [&str; 6] = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];

/// Generates records from a seed
#[derive(Debug, Clone, Copy)]
pub struct RecordGenerator {
    seed: u64,
}

impl RecordGenerator {
    /// Create a generator with a fixed seed
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create a generator with a random seed
    pub fn random() -> Self {
        Self::new(rand::random())
    }

    /// The seed in use
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate the record with the given id
    pub fn generate(&self, id: RecordId) -> Record {
        let mut rng = StdRng::seed_from_u64(self.seed ^ id.get().wrapping_mul(0x9E37_79B9_7F4A_7C15));

        let value: f64 = (rng.gen_range(0.0..2000.0_f64) * 100.0).round() / 100.0;
        let category = Category::ALL[rng.gen_range(0..Category::ALL.len())];
        let tag_count = rng.gen_range(1..=3);
        let tags: Vec<&str> = (0..tag_count)
            .map(|_| TAGS[rng.gen_range(0..TAGS.len())])
            .collect();

        let mut metadata = Map::new();
        metadata.insert("source".to_string(), json!("generator"));
        metadata.insert("tags".to_string(), json!(tags));
        metadata.insert("shard".to_string(), json!(id.get() % 16));

        Record {
            id,
            timestamp: DateTime::<Utc>::from_timestamp(BASE_TIMESTAMP_SECS + id.get() as i64, 0)
                .unwrap_or_else(Utc::now),
            value,
            category,
            metadata,
            processed: false,
            processed_at: None,
        }
    }

    /// Generate records for an inclusive id range
    pub fn generate_range(&self, first: u64, last: u64) -> impl Iterator<Item = Record> + '_ {
        (first.max(1)..=last).filter_map(move |id| RecordId::new(id).ok().map(|id| self.generate(id)))
    }
}

impl Default for RecordGenerator {
    fn default() -> Self {
        Self::new(42)
    }
}
