//! Batched sink
//!
//! Persists each batch with one bulk insert. Duplicate-key conflicts are
//! absorbed: the batch counts as 0 inserted and the run continues. Any other
//! store error is fatal.

use crate::adapters::store::RecordWriter;
use crate::domain::batch::Batch;
use crate::domain::errors::{SinkWriteError, StoreError};
use crate::log_batch_written;
use std::sync::Arc;

/// Result of writing one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOutcome {
    pub batch_sequence: u64,
    pub batch_size: usize,
    pub inserted_count: u64,
    /// The batch hit a duplicate key and was counted as 0
    pub duplicate: bool,
}

/// Writes batches and keeps run totals
pub struct BatchSink {
    writer: Arc<dyn RecordWriter>,
    dry_run: bool,
    log_every: u64,
    records_received: u64,
    total_inserted: u64,
    batches_written: u64,
    duplicate_batches: u64,
}

impl BatchSink {
    /// Create a sink that logs its running total every `log_every` records
    pub fn new(writer: Arc<dyn RecordWriter>, log_every: u64) -> Self {
        Self {
            writer,
            dry_run: false,
            log_every: log_every.max(1),
            records_received: 0,
            total_inserted: 0,
            batches_written: 0,
            duplicate_batches: 0,
        }
    }

    /// Count batches as inserted without calling the writer
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Persist one batch
    ///
    /// The batch is consumed; nothing of it is retained after the call.
    ///
    /// # Errors
    ///
    /// Returns [`SinkWriteError`] for any store failure other than a
    /// duplicate key.
    pub async fn write(&mut self, batch: Batch) -> Result<SinkOutcome, SinkWriteError> {
        let batch_sequence = batch.sequence();
        let batch_size = batch.len();
        self.records_received += batch_size as u64;

        let inserted = if self.dry_run {
            tracing::debug!(batch = batch_sequence, size = batch_size, "Dry run: batch not written");
            batch_size as u64
        } else {
            match self.writer.insert_many(batch.records()).await {
                Ok(outcome) => outcome.inserted_count,
                Err(StoreError::DuplicateKey {
                    message,
                    inserted_before_conflict,
                }) => {
                    self.batches_written += 1;
                    self.duplicate_batches += 1;
                    tracing::warn!(
                        batch = batch_sequence,
                        size = batch_size,
                        inserted_before_conflict = ?inserted_before_conflict,
                        reason = %message,
                        "Duplicate key in batch, counting 0 inserted"
                    );
                    return Ok(SinkOutcome {
                        batch_sequence,
                        batch_size,
                        inserted_count: 0,
                        duplicate: true,
                    });
                }
                Err(cause) => {
                    tracing::error!(batch = batch_sequence, size = batch_size, error = %cause, "Batch write failed");
                    return Err(SinkWriteError {
                        batch_sequence,
                        batch_size,
                        cause,
                    });
                }
            }
        };

        let before = self.total_inserted;
        self.total_inserted += inserted;
        self.batches_written += 1;

        log_batch_written!(batch_sequence, batch_size, inserted, self.total_inserted);
        if before / self.log_every != self.total_inserted / self.log_every {
            tracing::info!(
                total_inserted = self.total_inserted,
                batches = self.batches_written,
                "Sink progress"
            );
        }

        Ok(SinkOutcome {
            batch_sequence,
            batch_size,
            inserted_count: inserted,
            duplicate: false,
        })
    }

    /// Sum of all batch sizes received
    pub fn records_received(&self) -> u64 {
        self.records_received
    }

    /// Records the store accepted
    pub fn total_inserted(&self) -> u64 {
        self.total_inserted
    }

    /// Batches acknowledged, including duplicate ones
    pub fn batches_written(&self) -> u64 {
        self.batches_written
    }

    /// Batches counted as 0 because of a duplicate key
    pub fn duplicate_batches(&self) -> u64 {
        self.duplicate_batches
    }
}
