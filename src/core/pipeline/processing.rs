//! Concurrency-limited processing stage
//!
//! Records are transformed by a [`RecordProcessor`] with up to
//! `concurrency` futures in flight, each under its own timeout. Completions
//! land in a [`ReorderBuffer`] and leave in input order. A new record is
//! only pulled while `in_flight + buffered < concurrency`.
//!
//! Any failure (error, timeout or panic) is sent downstream in-band and ends
//! the stage; the remaining in-flight futures are dropped.

use crate::core::transform::RecordProcessor;
use crate::domain::errors::ProcessingError;
use crate::domain::record::Record;
use crate::domain::ConduitError;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Restores input order for results that complete out of order
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next_seq: u64,
    pending: BTreeMap<u64, Record>,
}

impl ReorderBuffer {
    /// Create an empty buffer expecting sequence 0 first
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the result for sequence position `seq`
    pub fn insert(&mut self, seq: u64, record: Record) {
        debug_assert!(seq >= self.next_seq, "sequence {seq} already released");
        self.pending.insert(seq, record);
    }

    /// Returns true if the next record in order is available
    pub fn is_ready(&self) -> bool {
        self.pending
            .first_key_value()
            .is_some_and(|(seq, _)| *seq == self.next_seq)
    }

    /// Release the next record in order, if it has completed
    pub fn pop_ready(&mut self) -> Option<Record> {
        if !self.is_ready() {
            return None;
        }
        let (_, record) = self.pending.pop_first()?;
        self.next_seq += 1;
        Some(record)
    }

    /// Number of held results
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is held
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sequence position released next
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

type InFlight = BoxFuture<'static, (u64, Result<Record, ProcessingError>)>;

/// The processing stage
pub struct ProcessingStage {
    processor: Arc<dyn RecordProcessor>,
    concurrency: usize,
    timeout: Duration,
}

impl ProcessingStage {
    /// Create a stage; `concurrency` is clamped to at least 1
    pub fn new(processor: Arc<dyn RecordProcessor>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            processor,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    fn process_one(&self, seq: u64, record: Record) -> InFlight {
        let processor = Arc::clone(&self.processor);
        let timeout = self.timeout;
        let record_id = record.id;

        async move {
            let work = AssertUnwindSafe(processor.process(record)).catch_unwind();
            let result = match tokio::time::timeout(timeout, work).await {
                Ok(Ok(Ok(record))) => Ok(record),
                Ok(Ok(Err(e))) => Err(ProcessingError::Failed {
                    record_id,
                    message: e.to_string(),
                }),
                Ok(Err(panic)) => Err(ProcessingError::Panicked {
                    record_id,
                    message: panic_message(panic.as_ref()),
                }),
                Err(_) => Err(ProcessingError::Timeout {
                    record_id,
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };
            (seq, result)
        }
        .boxed()
    }

    /// Run until `input` ends or a failure occurs
    ///
    /// Returns the number of records emitted downstream.
    pub async fn run(
        self,
        mut input: mpsc::Receiver<Result<Record, ConduitError>>,
        output: mpsc::Sender<Result<Record, ConduitError>>,
    ) -> u64 {
        let mut in_flight: FuturesUnordered<InFlight> = FuturesUnordered::new();
        let mut reorder = ReorderBuffer::new();
        let mut next_seq = 0u64;
        let mut emitted = 0u64;
        let mut upstream_done = false;

        tracing::debug!(
            processor = self.processor.name(),
            concurrency = self.concurrency,
            timeout_ms = self.timeout.as_millis() as u64,
            "Processing stage started"
        );

        loop {
            let has_capacity = in_flight.len() + reorder.len() < self.concurrency;

            tokio::select! {
                biased;

                permit = output.reserve(), if reorder.is_ready() => {
                    let Ok(permit) = permit else {
                        tracing::debug!("Processing output closed");
                        return emitted;
                    };
                    if let Some(record) = reorder.pop_ready() {
                        permit.send(Ok(record));
                        emitted += 1;
                    }
                }

                Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    match result {
                        Ok(record) => reorder.insert(seq, record),
                        Err(e) => {
                            tracing::error!(error = %e, "Processing failed, aborting stage");
                            let _ = output.send(Err(ConduitError::Processing(e))).await;
                            return emitted;
                        }
                    }
                }

                item = input.recv(), if has_capacity && !upstream_done => {
                    match item {
                        Some(Ok(record)) => {
                            in_flight.push(self.process_one(next_seq, record));
                            next_seq += 1;
                        }
                        Some(Err(e)) => {
                            let _ = output.send(Err(e)).await;
                            return emitted;
                        }
                        None => upstream_done = true,
                    }
                }

                else => break,
            }
        }

        tracing::debug!(emitted, "Processing stage finished");
        emitted
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
