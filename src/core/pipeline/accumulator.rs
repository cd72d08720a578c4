//! Batch accumulator
//!
//! Groups processed records into batches of at most `max_size`. A batch is
//! emitted as soon as it is full, after `flush_timeout` without a new record,
//! and once more when upstream ends. An upstream error discards the pending
//! records and is forwarded instead of a partial batch.

use crate::domain::batch::Batch;
use crate::domain::record::Record;
use crate::domain::ConduitError;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;

/// Pending records and batch numbering
#[derive(Debug)]
pub struct BatchAccumulator {
    max_size: usize,
    pending: Vec<Record>,
    next_sequence: u64,
    consumed: u64,
}

impl BatchAccumulator {
    /// Create an accumulator; `max_size` is clamped to at least 1
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            pending: Vec::with_capacity(max_size),
            next_sequence: 0,
            consumed: 0,
        }
    }

    /// Add a record, returning a batch if it filled up
    pub fn push(&mut self, record: Record) -> Option<Batch> {
        self.pending.push(record);
        self.consumed += 1;
        if self.pending.len() >= self.max_size {
            Some(self.take_batch())
        } else {
            None
        }
    }

    /// Emit whatever is pending as a (possibly partial) batch
    pub fn flush(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_batch())
        }
    }

    /// Drop pending records, returning how many were dropped
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    fn take_batch(&mut self) -> Batch {
        let records = std::mem::replace(&mut self.pending, Vec::with_capacity(self.max_size));
        let batch = Batch::new(self.next_sequence, records);
        self.next_sequence += 1;
        batch
    }

    /// Records waiting for the next batch
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Batches emitted so far
    pub fn batches_emitted(&self) -> u64 {
        self.next_sequence
    }

    /// Records consumed so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

/// Counters reported when the accumulator task ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorSummary {
    pub batches: u64,
    pub consumed: u64,
    pub idle_flushes: u64,
}

/// Drive the accumulator from `input` into `output`
pub(crate) async fn run_accumulator<S>(
    mut accumulator: BatchAccumulator,
    mut input: S,
    output: mpsc::Sender<Result<Batch, ConduitError>>,
    flush_timeout: Duration,
) -> AccumulatorSummary
where
    S: Stream<Item = Result<Record, ConduitError>> + Unpin,
{
    let mut idle_flushes = 0u64;

    loop {
        // The idle timer only runs while something is pending
        let next = if accumulator.pending_len() == 0 {
            input.next().await
        } else {
            match tokio::time::timeout(flush_timeout, input.next()).await {
                Ok(next) => next,
                Err(_) => {
                    if let Some(batch) = accumulator.flush() {
                        idle_flushes += 1;
                        tracing::debug!(
                            batch = batch.sequence(),
                            size = batch.len(),
                            "Idle flush"
                        );
                        if output.send(Ok(batch)).await.is_err() {
                            break;
                        }
                    }
                    continue;
                }
            }
        };

        match next {
            Some(Ok(record)) => {
                if let Some(batch) = accumulator.push(record) {
                    if output.send(Ok(batch)).await.is_err() {
                        break;
                    }
                }
            }
            Some(Err(e)) => {
                let dropped = accumulator.discard();
                if dropped > 0 {
                    tracing::warn!(dropped, "Discarding partial batch after upstream failure");
                }
                let _ = output.send(Err(e)).await;
                break;
            }
            None => {
                if let Some(batch) = accumulator.flush() {
                    let _ = output.send(Ok(batch)).await;
                }
                break;
            }
        }
    }

    AccumulatorSummary {
        batches: accumulator.batches_emitted(),
        consumed: accumulator.consumed(),
        idle_flushes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{Category, RecordBuilder};
    use test_case::test_case;
    use tokio_stream::wrappers::ReceiverStream;

    fn record(id: u64) -> Record {
        RecordBuilder::new()
            .id(id)
            .value(1.0)
            .category(Category::B)
            .build()
            .unwrap()
    }

    #[test_case(10, 3, vec![3, 3, 3, 1] ; "ten by three")]
    #[test_case(9, 3, vec![3, 3, 3] ; "exact multiple")]
    #[test_case(2, 5, vec![2] ; "single partial")]
    #[test_case(0, 4, vec![] ; "empty")]
    #[test_case(7, 1, vec![1; 7] ; "batch of one")]
    fn test_batch_sizes(n: u64, batch_size: usize, expected: Vec<usize>) {
        let mut acc = BatchAccumulator::new(batch_size);
        let mut sizes: Vec<usize> = (1..=n).filter_map(|id| acc.push(record(id))).map(|b| b.len()).collect();
        sizes.extend(acc.flush().map(|b| b.len()));

        assert_eq!(sizes, expected);
        assert_eq!(sizes.iter().sum::<usize>() as u64, n);
        assert_eq!(acc.consumed(), n);
    }

    #[test]
    fn test_sequences_increase() {
        let mut acc = BatchAccumulator::new(2);
        let seqs: Vec<u64> = (1..=6)
            .filter_map(|id| acc.push(record(id)))
            .map(|b| b.sequence())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(acc.flush().is_none());
    }

    #[tokio::test]
    async fn test_idle_flush_emits_partial_batch() {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        let task = tokio::spawn(run_accumulator(
            BatchAccumulator::new(10),
            ReceiverStream::new(in_rx),
            out_tx,
            Duration::from_millis(30),
        ));

        in_tx.send(Ok(record(1))).await.unwrap();
        in_tx.send(Ok(record(2))).await.unwrap();

        let batch = out_rx.recv().await.unwrap().unwrap();
        assert_eq!(batch.len(), 2);

        in_tx.send(Ok(record(3))).await.unwrap();
        drop(in_tx);

        let last = out_rx.recv().await.unwrap().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last.sequence(), 1);
        assert!(out_rx.recv().await.is_none());

        let summary = task.await.unwrap();
        assert_eq!(summary.idle_flushes, 1);
        assert_eq!(summary.consumed, 3);
    }

    #[tokio::test]
    async fn test_upstream_error_discards_pending() {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        for id in 1..=4 {
            in_tx.send(Ok(record(id))).await.unwrap();
        }
        in_tx
            .send(Err(ConduitError::Other("upstream".to_string())))
            .await
            .unwrap();
        drop(in_tx);

        run_accumulator(
            BatchAccumulator::new(3),
            ReceiverStream::new(in_rx),
            out_tx,
            Duration::from_secs(10),
        )
        .await;

        assert_eq!(out_rx.recv().await.unwrap().unwrap().len(), 3);
        assert!(matches!(out_rx.recv().await, Some(Err(ConduitError::Other(_)))));
        assert!(out_rx.recv().await.is_none());
    }
}
