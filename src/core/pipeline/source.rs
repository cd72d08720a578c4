//! Pull-based record source
//!
//! [`open`] wraps a [`RecordReader`] into a [`RecordCursor`]: a lazy, finite
//! sequence that fetches one page at a time with keyset pagination and can
//! never be restarted. A second pass needs a second `open`.
//!
//! The cursor only mutates its state after a fetch completes, so dropping a
//! pending [`RecordCursor::next`] future abandons that fetch without error.

use crate::adapters::store::RecordReader;
use crate::domain::errors::SourceReadError;
use crate::domain::ids::RecordId;
use crate::domain::record::{Record, RecordFilter};
use crate::domain::ConduitError;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Options for [`open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOptions {
    /// Stop after yielding this many records
    pub limit: Option<u64>,
    /// Records fetched per page
    pub page_size: usize,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            limit: None,
            page_size: 1000,
        }
    }
}

/// Lifecycle of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// More records may follow
    Open,
    /// The backing store has no more matching records
    Exhausted,
    /// `limit` records have been yielded
    LimitReached,
    /// Closed by the consumer before the end
    Closed,
    /// A page fetch failed
    Failed,
}

impl CursorState {
    /// Returns true once no further records will be yielded
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CursorState::Open)
    }
}

/// Lazy paginated cursor over a [`RecordReader`]
pub struct RecordCursor {
    reader: Arc<dyn RecordReader>,
    filter: RecordFilter,
    options: CursorOptions,
    page: VecDeque<Record>,
    last_id: Option<RecordId>,
    /// Last page was short, so the store has nothing past it
    drained: bool,
    yielded: u64,
    pages_fetched: u64,
    state: CursorState,
}

/// Open a cursor over the records matching `filter`
///
/// Nothing is fetched until the first call to [`RecordCursor::next`].
pub fn open(
    reader: Arc<dyn RecordReader>,
    filter: RecordFilter,
    options: CursorOptions,
) -> RecordCursor {
    let page_size = options.page_size.max(1);
    RecordCursor {
        reader,
        filter,
        options: CursorOptions {
            page_size,
            ..options
        },
        page: VecDeque::with_capacity(page_size),
        last_id: None,
        drained: false,
        yielded: 0,
        pages_fetched: 0,
        state: if options.limit == Some(0) {
            CursorState::LimitReached
        } else {
            CursorState::Open
        },
    }
}

impl RecordCursor {
    /// Yield the next record, fetching a page if the current one is used up
    ///
    /// Returns `Ok(None)` once the cursor reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`SourceReadError`] if a page fetch fails. The cursor is then
    /// in [`CursorState::Failed`] and yields nothing further.
    pub async fn next(&mut self) -> Result<Option<Record>, SourceReadError> {
        if self.state.is_terminal() {
            return Ok(None);
        }

        if self.page.is_empty() {
            if self.drained {
                self.finish(CursorState::Exhausted);
                return Ok(None);
            }

            let want = match self.options.limit {
                Some(limit) => {
                    let remaining = limit.saturating_sub(self.yielded);
                    usize::try_from(remaining)
                        .unwrap_or(usize::MAX)
                        .min(self.options.page_size)
                }
                None => self.options.page_size,
            };

            let page = self
                .reader
                .fetch_page(&self.filter, self.last_id, want)
                .await
                .map_err(|cause| {
                    self.state = CursorState::Failed;
                    SourceReadError {
                        after: self.last_id.map(|id| id.get()).unwrap_or(0),
                        cause,
                    }
                })?;
            self.pages_fetched += 1;

            tracing::trace!(
                page = self.pages_fetched,
                records = page.len(),
                after = ?self.last_id,
                "Fetched source page"
            );

            if page.is_empty() {
                self.finish(CursorState::Exhausted);
                return Ok(None);
            }
            self.drained = page.len() < want;
            self.page.extend(page);
        }

        let Some(record) = self.page.pop_front() else {
            self.finish(CursorState::Exhausted);
            return Ok(None);
        };

        self.last_id = Some(record.id);
        self.yielded += 1;

        if self.options.limit.is_some_and(|limit| self.yielded >= limit) {
            self.finish(CursorState::LimitReached);
        }

        Ok(Some(record))
    }

    /// Stop the cursor before it is exhausted
    ///
    /// Buffered records are dropped and no further pages are fetched.
    /// Closing an already finished cursor does nothing. Returns true if this
    /// call closed the cursor.
    pub fn close(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.finish(CursorState::Closed);
        tracing::info!(
            yielded = self.yielded,
            pages = self.pages_fetched,
            "Source cursor closed early"
        );
        true
    }

    fn finish(&mut self, state: CursorState) {
        self.state = state;
        self.page.clear();
        self.page.shrink_to_fit();
    }

    /// Current state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Records yielded so far
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Pages fetched so far
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Records currently buffered from the last page
    pub fn buffered(&self) -> usize {
        self.page.len()
    }
}

impl Drop for RecordCursor {
    fn drop(&mut self) {
        // An aborted source task still closes its cursor
        self.close();
    }
}

/// How the source task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSummary {
    /// Terminal cursor state
    pub state: CursorState,
    /// Records handed downstream
    pub yielded: u64,
    /// Whether an external shutdown stopped the source
    pub cancelled: bool,
}

/// Resolves once the shutdown flag is set; never resolves without a receiver
pub(crate) async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    match shutdown {
        Some(rx) => loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without signalling
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending().await,
    }
}

/// Drive `cursor` into `tx` until it ends, fails, or shutdown is requested
///
/// Errors are sent downstream in-band. Dropping the receiver closes the
/// cursor.
pub(crate) async fn run_source(
    mut cursor: RecordCursor,
    tx: mpsc::Sender<Result<Record, ConduitError>>,
    mut shutdown: Option<watch::Receiver<bool>>,
) -> SourceSummary {
    let mut cancelled = false;

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                cancelled = cursor.close();
                break;
            }
            next = cursor.next() => next,
        };

        match next {
            Ok(Some(record)) => {
                let sent = tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => {
                        // The in-hand record was never handed off
                        cancelled = true;
                        cursor.close();
                        break;
                    }
                    sent = tx.send(Ok(record)) => sent,
                };
                if sent.is_err() {
                    cursor.close();
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Source read failed");
                let _ = tx.send(Err(ConduitError::Source(e))).await;
                break;
            }
        }
    }

    SourceSummary {
        state: cursor.state(),
        yielded: cursor.yielded(),
        cancelled,
    }
}
