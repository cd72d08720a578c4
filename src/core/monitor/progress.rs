//! Progress reporting over the processed-record stream
//!
//! [`ProgressStream`] passes every item through unchanged and lets a
//! [`ProgressTracker`] count the successful ones. A report fires after every
//! `every_items` items, and [`run_progress_ticker`] fires one whenever a full
//! interval of wall-clock time has passed without a report, whether or not
//! items are arriving. Exactly one final report follows when the stream ends.

use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Snapshot passed to the progress callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Items seen since the stream started
    pub items: u64,
    /// Time since the tracker was created
    pub elapsed: Duration,
    /// Average items per second since start
    pub rate_per_sec: f64,
    /// True for the end-of-stream report
    pub is_final: bool,
}

/// Callback invoked with each progress report
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Callback that logs each report at info level
pub fn logging_callback() -> ProgressCallback {
    Arc::new(|update: &ProgressUpdate| {
        tracing::info!(
            items = update.items,
            elapsed_ms = update.elapsed.as_millis() as u64,
            rate_per_sec = format!("{:.1}", update.rate_per_sec),
            is_final = update.is_final,
            "Progress"
        );
    })
}

#[derive(Debug)]
struct TrackerState {
    last_report_at: Instant,
    items: u64,
    items_at_last_report: u64,
    reports: u64,
    finished: bool,
}

/// Counts items and decides when to report
///
/// Shared between the stream that counts items and the ticker that
/// watches the clock. The callback runs outside the internal lock.
pub struct ProgressTracker {
    interval: Duration,
    every_items: u64,
    callback: ProgressCallback,
    started_at: Instant,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    /// Create a tracker; the clock starts now
    pub fn new(interval: Duration, every_items: u64, callback: ProgressCallback) -> Self {
        let now = Instant::now();
        Self {
            interval,
            every_items: every_items.max(1),
            callback,
            started_at: now,
            state: Mutex::new(TrackerState {
                last_report_at: now,
                items: 0,
                items_at_last_report: 0,
                reports: 0,
                finished: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The configured time interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Count one item and report if an interval has been reached
    pub fn observe(&self) {
        let update = {
            let mut state = self.lock();
            if state.finished {
                return;
            }
            state.items += 1;

            let now = Instant::now();
            let by_count = state.items - state.items_at_last_report >= self.every_items;
            let by_time = now.duration_since(state.last_report_at) >= self.interval;
            if !(by_count || by_time) {
                return;
            }
            self.report(&mut state, now, false)
        };
        (self.callback)(&update);
    }

    /// Report if a full interval has passed since the last report
    ///
    /// Called by [`run_progress_ticker`]; fires even when no item has
    /// arrived since the last report.
    pub fn tick(&self) {
        let update = {
            let mut state = self.lock();
            let now = Instant::now();
            if state.finished || now.duration_since(state.last_report_at) < self.interval {
                return;
            }
            self.report(&mut state, now, false)
        };
        (self.callback)(&update);
    }

    /// Emit the final report; later calls do nothing
    pub fn finish(&self) {
        let update = {
            let mut state = self.lock();
            if state.finished {
                return;
            }
            state.finished = true;
            self.report(&mut state, Instant::now(), true)
        };
        (self.callback)(&update);
    }

    fn report(&self, state: &mut TrackerState, now: Instant, is_final: bool) -> ProgressUpdate {
        let elapsed = now.duration_since(self.started_at);
        let secs = elapsed.as_secs_f64();

        state.last_report_at = now;
        state.items_at_last_report = state.items;
        state.reports += 1;

        ProgressUpdate {
            items: state.items,
            elapsed,
            rate_per_sec: if secs > 0.0 {
                state.items as f64 / secs
            } else {
                0.0
            },
            is_final,
        }
    }

    /// Items counted so far
    pub fn items(&self) -> u64 {
        self.lock().items
    }

    /// Reports emitted so far, including the final one
    pub fn reports(&self) -> u64 {
        self.lock().reports
    }

    /// Returns true once the final report has been emitted
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ProgressTracker")
            .field("interval", &self.interval)
            .field("every_items", &self.every_items)
            .field("items", &state.items)
            .field("reports", &state.reports)
            .field("finished", &state.finished)
            .finish()
    }
}

/// Drive the time-based reports until the tracker finishes
///
/// Ticks once per interval; each tick reports unless an item-count report
/// already landed within the last interval.
pub async fn run_progress_ticker(tracker: Arc<ProgressTracker>) {
    let period = tracker.interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if tracker.is_finished() {
            break;
        }
        tracker.tick();
    }
}

/// Pass-through stream that feeds a [`ProgressTracker`]
///
/// `Ok` items are counted; an `Err` item or the end of the stream triggers
/// the final report.
#[derive(Debug)]
pub struct ProgressStream<S> {
    inner: S,
    tracker: Arc<ProgressTracker>,
}

impl<S> ProgressStream<S> {
    /// Wrap `inner`
    pub fn new(inner: S, tracker: Arc<ProgressTracker>) -> Self {
        Self { inner, tracker }
    }

    /// The tracker
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }
}

impl<S, T, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(item))) => {
                this.tracker.observe();
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.tracker.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.tracker.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
