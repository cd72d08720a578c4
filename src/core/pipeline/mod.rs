//! The streaming pipeline
//!
//! ```text
//! Source ──▶ ProcessingStage ──▶ BatchAccumulator ──▶ Sink
//!        (C)                 (B)                  (1)
//! ```
//!
//! Each arrow is a bounded channel; its capacity is shown in parentheses
//! (`C` = processing concurrency, `B` = insert batch size). A stage only
//! pulls from upstream when it can hand the result on, so resident memory
//! depends on `page_size + C + B` and not on the size of the dataset.

pub mod accumulator;
pub mod processing;
pub mod report;
pub mod runner;
pub mod sink;
pub mod source;

pub use accumulator::{AccumulatorSummary, BatchAccumulator};
pub use processing::{ProcessingStage, ReorderBuffer};
pub use report::{PipelineFailure, PipelineReport, PipelineStatus};
pub use runner::{run_pipeline, PipelineRunner, PipelineState};
pub use sink::{BatchSink, SinkOutcome};
pub use source::{open, CursorOptions, CursorState, RecordCursor, SourceSummary};
