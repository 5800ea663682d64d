//! IDE Intervals - Turns recorded IDE interaction events into activity intervals
//!
//! An IDE plugin records what a developer does as a stream of events
//! (commands, edits, window changes, debugger transitions, test runs). This
//! crate condenses such a stream into typed, non-overlapping intervals through
//! a deterministic pipeline: normalization → ordering check → transformer
//! tree → zero-duration filter.
//!
//! ## Modules
//!
//! - **Pipeline**: Convert one event stream into intervals
//! - **Transformers**: Leaf state machines per interval kind and their combinators
//! - **Batch**: Process many archives with a worker pool and an LRU output cache

pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod transformers;
pub mod types;

pub use config::{BatchConfig, GroupBy, PipelineConfig};
pub use context::TransformerContext;
pub use error::IntervalError;
pub use normalizer::{Normalizer, NormalizerStats};
pub use pipeline::{events_to_intervals, IntervalTransformer, PipelineRun};
pub use schema::{Event, EventAdapter, EventPayload, TimedEvent};
pub use transformers::EventToIntervalTransformer;
pub use types::{Interval, IntervalKind};

// Batch exports
pub use batch::{ArchiveCache, BatchProcessor, BatchReport, LogProgress, ProgressLogger};

/// Crate version, reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
