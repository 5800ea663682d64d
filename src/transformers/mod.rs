//! Event-to-interval transformers
//!
//! Every transformer is a small state machine that sees the full normalized
//! event stream in order and emits intervals of one kind when the stream
//! ends. Composition transformers fan a stream out to several children or
//! partition it by session.
//!
//! Leaf transformers: focus, IDE open, user activity, file interaction,
//! perspective, test run.
//! Combinators: aggregate (fan-out), session partition (per-session trees).

mod aggregate;
mod document;
mod file_interaction;
mod filter;
mod focus;
mod ide_open;
mod perspective;
mod session;
mod test_run;
mod user_active;

pub use aggregate::AggregateTransformer;
pub use document::classify_document;
pub use file_interaction::FileInteractionTransformer;
pub use filter::drop_degenerate;
pub use focus::FocusTransformer;
pub use ide_open::IdeOpenTransformer;
pub use perspective::PerspectiveTransformer;
pub use session::{SessionPartitionTransformer, TransformerFactory};
pub use test_run::TestRunTransformer;
pub use user_active::UserActiveTransformer;

use crate::context::TransformerContext;
use crate::schema::TimedEvent;
use crate::types::Interval;

/// A state machine turning an ordered event stream into intervals
pub trait EventToIntervalTransformer {
    /// Consume the next event of the stream
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext);

    /// Flush all intervals, including any still open. Called once, after the
    /// last event.
    fn end_of_stream(&mut self) -> Vec<Interval>;
}

/// Emitted intervals of one leaf transformer plus the one still growing
#[derive(Debug, Default)]
struct OpenIntervals {
    intervals: Vec<Interval>,
    current: Option<usize>,
}

impl OpenIntervals {
    fn current_mut(&mut self) -> Option<&mut Interval> {
        self.current.map(|idx| &mut self.intervals[idx])
    }

    fn current(&self) -> Option<&Interval> {
        self.current.map(|idx| &self.intervals[idx])
    }

    /// Return the open interval, opening `create()` if there is none
    fn current_or_open(&mut self, create: impl FnOnce() -> Interval) -> &mut Interval {
        let idx = match self.current {
            Some(idx) => idx,
            None => self.open(create()),
        };
        &mut self.intervals[idx]
    }

    fn open(&mut self, interval: Interval) -> usize {
        self.intervals.push(interval);
        let idx = self.intervals.len() - 1;
        self.current = Some(idx);
        idx
    }

    /// Stop growing the open interval; it stays in the output as is
    fn seal(&mut self) {
        self.current = None;
    }

    /// End of the most recently emitted interval
    fn last_end(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.intervals.last().map(|interval| interval.end)
    }

    fn take_all(&mut self) -> Vec<Interval> {
        self.current = None;
        std::mem::take(&mut self.intervals)
    }
}
