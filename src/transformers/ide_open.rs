//! IDE-open intervals: the time the IDE process is running

use super::{EventToIntervalTransformer, OpenIntervals};
use crate::context::TransformerContext;
use crate::schema::{EventPayload, IdePhase, TimedEvent};
use crate::types::{Interval, IntervalKind};

/// Opens an interval with the first event and keeps it growing until the IDE
/// reports its shutdown.
#[derive(Default)]
pub struct IdeOpenTransformer {
    open: OpenIntervals,
}

impl IdeOpenTransformer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventToIntervalTransformer for IdeOpenTransformer {
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext) {
        if let EventPayload::IdeState {
            phase: IdePhase::Shutdown,
        } = event.payload
        {
            if let Some(current) = self.open.current_mut() {
                context.close_at(current, event.triggered_at);
            }
            self.open.seal();
            return;
        }

        let current = self
            .open
            .current_or_open(|| context.create_interval(event, IntervalKind::IdeOpen));
        context.extend_to_maximum(current, event.terminated_at);
    }

    fn end_of_stream(&mut self) -> Vec<Interval> {
        self.open.take_all()
    }
}
