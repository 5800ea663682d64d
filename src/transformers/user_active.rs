//! User-activity intervals: stretches without long pauses between events

use super::{EventToIntervalTransformer, OpenIntervals};
use crate::context::TransformerContext;
use crate::schema::TimedEvent;
use crate::types::{Interval, IntervalKind};
use chrono::Duration;

pub struct UserActiveTransformer {
    open: OpenIntervals,
    timeout: Duration,
}

impl UserActiveTransformer {
    /// `timeout` is the longest pause that still counts as continuous activity
    pub fn new(timeout: Duration) -> Self {
        Self {
            open: OpenIntervals::default(),
            timeout,
        }
    }
}

impl EventToIntervalTransformer for UserActiveTransformer {
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext) {
        let timed_out = self
            .open
            .current()
            .is_some_and(|current| event.triggered_at - current.end > self.timeout);
        if timed_out {
            self.open.seal();
        }

        let current = self
            .open
            .current_or_open(|| context.create_interval(event, IntervalKind::UserActive));
        context.extend_to_maximum(current, event.terminated_at);
    }

    fn end_of_stream(&mut self) -> Vec<Interval> {
        self.open.take_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Event, EventPayload};
    use crate::transformers::test_support::{at, run, spans};
    use pretty_assertions::assert_eq;

    fn activity(start: i64, end: i64) -> Event {
        Event::new(EventPayload::Activity).at(at(start)).until(at(end))
    }

    #[test]
    fn test_pause_longer_than_timeout_splits() {
        let events = vec![activity(0, 2), activity(10, 12), activity(40, 41)];

        let intervals = run(&mut UserActiveTransformer::new(Duration::seconds(16)), &events);

        assert_eq!(spans(&intervals), vec![(0, 12), (40, 41)]);
    }

    #[test]
    fn test_pause_of_exactly_timeout_continues() {
        let events = vec![activity(0, 2), activity(18, 19)];

        let intervals = run(&mut UserActiveTransformer::new(Duration::seconds(16)), &events);

        assert_eq!(spans(&intervals), vec![(0, 19)]);
    }
}
