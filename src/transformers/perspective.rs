//! Perspective intervals: debugging versus regular production work

use super::{EventToIntervalTransformer, OpenIntervals};
use crate::context::TransformerContext;
use crate::schema::{DebuggerMode, EventPayload, TimedEvent};
use crate::types::{Interval, IntervalKind, PerspectiveType};

#[derive(Default)]
pub struct PerspectiveTransformer {
    open: OpenIntervals,
    debugging: bool,
}

impl PerspectiveTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    fn perspective(&self) -> PerspectiveType {
        if self.debugging {
            PerspectiveType::Debug
        } else {
            PerspectiveType::Production
        }
    }

    fn current_perspective(&self) -> Option<PerspectiveType> {
        match self.open.current()?.kind {
            IntervalKind::Perspective { perspective } => Some(perspective),
            _ => None,
        }
    }
}

impl EventToIntervalTransformer for PerspectiveTransformer {
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext) {
        if let EventPayload::Debugger { mode, .. } = event.payload {
            match mode {
                DebuggerMode::Run => self.debugging = true,
                DebuggerMode::Design => self.debugging = false,
                _ => {}
            }
        }

        let perspective = self.perspective();
        if let Some(current) = self.current_perspective() {
            if current != perspective {
                if let Some(current) = self.open.current_mut() {
                    context.close_at(current, event.triggered_at);
                }
                self.open.seal();
            }
        }

        let current = self.open.current_or_open(|| {
            context.create_interval(event, IntervalKind::Perspective { perspective })
        });
        context.extend_to_maximum(current, event.terminated_at);
    }

    fn end_of_stream(&mut self) -> Vec<Interval> {
        self.open.take_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Event;
    use crate::transformers::test_support::{assert_no_overlap, at, run, spans};
    use pretty_assertions::assert_eq;

    fn activity(start: i64, end: i64) -> Event {
        Event::new(EventPayload::Activity).at(at(start)).until(at(end))
    }

    fn perspectives(intervals: &[Interval]) -> Vec<PerspectiveType> {
        intervals
            .iter()
            .filter_map(|interval| match interval.kind {
                IntervalKind::Perspective { perspective } => Some(perspective),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_debug_session_in_between_production_work() {
        let events = vec![
            activity(0, 2),
            Event::debugger(DebuggerMode::Run).at(at(3)).until(at(3)),
            Event::debugger(DebuggerMode::Break).at(at(5)).until(at(6)),
            Event::debugger(DebuggerMode::Design).at(at(8)).until(at(8)),
            activity(9, 12),
        ];

        let intervals = run(&mut PerspectiveTransformer::new(), &events);

        assert_eq!(spans(&intervals), vec![(0, 3), (3, 8), (8, 12)]);
        assert_eq!(
            perspectives(&intervals),
            vec![
                PerspectiveType::Production,
                PerspectiveType::Debug,
                PerspectiveType::Production,
            ]
        );
        assert_no_overlap(&intervals);
    }

    #[test]
    fn test_long_event_cut_at_mode_change() {
        let events = vec![
            activity(0, 10),
            Event::debugger(DebuggerMode::Run).at(at(4)).until(at(5)),
        ];

        let intervals = run(&mut PerspectiveTransformer::new(), &events);

        assert_eq!(spans(&intervals), vec![(0, 4), (4, 5)]);
    }

    #[test]
    fn test_starts_in_debug_mode() {
        let events = vec![Event::debugger(DebuggerMode::Run).at(at(0)).until(at(2))];

        let intervals = run(&mut PerspectiveTransformer::new(), &events);

        assert_eq!(perspectives(&intervals), vec![PerspectiveType::Debug]);
    }
}
