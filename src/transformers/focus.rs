//! Focus intervals: spans in which the IDE window has input focus

use super::{EventToIntervalTransformer, OpenIntervals};
use crate::context::TransformerContext;
use crate::schema::{EventPayload, TimedEvent, WindowAction};
use crate::types::{Interval, IntervalKind};

/// Tracks whether the IDE has focus and grows one interval per focused span.
///
/// Activating any window regains focus; only deactivating the main window
/// loses it.
pub struct FocusTransformer {
    open: OpenIntervals,
    has_focus: bool,
}

impl Default for FocusTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusTransformer {
    pub fn new() -> Self {
        Self {
            open: OpenIntervals::default(),
            has_focus: true,
        }
    }
}

impl EventToIntervalTransformer for FocusTransformer {
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext) {
        if let EventPayload::Window { window, action } = &event.payload {
            match action {
                WindowAction::Activate => self.has_focus = true,
                WindowAction::Deactivate if window.is_main_window() => {
                    if let Some(current) = self.open.current_mut() {
                        context.close_at(current, event.triggered_at);
                    }
                    self.open.seal();
                    self.has_focus = false;
                    return;
                }
                _ => {}
            }
        }

        if self.has_focus {
            let current = self
                .open
                .current_or_open(|| context.create_interval(event, IntervalKind::Focus));
            context.extend_to_maximum(current, event.terminated_at);
        }
    }

    fn end_of_stream(&mut self) -> Vec<Interval> {
        // the open interval already carries its last extension
        self.open.take_all()
    }
}
