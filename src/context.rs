//! Transformer context
//!
//! One context exists per pipeline run and is handed to every transformer. It
//! tracks the currently open project and is the only place where interval
//! durations are changed, so the "extensions never move an end backwards"
//! rule lives in exactly one spot.

use crate::schema::{EventPayload, SolutionAction, TimedEvent};
use crate::types::{Interval, IntervalKind};
use chrono::{DateTime, Utc};

/// Shared mutable state of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct TransformerContext {
    current_project: Option<String>,
}

impl TransformerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_project(&self) -> Option<&str> {
        self.current_project.as_deref()
    }

    /// Pick up project information carried by an event
    pub fn observe(&mut self, event: &TimedEvent<'_>) {
        if let EventPayload::Solution { action, target } = &event.payload {
            match action {
                SolutionAction::Opened => {
                    if let Some(target) = target {
                        log::debug!("current project is now {}", target);
                        self.current_project = Some(target.clone());
                    }
                }
                SolutionAction::Closed => self.current_project = None,
                SolutionAction::Closing => {}
            }
        }
    }

    /// Create a zero-duration interval starting at the event's trigger time
    pub fn create_interval(&self, event: &TimedEvent<'_>, kind: IntervalKind) -> Interval {
        self.create_interval_at(event, event.triggered_at, kind)
    }

    /// Create a zero-duration interval for the event starting at `start`,
    /// used when a span must begin after the event's own trigger time
    pub fn create_interval_at(
        &self,
        event: &TimedEvent<'_>,
        start: DateTime<Utc>,
        kind: IntervalKind,
    ) -> Interval {
        Interval {
            start,
            end: start,
            session_id: event.session_id.clone(),
            user_id: None,
            project: self.current_project.clone(),
            kave_version: event.kave_version.clone(),
            kind,
        }
    }

    /// Extend the interval so that it ends no earlier than `end`
    pub fn extend_to_maximum(&self, interval: &mut Interval, end: DateTime<Utc>) {
        if end > interval.end {
            interval.end = end;
        }
    }

    /// Set the interval's end to exactly `end`, clamped so that the duration
    /// never becomes negative
    pub fn close_at(&self, interval: &mut Interval, end: DateTime<Utc>) {
        interval.end = end.max(interval.start);
    }
}
