//! Event normalization
//!
//! This module cleans the raw event sequence before any transformer sees it.
//! - Events without a trigger timestamp are dropped
//! - Missing termination timestamps default to the trigger timestamp
//! - Edit events always get their termination reset (their duration is noise)
//! - Test case results get start times back-filled; cases whose duration
//!   overflows the time line are dropped
//! - IDE-internal duplicates of one command invocation collapse to one event
//!
//! The normalizer never reorders events and works incrementally: events are
//! held back only while more events with the same trigger timestamp may
//! still arrive.

use crate::schema::{Event, EventPayload};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Counters describing what the normalizer changed or dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizerStats {
    pub dropped_missing_trigger: usize,
    pub dropped_duplicates: usize,
    pub fixed_termination: usize,
    pub backfilled_test_cases: usize,
    /// Test cases whose duration does not fit on the time line
    pub dropped_test_cases: usize,
}

/// Streaming normalizer for raw event sequences
#[derive(Debug, Default)]
pub struct Normalizer {
    /// Events sharing the trigger timestamp of the newest event
    pending: Vec<Event>,
    pending_trigger: Option<DateTime<Utc>>,
    stats: NormalizerStats,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a complete event sequence in one call
    pub fn fix_and_filter(events: impl IntoIterator<Item = Event>) -> Vec<Event> {
        let mut normalizer = Normalizer::new();
        let mut fixed = Vec::new();
        for event in events {
            fixed.extend(normalizer.push(event));
        }
        fixed.extend(normalizer.finish());
        fixed
    }

    /// Feed one raw event; returns the events that are final by now
    pub fn push(&mut self, mut event: Event) -> Vec<Event> {
        let Some(triggered_at) = event.triggered_at else {
            self.stats.dropped_missing_trigger += 1;
            return Vec::new();
        };

        self.fix_termination(&mut event, triggered_at);
        self.backfill_test_cases(&mut event, triggered_at);

        let released = if self.pending_trigger == Some(triggered_at) {
            Vec::new()
        } else {
            self.pending_trigger = Some(triggered_at);
            std::mem::take(&mut self.pending)
        };

        self.add_deduplicated(event);
        released
    }

    /// Signal the end of the raw stream and release all held-back events
    pub fn finish(&mut self) -> Vec<Event> {
        self.pending_trigger = None;
        std::mem::take(&mut self.pending)
    }

    pub fn stats(&self) -> NormalizerStats {
        self.stats
    }

    fn fix_termination(&mut self, event: &mut Event, triggered_at: DateTime<Utc>) {
        if event.payload.is_edit_like() || event.terminated_at.is_none() {
            if event.terminated_at != Some(triggered_at) {
                self.stats.fixed_termination += 1;
            }
            event.terminated_at = Some(triggered_at);
        }
    }

    /// Lay test cases without a start time out back to back from the run's start.
    /// Cases that would end beyond the representable time range are dropped.
    fn backfill_test_cases(&mut self, event: &mut Event, triggered_at: DateTime<Utc>) {
        let EventPayload::TestRun { tests, .. } = &mut event.payload else {
            return;
        };

        let mut offset = Duration::zero();
        let mut kept = Vec::with_capacity(tests.len());
        for mut test in std::mem::take(tests) {
            let start = test
                .start_time
                .or_else(|| triggered_at.checked_add_signed(offset));
            let end = start.and_then(|start| start.checked_add_signed(test.duration()));
            let next_offset = offset.checked_add(&test.duration());

            let (Some(start), Some(_), Some(next_offset)) = (start, end, next_offset) else {
                log::warn!(
                    "dropping test case {} with unrepresentable duration of {} ms",
                    test.test_method.method,
                    test.duration_ms
                );
                self.stats.dropped_test_cases += 1;
                continue;
            };

            if test.start_time.is_none() {
                test.start_time = Some(start);
                self.stats.backfilled_test_cases += 1;
            }
            offset = next_offset;
            kept.push(test);
        }
        *tests = kept;
    }

    fn add_deduplicated(&mut self, event: Event) {
        let Some(name) = command_name(&event) else {
            self.pending.push(event);
            return;
        };

        let duplicate = self
            .pending
            .iter()
            .position(|other| command_name(other) == Some(name));

        match duplicate {
            Some(idx) => {
                self.stats.dropped_duplicates += 1;
                if preferred_over(&event, &self.pending[idx]) {
                    self.pending[idx] = event;
                }
            }
            None => self.pending.push(event),
        }
    }
}

/// Command name without its component qualification (`"a:b:Edit.Copy"` -> `"Edit.Copy"`)
fn command_name(event: &Event) -> Option<&str> {
    match &event.payload {
        EventPayload::Command { command_id } => {
            Some(command_id.rsplit(':').next().unwrap_or(command_id))
        }
        _ => None,
    }
}

/// Whether `candidate` should replace `kept` among duplicate commands.
/// The event with the longer recorded execution wins, then the lexically
/// larger qualified id; complete ties keep the earlier event.
fn preferred_over(candidate: &Event, kept: &Event) -> bool {
    let key = |e: &Event| {
        let id = match &e.payload {
            EventPayload::Command { command_id } => command_id.clone(),
            _ => String::new(),
        };
        (e.terminated_at, id)
    };
    key(candidate) > key(kept)
}
