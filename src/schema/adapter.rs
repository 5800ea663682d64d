//! Parsing and validation of serialized event streams

use crate::error::IntervalError;
use crate::schema::event::{Event, ValidationError};

/// Adapter for reading recorded events from their JSON representations
pub struct EventAdapter;

impl EventAdapter {
    /// Parse a JSON string containing an array of events
    pub fn parse_array(json: &str) -> Result<Vec<Event>, IntervalError> {
        let events: Vec<Event> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON), one event per line.
    ///
    /// Fails on the first malformed line; use [`EventAdapter::parse_line`]
    /// for lenient, line-by-line reading.
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Event>, IntervalError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            match Self::parse_line(line) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    return Err(IntervalError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Parse a single NDJSON line; blank lines yield `None`
    pub fn parse_line(line: &str) -> Result<Option<Event>, serde_json::Error> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(trimmed).map(Some)
    }

    /// Validate a batch of events, returning only the failures
    pub fn validate_events(events: &[Event]) -> Vec<ValidationResult> {
        events
            .iter()
            .enumerate()
            .filter_map(|(index, event)| {
                event.validate().err().map(|error| ValidationResult {
                    index,
                    kind: event.payload.kind_name(),
                    error,
                })
            })
            .collect()
    }
}

/// Validation failure of one event in a batch
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub kind: &'static str,
    pub error: ValidationError,
}
