//! Per-session transformer trees

use super::EventToIntervalTransformer;
use crate::context::TransformerContext;
use crate::schema::TimedEvent;
use crate::types::Interval;
use std::collections::BTreeMap;

/// Builds a fresh transformer tree for a newly seen session
pub type TransformerFactory = Box<dyn Fn() -> Box<dyn EventToIntervalTransformer>>;

/// Routes every event to a transformer tree owned by its session.
///
/// Trees are created lazily on the first event of a session and never see
/// events of other sessions. Flushing walks sessions in id order so the
/// output is reproducible.
pub struct SessionPartitionTransformer {
    factory: TransformerFactory,
    sessions: BTreeMap<String, Box<dyn EventToIntervalTransformer>>,
}

impl SessionPartitionTransformer {
    pub fn new(factory: TransformerFactory) -> Self {
        Self {
            factory,
            sessions: BTreeMap::new(),
        }
    }

    /// Number of sessions seen so far
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl EventToIntervalTransformer for SessionPartitionTransformer {
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext) {
        let factory = &self.factory;
        let tree = self
            .sessions
            .entry(event.session_id.clone())
            .or_insert_with(|| {
                log::debug!("new session {:?}", event.session_id);
                factory()
            });
        tree.process_event(event, context);
    }

    fn end_of_stream(&mut self) -> Vec<Interval> {
        self.sessions
            .values_mut()
            .flat_map(|tree| tree.end_of_stream())
            .collect()
    }
}
