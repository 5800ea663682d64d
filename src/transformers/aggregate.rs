use super::EventToIntervalTransformer;
use crate::context::TransformerContext;
use crate::schema::TimedEvent;
use crate::types::Interval;

/// Fans every event out to a list of child transformers.
///
/// Children run in list order and only share the context; their flushed
/// intervals are concatenated in the same order.
#[derive(Default)]
pub struct AggregateTransformer {
    children: Vec<Box<dyn EventToIntervalTransformer>>,
}

impl AggregateTransformer {
    pub fn new(children: Vec<Box<dyn EventToIntervalTransformer>>) -> Self {
        Self { children }
    }

    /// Append a child transformer
    pub fn with(mut self, child: impl EventToIntervalTransformer + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl EventToIntervalTransformer for AggregateTransformer {
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext) {
        for child in &mut self.children {
            child.process_event(event, context);
        }
    }

    fn end_of_stream(&mut self) -> Vec<Interval> {
        self.children
            .iter_mut()
            .flat_map(|child| child.end_of_stream())
            .collect()
    }
}
