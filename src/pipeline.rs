//! Pipeline orchestration
//!
//! Turns one ordered event stream into intervals:
//! 1. Normalizer - drop and fix malformed events, collapse duplicates
//! 2. Ordering check - the stream must never go back in time
//! 3. Transformer tree - test runs plus per-session leaf transformers
//! 4. Post-filter - drop zero-duration intervals, annotate the owner

use crate::config::PipelineConfig;
use crate::context::TransformerContext;
use crate::error::IntervalError;
use crate::normalizer::{Normalizer, NormalizerStats};
use crate::schema::Event;
use crate::transformers::{
    drop_degenerate, AggregateTransformer, EventToIntervalTransformer, FileInteractionTransformer,
    FocusTransformer, IdeOpenTransformer, PerspectiveTransformer, SessionPartitionTransformer,
    TestRunTransformer, UserActiveTransformer,
};
use crate::types::Interval;
use chrono::{DateTime, Utc};

/// Convert a complete event stream to intervals with the default settings.
///
/// # Arguments
/// * `events` - Raw events, ordered by trigger time
/// * `user_id` - Identifier of the stream's owner, copied onto every interval
///
/// # Example
/// ```ignore
/// let intervals = events_to_intervals(events, Some("user-17"))?;
/// ```
pub fn events_to_intervals(
    events: impl IntoIterator<Item = Event>,
    user_id: Option<&str>,
) -> Result<Vec<Interval>, IntervalError> {
    IntervalTransformer::default().transform(events, user_id)
}

/// Reusable pipeline factory.
///
/// Holds only configuration; every call to [`IntervalTransformer::start`]
/// creates a run with its own context and transformer state.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalTransformer {
    config: PipelineConfig,
}

impl IntervalTransformer {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start an incremental run
    pub fn start(&self) -> PipelineRun {
        PipelineRun::new(self.config)
    }

    /// Run a complete event stream through the pipeline
    pub fn transform(
        &self,
        events: impl IntoIterator<Item = Event>,
        user_id: Option<&str>,
    ) -> Result<Vec<Interval>, IntervalError> {
        let mut run = self.start();
        for event in events {
            run.push(event)?;
        }
        run.finish(user_id)
    }
}

/// Test runs are tracked across sessions, everything else per session
fn build_tree(config: PipelineConfig) -> AggregateTransformer {
    let per_session = SessionPartitionTransformer::new(Box::new(
        move || -> Box<dyn EventToIntervalTransformer> {
            Box::new(
                AggregateTransformer::default()
                    .with(FocusTransformer::new())
                    .with(IdeOpenTransformer::new())
                    .with(UserActiveTransformer::new(config.activity_timeout()))
                    .with(FileInteractionTransformer::new(
                        config.file_interaction_timeout(),
                    ))
                    .with(PerspectiveTransformer::new()),
            )
        },
    ));

    AggregateTransformer::default()
        .with(TestRunTransformer::new())
        .with(per_session)
}

/// One in-progress pass over an event stream.
///
/// A run is strictly single-threaded. Once it reports an ordering violation
/// it is dead: every further call returns the same error.
pub struct PipelineRun {
    normalizer: Normalizer,
    context: TransformerContext,
    root: AggregateTransformer,
    last_trigger: Option<DateTime<Utc>>,
    violation: Option<(DateTime<Utc>, DateTime<Utc>)>,
    accepted: usize,
}

impl PipelineRun {
    fn new(config: PipelineConfig) -> Self {
        Self {
            normalizer: Normalizer::new(),
            context: TransformerContext::new(),
            root: build_tree(config),
            last_trigger: None,
            violation: None,
            accepted: 0,
        }
    }

    /// Feed the next raw event
    pub fn push(&mut self, event: Event) -> Result<(), IntervalError> {
        self.check_alive()?;
        let released = self.normalizer.push(event);
        self.feed(released)
    }

    /// Flush all transformers and return the finished intervals
    pub fn finish(mut self, user_id: Option<&str>) -> Result<Vec<Interval>, IntervalError> {
        self.check_alive()?;
        let released = self.normalizer.finish();
        self.feed(released)?;

        let mut intervals = drop_degenerate(self.root.end_of_stream());
        if let Some(user_id) = user_id {
            for interval in &mut intervals {
                interval.user_id = Some(user_id.to_string());
            }
        }

        log::debug!(
            "{} events produced {} intervals ({:?})",
            self.accepted,
            intervals.len(),
            self.normalizer.stats()
        );
        Ok(intervals)
    }

    /// Number of events handed to the transformers so far
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn normalizer_stats(&self) -> NormalizerStats {
        self.normalizer.stats()
    }

    fn check_alive(&self) -> Result<(), IntervalError> {
        match self.violation {
            Some((previous, current)) => {
                Err(IntervalError::NonMonotonicStream { previous, current })
            }
            None => Ok(()),
        }
    }

    fn feed(&mut self, events: Vec<Event>) -> Result<(), IntervalError> {
        for event in &events {
            let Some(timed) = event.timed() else {
                log::trace!("skipping untimed {} event", event.payload.kind_name());
                continue;
            };

            if let Some(previous) = self.last_trigger {
                if timed.triggered_at < previous {
                    log::error!(
                        "event stream went back in time from {} to {}",
                        previous,
                        timed.triggered_at
                    );
                    self.violation = Some((previous, timed.triggered_at));
                    return self.check_alive();
                }
            }
            self.last_trigger = Some(timed.triggered_at);

            self.context.observe(&timed);
            self.root.process_event(&timed, &mut self.context);
            self.accepted += 1;
        }
        Ok(())
    }
}
