//! Test-run intervals: one interval per tested assembly of each test run

use super::EventToIntervalTransformer;
use crate::context::TransformerContext;
use crate::schema::{EventPayload, TestCaseResult, TestResult, TimedEvent};
use crate::types::{Interval, IntervalKind, TestClassResult, TestMethodResult};
use chrono::{DateTime, Duration, Utc};

#[derive(Default)]
pub struct TestRunTransformer {
    intervals: Vec<Interval>,
}

impl TestRunTransformer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Test cases of one assembly, grouped by class in order of appearance
struct AssemblyRun<'e> {
    assembly: &'e str,
    classes: Vec<(&'e str, Vec<&'e TestCaseResult>)>,
}

fn group_by_assembly(tests: &[TestCaseResult]) -> Vec<AssemblyRun<'_>> {
    let mut assemblies: Vec<AssemblyRun<'_>> = Vec::new();
    for test in tests {
        let name = &test.test_method;
        let idx = match assemblies.iter().position(|a| a.assembly == name.assembly) {
            Some(idx) => idx,
            None => {
                assemblies.push(AssemblyRun {
                    assembly: &name.assembly,
                    classes: Vec::new(),
                });
                assemblies.len() - 1
            }
        };
        let classes = &mut assemblies[idx].classes;
        match classes.iter().position(|(class, _)| *class == name.class) {
            Some(idx) => classes[idx].1.push(test),
            None => classes.push((&name.class, vec![test])),
        }
    }
    assemblies
}

fn method_result(test: &TestCaseResult, fallback_start: DateTime<Utc>) -> TestMethodResult {
    TestMethodResult {
        method: test.test_method.method.clone(),
        parameters: test.parameters.clone(),
        start: test.start_time.unwrap_or(fallback_start),
        duration_ms: test.duration_ms.max(0),
        result: test.result,
    }
}

impl EventToIntervalTransformer for TestRunTransformer {
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext) {
        let EventPayload::TestRun { tests, .. } = &event.payload else {
            return;
        };

        for assembly in group_by_assembly(tests) {
            let mut run_result = TestResult::Success;
            let mut run_start: Option<DateTime<Utc>> = None;
            let mut run_duration_ms = 0i64;
            let mut classes = Vec::with_capacity(assembly.classes.len());

            for (class, cases) in assembly.classes {
                let methods: Vec<TestMethodResult> = cases
                    .iter()
                    .map(|test| method_result(test, event.triggered_at))
                    .collect();

                let mut class_result = TestResult::Success;
                for method in &methods {
                    class_result = class_result.fold(method.result);
                    run_result = run_result.fold(method.result);
                }
                let start = methods
                    .iter()
                    .map(|method| method.start)
                    .min()
                    .unwrap_or(event.triggered_at);
                let duration_ms = methods
                    .iter()
                    .fold(0i64, |sum, method| sum.saturating_add(method.duration_ms));

                run_start = Some(run_start.map_or(start, |current| current.min(start)));
                run_duration_ms = run_duration_ms.saturating_add(duration_ms);
                classes.push(TestClassResult {
                    class: class.to_string(),
                    start,
                    duration_ms,
                    result: class_result,
                    methods,
                });
            }

            // runs of one session are reported back to back
            let mut start = run_start.unwrap_or(event.triggered_at);
            if let Some(last) = self
                .intervals
                .iter()
                .rev()
                .find(|interval| interval.session_id == event.session_id)
            {
                start = start.max(last.end);
            }
            let Some(end) = start.checked_add_signed(Duration::milliseconds(run_duration_ms))
            else {
                log::warn!(
                    "skipping test run of {}: duration of {} ms is out of range",
                    assembly.assembly,
                    run_duration_ms
                );
                continue;
            };

            log::debug!(
                "test run of {} with {} classes: {:?}",
                assembly.assembly,
                classes.len(),
                run_result
            );
            let mut interval = context.create_interval_at(
                event,
                start,
                IntervalKind::TestRun {
                    project_name: assembly.assembly.to_string(),
                    result: run_result,
                    classes,
                },
            );
            context.extend_to_maximum(&mut interval, end);
            self.intervals.push(interval);
        }
    }

    fn end_of_stream(&mut self) -> Vec<Interval> {
        std::mem::take(&mut self.intervals)
    }
}
