//! File-interaction intervals: reading or typing in one document

use super::document::classify_document;
use super::{EventToIntervalTransformer, OpenIntervals};
use crate::context::TransformerContext;
use crate::schema::{DebuggerMode, DocumentAction, DocumentName, EventPayload, TimedEvent};
use crate::types::{FileInteractionType, Interval, IntervalKind};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

const TYPING_COMMAND_PREFIXES: [&str; 3] = ["TextControl", "Completion", "VsAction:1:Edit"];

/// Splits the stream into spans of reading or typing in a single document.
///
/// A span ends when the active document changes, when the interaction type
/// changes, on a test run, or after a pause longer than the timeout.
pub struct FileInteractionTransformer {
    open: OpenIntervals,
    timeout: Duration,
    // the debugger emits edit events of its own while running
    debugging: bool,
    known_test_classes: HashSet<String>,
}

impl FileInteractionTransformer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            open: OpenIntervals::default(),
            timeout,
            debugging: false,
            known_test_classes: HashSet::new(),
        }
    }

    fn current_file(&self) -> Option<(&str, FileInteractionType)> {
        match &self.open.current()?.kind {
            IntervalKind::FileInteraction {
                file_name,
                interaction,
                ..
            } => Some((file_name.as_str(), *interaction)),
            _ => None,
        }
    }

    fn document_changed(&self, document: &DocumentName) -> bool {
        self.current_file()
            .is_some_and(|(file_name, _)| file_name != document.path())
    }

    fn classify(
        &mut self,
        event: &TimedEvent<'_>,
        document: &DocumentName,
    ) -> Option<FileInteractionType> {
        use FileInteractionType::{Reading, Typing};

        let continued = self.current_file().map(|(_, interaction)| interaction);
        match &event.payload {
            EventPayload::Edit { .. } if !self.debugging => Some(Typing),
            EventPayload::Edit { .. } => None,
            EventPayload::Completion { .. } => Some(Typing),
            EventPayload::Command { command_id }
                if TYPING_COMMAND_PREFIXES
                    .iter()
                    .any(|prefix| command_id.starts_with(prefix)) =>
            {
                Some(Typing)
            }
            EventPayload::Document {
                action: DocumentAction::Saved,
                ..
            } => Some(Typing),
            EventPayload::Document { .. } | EventPayload::Build { .. } => Some(Reading),
            EventPayload::Debugger { mode, .. } => {
                match mode {
                    DebuggerMode::Run => self.debugging = true,
                    DebuggerMode::Design => self.debugging = false,
                    _ => {}
                }
                Some(Reading)
            }
            // tool windows say nothing about the document
            EventPayload::Window { window, .. } if window.caption() != document.file_name() => {
                None
            }
            EventPayload::Window { .. } | EventPayload::Navigation { .. } => {
                if self.document_changed(document) {
                    Some(Reading)
                } else {
                    continued.or(Some(Reading))
                }
            }
            EventPayload::Activity => continued,
            _ => None,
        }
    }

    fn remember_test_classes(&mut self, event: &TimedEvent<'_>) {
        if let EventPayload::TestRun { tests, .. } = &event.payload {
            for test in tests {
                let class = test.test_method.simple_class_name();
                if !self.known_test_classes.contains(class) {
                    log::debug!("{} is a test class", class);
                    self.known_test_classes.insert(class.to_string());
                }
            }
        }
    }

    /// Close the open interval at `at`, but never before its current end
    fn cut(&mut self, at: DateTime<Utc>, context: &TransformerContext) {
        if let Some(current) = self.open.current_mut() {
            let end = at.max(current.end);
            context.close_at(current, end);
        }
        self.open.seal();
    }

    fn open_interval(
        &mut self,
        event: &TimedEvent<'_>,
        document: &DocumentName,
        interaction: FileInteractionType,
        context: &TransformerContext,
    ) {
        let start = match self.open.last_end() {
            Some(last_end) => event.triggered_at.max(last_end),
            None => event.triggered_at,
        };
        let kind = IntervalKind::FileInteraction {
            file_name: document.path().to_string(),
            file_type: classify_document(document, &self.known_test_classes),
            interaction,
        };
        self.open.open(context.create_interval_at(event, start, kind));
    }
}

impl EventToIntervalTransformer for FileInteractionTransformer {
    fn process_event(&mut self, event: &TimedEvent<'_>, context: &mut TransformerContext) {
        self.remember_test_classes(event);

        let Some(document) = event.active_document.as_ref() else {
            return;
        };

        let timed_out = self
            .open
            .current()
            .is_some_and(|current| event.triggered_at - current.end > self.timeout);
        if timed_out {
            self.open.seal();
        }

        let is_test_run = matches!(event.payload, EventPayload::TestRun { .. });
        if self.open.current().is_some() && (is_test_run || self.document_changed(document)) {
            self.cut(event.triggered_at, context);
        }

        let Some(interaction) = self.classify(event, document) else {
            return;
        };

        match self.current_file().map(|(_, current)| current) {
            None => self.open_interval(event, document, interaction, context),
            Some(current) if current == interaction => {}
            Some(_) => {
                self.cut(event.triggered_at, context);
                self.open_interval(event, document, interaction, context);
            }
        }

        let candidate = classify_document(document, &self.known_test_classes);
        if let Some(current) = self.open.current_mut() {
            if let IntervalKind::FileInteraction { file_type, .. } = &mut current.kind {
                file_type.upgrade(candidate);
            }
            // follows the solution: opened late or closed meanwhile
            current.project = context.current_project().map(str::to_string);
            context.extend_to_maximum(current, event.terminated_at);
        }
    }

    fn end_of_stream(&mut self) -> Vec<Interval> {
        self.open.take_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Event, SolutionAction, TestCaseResult, TestMethodName, TestResult, WindowAction,
        WindowName,
    };
    use crate::transformers::test_support::{assert_no_overlap, at, run, spans};
    use crate::types::DocumentType;
    use pretty_assertions::assert_eq;

    fn document(file: &str) -> DocumentName {
        DocumentName::new("CSharp", file)
    }

    fn reading(start: i64, end: i64, file: &str) -> Event {
        Event::new(EventPayload::Build {
            scope: None,
            action: None,
        })
        .at(at(start))
        .until(at(end))
        .with_document(document(file))
    }

    fn typing(start: i64, end: i64, file: &str) -> Event {
        Event::new(EventPayload::Edit {
            number_of_changes: 1,
            size_of_changes: 1,
        })
        .at(at(start))
        .until(at(end))
        .with_document(document(file))
    }

    fn debugger(start: i64, end: i64, file: &str, mode: DebuggerMode) -> Event {
        Event::debugger(mode)
            .at(at(start))
            .until(at(end))
            .with_document(document(file))
    }

    fn transformer() -> FileInteractionTransformer {
        FileInteractionTransformer::new(Duration::seconds(16))
    }

    fn interactions(intervals: &[Interval]) -> Vec<(String, FileInteractionType)> {
        intervals
            .iter()
            .map(|interval| match &interval.kind {
                IntervalKind::FileInteraction {
                    file_name,
                    interaction,
                    ..
                } => (file_name.clone(), *interaction),
                other => panic!("unexpected interval kind {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_new_interval_when_file_changes() {
        let intervals = run(
            &mut transformer(),
            &[typing(0, 1, "File1.cs"), typing(1, 2, "File2.cs")],
        );

        assert_eq!(spans(&intervals), vec![(0, 1), (1, 2)]);
        assert_eq!(
            interactions(&intervals),
            vec![
                ("File1.cs".to_string(), FileInteractionType::Typing),
                ("File2.cs".to_string(), FileInteractionType::Typing),
            ]
        );
    }

    #[test]
    fn test_new_interval_when_type_changes() {
        let intervals = run(
            &mut transformer(),
            &[reading(0, 1, "File1.cs"), typing(1, 2, "File1.cs")],
        );

        assert_eq!(spans(&intervals), vec![(0, 1), (1, 2)]);
        assert_eq!(
            interactions(&intervals),
            vec![
                ("File1.cs".to_string(), FileInteractionType::Reading),
                ("File1.cs".to_string(), FileInteractionType::Typing),
            ]
        );
    }

    #[test]
    fn test_overlapping_events_are_clipped() {
        let intervals = run(
            &mut transformer(),
            &[reading(0, 2, "File1.cs"), typing(1, 3, "File1.cs")],
        );

        assert_eq!(spans(&intervals), vec![(0, 2), (2, 3)]);
        assert_no_overlap(&intervals);
    }

    #[test]
    fn test_overlapping_events_on_different_files_are_clipped() {
        let intervals = run(
            &mut transformer(),
            &[reading(0, 2, "File1.cs"), typing(1, 3, "File2.cs")],
        );

        assert_eq!(spans(&intervals), vec![(0, 2), (2, 3)]);
        assert_no_overlap(&intervals);
    }

    #[test]
    fn test_ignores_edits_while_debugging() {
        let events = vec![
            debugger(0, 1, "File1.cs", DebuggerMode::Run),
            typing(1, 2, "File1.cs"),
            debugger(2, 3, "File1.cs", DebuggerMode::Design),
            typing(3, 4, "File1.cs"),
        ];

        let intervals = run(&mut transformer(), &events);

        assert_eq!(spans(&intervals), vec![(0, 3), (3, 4)]);
        assert_eq!(
            interactions(&intervals),
            vec![
                ("File1.cs".to_string(), FileInteractionType::Reading),
                ("File1.cs".to_string(), FileInteractionType::Typing),
            ]
        );
    }

    #[test]
    fn test_timeout_starts_new_interval() {
        let intervals = run(
            &mut transformer(),
            &[reading(0, 1, "File1.cs"), reading(30, 31, "File1.cs")],
        );

        assert_eq!(spans(&intervals), vec![(0, 1), (30, 31)]);
    }

    #[test]
    fn test_events_without_document_are_ignored() {
        let events = vec![
            Event::new(EventPayload::Activity).at(at(0)).until(at(5)),
            reading(6, 7, "File1.cs"),
        ];

        let intervals = run(&mut transformer(), &events);

        assert_eq!(spans(&intervals), vec![(6, 7)]);
    }

    #[test]
    fn test_activity_continues_previous_type() {
        let events = vec![
            typing(0, 1, "File1.cs"),
            Event::new(EventPayload::Activity)
                .at(at(2))
                .until(at(4))
                .with_document(document("File1.cs")),
        ];

        let intervals = run(&mut transformer(), &events);

        assert_eq!(spans(&intervals), vec![(0, 4)]);
        assert_eq!(
            interactions(&intervals),
            vec![("File1.cs".to_string(), FileInteractionType::Typing)]
        );
    }

    #[test]
    fn test_tool_window_events_are_ignored() {
        let events = vec![
            reading(0, 1, "C:\\Shop\\Basket.cs"),
            Event::window(
                WindowName::new("vsWindowTypeToolWindow", "Output"),
                WindowAction::Activate,
            )
            .at(at(2))
            .until(at(9))
            .with_document(document("C:\\Shop\\Basket.cs")),
            Event::window(
                WindowName::new("vsWindowTypeDocument", "Basket.cs"),
                WindowAction::Activate,
            )
            .at(at(10))
            .until(at(11))
            .with_document(document("C:\\Shop\\Basket.cs")),
        ];

        let intervals = run(&mut transformer(), &events);

        assert_eq!(spans(&intervals), vec![(0, 11)]);
    }

    #[test]
    fn test_typing_commands() {
        let events = vec![
            reading(0, 1, "File1.cs"),
            Event::command("TextControl.Delete")
                .at(at(2))
                .until(at(3))
                .with_document(document("File1.cs")),
        ];

        let intervals = run(&mut transformer(), &events);

        assert_eq!(
            interactions(&intervals)[1],
            ("File1.cs".to_string(), FileInteractionType::Typing)
        );
    }

    #[test]
    fn test_project_follows_solution() {
        let solution = |secs: i64, action: SolutionAction| {
            Event::new(EventPayload::Solution {
                action,
                target: Some("Shop.sln".to_string()),
            })
            .at(at(secs))
            .until(at(secs))
        };

        let mut transformer = transformer();
        let opened = run(
            &mut transformer,
            &[typing(0, 1, "File1.cs"), solution(1, SolutionAction::Opened), typing(2, 3, "File1.cs")],
        );
        assert_eq!(spans(&opened), vec![(0, 3)]);
        assert_eq!(opened[0].project.as_deref(), Some("Shop.sln"));

        let closed = run(
            &mut transformer,
            &[
                solution(4, SolutionAction::Opened),
                typing(5, 6, "File1.cs"),
                solution(7, SolutionAction::Closed),
                typing(8, 9, "File1.cs"),
            ],
        );
        assert_eq!(spans(&closed), vec![(5, 9)]);
        assert_eq!(closed[0].project, None);
    }

    #[test]
    fn test_document_type_upgraded_by_test_run() {
        let test = TestCaseResult {
            test_method: TestMethodName::new("Shop.Tests", "Shop.Tests.BasketTest", "AddsItem"),
            parameters: String::new(),
            start_time: None,
            duration_ms: 500,
            result: TestResult::Success,
        };
        let events = vec![
            reading(0, 1, "C:\\Shop.Tests\\BasketTest.cs"),
            Event::test_run(vec![test]).at(at(2)).until(at(3)),
            reading(4, 5, "C:\\Shop.Tests\\BasketTest.cs"),
        ];

        let intervals = run(&mut transformer(), &events);

        let file_types: Vec<DocumentType> = intervals
            .iter()
            .map(|interval| match interval.kind {
                IntervalKind::FileInteraction { file_type, .. } => file_type,
                _ => DocumentType::Undefined,
            })
            .collect();
        // the open interval is upgraded in place
        assert_eq!(file_types, vec![DocumentType::Test]);
    }
}
