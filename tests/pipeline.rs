//! End-to-end run over a multi-session archive through the batch layer

use chrono::{DateTime, TimeZone, Utc};
use ide_intervals::batch::{ArchiveReader, BatchProcessor};
use ide_intervals::schema::{
    DebuggerMode, DocumentAction, DocumentName, EventPayload, IdePhase, TestCaseResult, TestMethodName,
    TestResult, WindowAction, WindowName, MAIN_WINDOW_TYPE,
};
use ide_intervals::types::{DocumentType, FileInteractionType, PerspectiveType};
use ide_intervals::{BatchConfig, Event, Interval, IntervalKind};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::path::Path;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn event(payload: EventPayload, session: &str, start: i64, end: i64) -> Event {
    Event::new(payload)
        .at(at(start))
        .until(at(end))
        .in_session(session)
}

fn session_events() -> Vec<Event> {
    let main = WindowName::new(MAIN_WINDOW_TYPE, "Shop - Microsoft Visual Studio");
    let basket = DocumentName::new("CSharp", "C:\\Shop\\Basket.cs");
    let basket_test = DocumentName::new("CSharp", "C:\\Shop.Tests\\BasketTest.cs");
    let test = TestCaseResult {
        test_method: TestMethodName::new("Shop.Tests", "Shop.Tests.BasketTest", "AddsItem"),
        parameters: String::new(),
        start_time: None,
        duration_ms: 2000,
        result: TestResult::Failed,
    };

    vec![
        event(EventPayload::IdeState { phase: IdePhase::Startup }, "s1", 0, 0),
        event(
            EventPayload::Document {
                action: DocumentAction::Opened,
                document: Some(basket.clone()),
            },
            "s1",
            1,
            2,
        )
        .with_document(basket.clone()),
        // duplicate command from a second IDE component
        Event::command("VsAction:1:Edit.Copy")
            .at(at(3))
            .until(at(4))
            .in_session("s1")
            .with_document(basket.clone()),
        Event::command("ReSharper:Edit.Copy")
            .at(at(3))
            .in_session("s1")
            .with_document(basket.clone()),
        event(
            EventPayload::Edit {
                number_of_changes: 2,
                size_of_changes: 10,
            },
            "s2",
            4,
            60,
        )
        .with_document(basket_test.clone()),
        event(
            EventPayload::TestRun {
                was_aborted: false,
                tests: vec![test],
            },
            "s1",
            6,
            8,
        ),
        event(
            EventPayload::Debugger {
                mode: DebuggerMode::Run,
                reason: None,
            },
            "s1",
            10,
            10,
        ),
        event(
            EventPayload::Debugger {
                mode: DebuggerMode::Design,
                reason: None,
            },
            "s1",
            14,
            14,
        ),
        event(EventPayload::Activity, "s2", 15, 18).with_document(basket_test),
        Event::window(main, WindowAction::Deactivate)
            .at(at(20))
            .in_session("s1"),
        event(EventPayload::IdeState { phase: IdePhase::Shutdown }, "s1", 22, 22),
    ]
}

fn write_archive(path: &Path, events: &[Event]) {
    let mut file = fs::File::create(path).unwrap();
    for event in events {
        writeln!(file, "{}", serde_json::to_string(event).unwrap()).unwrap();
    }
    writeln!(file, "{{\"this is\": \"not an event\"}}").unwrap();
}

fn read_intervals(path: &Path) -> Vec<Interval> {
    let bytes = zstd::stream::decode_all(fs::File::open(path).unwrap()).unwrap();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn batch_over_multi_session_archive() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_archive(&input.path().join("user-17.ndjson"), &session_events());

    let report = BatchProcessor::new(BatchConfig::default())
        .run_directory(input.path(), output.path())
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.processed, 1);
    assert_eq!(report.malformed_lines, 1);

    let intervals = read_intervals(&output.path().join("user-17/0.ndjson.zst"));
    assert_eq!(report.intervals, intervals.len());

    // every interval belongs to the archive's user and has a duration
    for interval in &intervals {
        assert_eq!(interval.user_id.as_deref(), Some("user-17"));
        assert!(interval.end > interval.start, "{:?}", interval);
    }

    // no leaf produces overlapping intervals within a session
    for (i, a) in intervals.iter().enumerate() {
        for b in &intervals[i + 1..] {
            if a.session_id == b.session_id && a.kind.name() == b.kind.name() {
                assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    let test_runs: Vec<&Interval> = intervals
        .iter()
        .filter(|i| i.kind.name() == "test_run")
        .collect();
    assert_eq!(test_runs.len(), 1);
    match &test_runs[0].kind {
        IntervalKind::TestRun {
            project_name,
            result,
            ..
        } => {
            assert_eq!(project_name, "Shop.Tests");
            assert_eq!(*result, TestResult::Failed);
        }
        other => panic!("unexpected interval kind {:?}", other),
    }

    let ide_open: Vec<(&str, DateTime<Utc>, DateTime<Utc>)> = intervals
        .iter()
        .filter(|i| i.kind == IntervalKind::IdeOpen)
        .map(|i| (i.session_id.as_str(), i.start, i.end))
        .collect();
    assert_eq!(ide_open, vec![("s1", at(0), at(22)), ("s2", at(4), at(18))]);

    let focus: Vec<(DateTime<Utc>, DateTime<Utc>)> = intervals
        .iter()
        .filter(|i| i.kind == IntervalKind::Focus && i.session_id == "s1")
        .map(|i| (i.start, i.end))
        .collect();
    assert_eq!(focus, vec![(at(0), at(20))]);

    let debug: Vec<(DateTime<Utc>, DateTime<Utc>)> = intervals
        .iter()
        .filter(|i| {
            i.kind
                == IntervalKind::Perspective {
                    perspective: PerspectiveType::Debug,
                }
        })
        .map(|i| (i.start, i.end))
        .collect();
    assert_eq!(debug, vec![(at(10), at(14))]);

    // the edit in s2 continues as typing; its own duration is discarded
    let typing: Vec<(DateTime<Utc>, DateTime<Utc>, DocumentType)> = intervals
        .iter()
        .filter_map(|i| match &i.kind {
            IntervalKind::FileInteraction {
                interaction: FileInteractionType::Typing,
                file_type,
                ..
            } if i.session_id == "s2" => Some((i.start, i.end, *file_type)),
            _ => None,
        })
        .collect();
    assert_eq!(typing, vec![(at(4), at(18), DocumentType::FilenameTest)]);
}

#[test]
fn archive_round_trip_keeps_event_order() {
    let input = tempfile::tempdir().unwrap();
    let path = input.path().join("user.ndjson");
    let events = session_events();
    write_archive(&path, &events);

    let mut reader = ArchiveReader::open(&path).unwrap();
    let read: Vec<Event> = reader.by_ref().collect::<Result<_, _>>().unwrap();

    assert_eq!(read, events);
    assert_eq!(reader.malformed(), 1);
}
