//! IDE interaction event schema
//!
//! One `Event` is one observed interaction recorded by the IDE plugin: a
//! command invocation, an edit, a window focus change, a debugger transition,
//! a test run, and so on. Events share a common header (timestamps, session,
//! active window and document) and carry a kind-specific payload.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Window type of the IDE main window
pub const MAIN_WINDOW_TYPE: &str = "vsWindowTypeMainWindow";

/// Identifier of a document, formatted as `"<language> <path>"`
/// (for example `"CSharp C:\\Project\\Service.cs"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentName(pub String);

impl DocumentName {
    pub fn new(language: &str, path: &str) -> Self {
        DocumentName(format!("{} {}", language, path))
    }

    pub fn language(&self) -> &str {
        self.0.split_once(' ').map(|(lang, _)| lang).unwrap_or("")
    }

    /// Full path of the document (everything after the language prefix)
    pub fn path(&self) -> &str {
        self.0.split_once(' ').map(|(_, path)| path).unwrap_or(&self.0)
    }

    /// Last path segment, accepting both `/` and `\` as separators
    pub fn file_name(&self) -> &str {
        let path = self.path();
        path.rsplit(['/', '\\']).next().unwrap_or(path)
    }

    /// File name without its extension
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// Directory segments of the path, excluding the file name
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        let mut segments: Vec<&str> = self
            .path()
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect();
        segments.pop();
        segments.into_iter()
    }
}

/// Identifier of an IDE window, formatted as `"<window type> <caption>"`
/// (for example `"vsWindowTypeDocument Service.cs"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowName(pub String);

impl WindowName {
    pub fn new(window_type: &str, caption: &str) -> Self {
        WindowName(format!("{} {}", window_type, caption))
    }

    pub fn window_type(&self) -> &str {
        self.0.split_once(' ').map(|(t, _)| t).unwrap_or(&self.0)
    }

    pub fn caption(&self) -> &str {
        self.0.split_once(' ').map(|(_, c)| c).unwrap_or("")
    }

    pub fn is_main_window(&self) -> bool {
        self.window_type() == MAIN_WINDOW_TYPE
    }
}

/// Debugger mode after a debugger transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebuggerMode {
    Design,
    Run,
    Break,
    ExceptionThrown,
    ExceptionNotHandled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    Opened,
    Saved,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAction {
    Create,
    Activate,
    Move,
    Close,
    Deactivate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionAction {
    Opened,
    Closing,
    Closed,
}

/// Lifecycle phase reported by the IDE itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdePhase {
    Startup,
    Runtime,
    Shutdown,
}

/// Outcome of a single test case (or an aggregate of several)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    #[default]
    Unknown,
    Success,
    Failed,
    Error,
    Ignored,
}

/// Fully qualified test method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMethodName {
    /// Assembly (test project) declaring the method
    pub assembly: String,
    /// Fully qualified name of the declaring class
    pub class: String,
    /// Method name
    pub method: String,
}

impl TestMethodName {
    pub fn new(assembly: &str, class: &str, method: &str) -> Self {
        Self {
            assembly: assembly.to_string(),
            class: class.to_string(),
            method: method.to_string(),
        }
    }

    /// Declaring class without its namespace
    pub fn simple_class_name(&self) -> &str {
        self.class.rsplit('.').next().unwrap_or(&self.class)
    }
}

/// Result of one executed test case inside a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_method: TestMethodName,
    /// Parameters of a parameterized test case, empty otherwise
    #[serde(default)]
    pub parameters: String,
    /// Start of the test case; back-filled by the normalizer when missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub result: TestResult,
}

impl TestCaseResult {
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms.max(0))
    }
}

/// Kind-specific event payload, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Command {
        command_id: String,
    },
    Edit {
        #[serde(default)]
        number_of_changes: u32,
        #[serde(default)]
        size_of_changes: u32,
    },
    Build {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    Debugger {
        mode: DebuggerMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Document {
        action: DocumentAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document: Option<DocumentName>,
    },
    Window {
        window: WindowName,
        action: WindowAction,
    },
    Navigation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    Completion {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        terminated_state: Option<String>,
    },
    TestRun {
        #[serde(default)]
        was_aborted: bool,
        #[serde(default)]
        tests: Vec<TestCaseResult>,
    },
    Solution {
        action: SolutionAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    IdeState {
        phase: IdePhase,
    },
    Activity,
}

impl EventPayload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            EventPayload::Command { .. } => "command",
            EventPayload::Edit { .. } => "edit",
            EventPayload::Build { .. } => "build",
            EventPayload::Debugger { .. } => "debugger",
            EventPayload::Document { .. } => "document",
            EventPayload::Window { .. } => "window",
            EventPayload::Navigation { .. } => "navigation",
            EventPayload::Completion { .. } => "completion",
            EventPayload::TestRun { .. } => "test_run",
            EventPayload::Solution { .. } => "solution",
            EventPayload::IdeState { .. } => "ide_state",
            EventPayload::Activity => "activity",
        }
    }

    /// Edit-like events report a duration that cannot be trusted
    pub fn is_edit_like(&self) -> bool {
        matches!(self, EventPayload::Edit { .. })
    }
}

/// A single recorded IDE interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_at: Option<DateTime<Utc>>,
    /// Identifier shared by all events of one IDE run
    #[serde(default)]
    pub session_id: String,
    /// Version of the plugin that recorded the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kave_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_window: Option<WindowName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_document: Option<DocumentName>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Create an event without timestamps or session
    pub fn new(payload: EventPayload) -> Self {
        Event {
            triggered_at: None,
            terminated_at: None,
            session_id: String::new(),
            kave_version: None,
            active_window: None,
            active_document: None,
            payload,
        }
    }

    pub fn command(command_id: impl Into<String>) -> Self {
        Event::new(EventPayload::Command {
            command_id: command_id.into(),
        })
    }

    pub fn window(window: WindowName, action: WindowAction) -> Self {
        Event::new(EventPayload::Window { window, action })
    }

    pub fn debugger(mode: DebuggerMode) -> Self {
        Event::new(EventPayload::Debugger { mode, reason: None })
    }

    pub fn test_run(tests: Vec<TestCaseResult>) -> Self {
        Event::new(EventPayload::TestRun {
            was_aborted: false,
            tests,
        })
    }

    /// Set the trigger timestamp
    pub fn at(mut self, triggered_at: DateTime<Utc>) -> Self {
        self.triggered_at = Some(triggered_at);
        self
    }

    /// Set the termination timestamp
    pub fn until(mut self, terminated_at: DateTime<Utc>) -> Self {
        self.terminated_at = Some(terminated_at);
        self
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_document(mut self, document: DocumentName) -> Self {
        self.active_document = Some(document);
        self
    }

    pub fn with_window(mut self, window: WindowName) -> Self {
        self.active_window = Some(window);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.kave_version = Some(version.into());
        self
    }

    /// View of this event with both timestamps resolved, if present
    pub fn timed(&self) -> Option<TimedEvent<'_>> {
        match (self.triggered_at, self.terminated_at) {
            (Some(triggered_at), Some(terminated_at)) => Some(TimedEvent {
                event: self,
                triggered_at,
                terminated_at,
            }),
            _ => None,
        }
    }

    /// Validate the event header and payload
    pub fn validate(&self) -> Result<(), ValidationError> {
        let triggered_at = self.triggered_at.ok_or(ValidationError::MissingTriggeredAt)?;

        if let Some(terminated_at) = self.terminated_at {
            if terminated_at < triggered_at {
                return Err(ValidationError::TerminatedBeforeTriggered {
                    triggered_at,
                    terminated_at,
                });
            }
        }

        if self.session_id.is_empty() {
            return Err(ValidationError::MissingSessionId);
        }

        match &self.payload {
            EventPayload::Command { command_id } if command_id.is_empty() => {
                Err(ValidationError::EmptyCommandId)
            }
            _ => Ok(()),
        }
    }
}

/// An event whose trigger and termination timestamps are both known.
///
/// Transformers only ever see events through this view, so they never have
/// to deal with missing timestamps.
#[derive(Debug, Clone, Copy)]
pub struct TimedEvent<'a> {
    pub event: &'a Event,
    pub triggered_at: DateTime<Utc>,
    pub terminated_at: DateTime<Utc>,
}

impl Deref for TimedEvent<'_> {
    type Target = Event;

    fn deref(&self) -> &Event {
        self.event
    }
}

/// Validation errors for recorded events
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Event has no trigger timestamp")]
    MissingTriggeredAt,

    #[error("Event terminated at {terminated_at} before it was triggered at {triggered_at}")]
    TerminatedBeforeTriggered {
        triggered_at: DateTime<Utc>,
        terminated_at: DateTime<Utc>,
    },

    #[error("Event has no session identifier")]
    MissingSessionId,

    #[error("Command event has an empty command id")]
    EmptyCommandId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_document_name_parts() {
        let doc = DocumentName::new("CSharp", "C:\\Solution\\Tests\\ServiceTest.cs");

        assert_eq!(doc.language(), "CSharp");
        assert_eq!(doc.file_name(), "ServiceTest.cs");
        assert_eq!(doc.file_stem(), "ServiceTest");
        assert_eq!(doc.directories().collect::<Vec<_>>(), vec!["C:", "Solution", "Tests"]);
    }

    #[test]
    fn test_window_name_parts() {
        let main = WindowName::new(MAIN_WINDOW_TYPE, "Microsoft Visual Studio");
        let doc = WindowName::new("vsWindowTypeDocument", "Service.cs");

        assert!(main.is_main_window());
        assert!(!doc.is_main_window());
        assert_eq!(doc.caption(), "Service.cs");
    }

    #[test]
    fn test_deserialize_tagged_event() {
        let json = r#"{
            "triggered_at": "2023-11-14T22:13:20Z",
            "session_id": "s1",
            "active_document": "CSharp C:\\A.cs",
            "type": "window",
            "window": "vsWindowTypeMainWindow Visual Studio",
            "action": "deactivate"
        }"#;

        let event: Event = serde_json::from_str(json).unwrap();

        assert_eq!(event.triggered_at, Some(at(0)));
        assert_eq!(event.terminated_at, None);
        assert_eq!(event.payload.kind_name(), "window");
        match &event.payload {
            EventPayload::Window { window, action } => {
                assert!(window.is_main_window());
                assert_eq!(*action, WindowAction::Deactivate);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_timed_requires_both_timestamps() {
        let event = Event::command("a:b:id").at(at(1));
        assert!(event.timed().is_none());

        let event = event.until(at(2));
        let timed = event.timed().unwrap();
        assert_eq!(timed.triggered_at, at(1));
        assert_eq!(timed.terminated_at, at(2));
        assert_eq!(timed.session_id, "");
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            Event::command("x").validate(),
            Err(ValidationError::MissingTriggeredAt)
        ));
        assert!(matches!(
            Event::command("x").at(at(2)).until(at(1)).in_session("s").validate(),
            Err(ValidationError::TerminatedBeforeTriggered { .. })
        ));
        assert!(matches!(
            Event::command("").at(at(1)).in_session("s").validate(),
            Err(ValidationError::EmptyCommandId)
        ));
        assert!(Event::command("x").at(at(1)).in_session("s").validate().is_ok());
    }
}
