//! Interval types emitted by the pipeline
//!
//! An interval is a classified span of developer activity. All intervals share
//! the same header (start, end, session, owner) and differ in their
//! kind-specific fields.

use crate::schema::TestResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Coarse classification of a document.
///
/// Variants are declared in order of increasing confidence; a classification
/// may only ever move towards the end of this list.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    Undefined,
    Production,
    PathnameTest,
    FilenameTest,
    TestFramework,
    Test,
}

impl DocumentType {
    /// Replace the classification if `candidate` is more specific.
    /// Returns whether an upgrade happened.
    pub fn upgrade(&mut self, candidate: DocumentType) -> bool {
        if candidate > *self {
            *self = candidate;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileInteractionType {
    Reading,
    Typing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerspectiveType {
    Production,
    Debug,
}

impl TestResult {
    /// Severity rank; `Ignored` has none and never raises an aggregate.
    pub fn severity(self) -> Option<u8> {
        match self {
            TestResult::Ignored => None,
            TestResult::Success => Some(0),
            TestResult::Failed => Some(1),
            TestResult::Error => Some(2),
            TestResult::Unknown => Some(3),
        }
    }

    /// Fold one more outcome into a running aggregate.
    pub fn fold(self, next: TestResult) -> TestResult {
        match (self.severity(), next.severity()) {
            (_, None) => self,
            (None, Some(_)) => next,
            (Some(current), Some(candidate)) if candidate > current => next,
            _ => self,
        }
    }
}

/// Outcome of one executed test method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMethodResult {
    pub method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameters: String,
    pub start: DateTime<Utc>,
    pub duration_ms: i64,
    pub result: TestResult,
}

/// Aggregated outcome of all executed methods of one test class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestClassResult {
    pub class: String,
    pub start: DateTime<Utc>,
    pub duration_ms: i64,
    pub result: TestResult,
    pub methods: Vec<TestMethodResult>,
}

/// Kind-specific interval data, tagged by `interval_type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "interval_type", rename_all = "snake_case")]
pub enum IntervalKind {
    /// The IDE process is running
    IdeOpen,
    /// The IDE window has input focus
    Focus,
    /// The user is actively producing events
    UserActive,
    FileInteraction {
        file_name: String,
        file_type: DocumentType,
        interaction: FileInteractionType,
    },
    Perspective {
        perspective: PerspectiveType,
    },
    TestRun {
        project_name: String,
        result: TestResult,
        classes: Vec<TestClassResult>,
    },
}

impl IntervalKind {
    pub fn name(&self) -> &'static str {
        match self {
            IntervalKind::IdeOpen => "ide_open",
            IntervalKind::Focus => "focus",
            IntervalKind::UserActive => "user_active",
            IntervalKind::FileInteraction { .. } => "file_interaction",
            IntervalKind::Perspective { .. } => "perspective",
            IntervalKind::TestRun { .. } => "test_run",
        }
    }
}

/// A classified, non-overlapping span of developer activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub session_id: String,
    /// Filled in by the caller of the pipeline, never by transformers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kave_version: Option<String>,
    #[serde(flatten)]
    pub kind: IntervalKind,
}

impl Interval {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Zero-duration intervals exist only while a span is being built
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    /// Whether the half-open ranges `[start, end)` of both intervals intersect
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn focus(start: i64, end: i64) -> Interval {
        Interval {
            start: at(start),
            end: at(end),
            session_id: "s".to_string(),
            user_id: None,
            project: None,
            kave_version: None,
            kind: IntervalKind::Focus,
        }
    }

    #[test]
    fn test_document_type_only_upgrades() {
        let mut doc = DocumentType::Undefined;

        assert!(doc.upgrade(DocumentType::FilenameTest));
        assert!(!doc.upgrade(DocumentType::Production));
        assert_eq!(doc, DocumentType::FilenameTest);
        assert!(doc.upgrade(DocumentType::Test));
        assert_eq!(doc, DocumentType::Test);
    }

    #[test]
    fn test_result_fold_order() {
        let folded = [TestResult::Success, TestResult::Error, TestResult::Failed]
            .into_iter()
            .fold(TestResult::Success, TestResult::fold);
        assert_eq!(folded, TestResult::Error);

        assert_eq!(TestResult::Failed.fold(TestResult::Ignored), TestResult::Failed);
        assert_eq!(TestResult::Error.fold(TestResult::Unknown), TestResult::Unknown);
        assert_eq!(TestResult::Ignored.fold(TestResult::Success), TestResult::Success);
    }

    #[test]
    fn test_overlap_is_half_open() {
        assert!(!focus(0, 2).overlaps(&focus(2, 3)));
        assert!(focus(0, 3).overlaps(&focus(2, 4)));
        assert!(focus(0, 2).duration() == Duration::seconds(2));
        assert!(focus(2, 2).is_degenerate());
    }

    #[test]
    fn test_serialize_tagged_interval() {
        let mut interval = focus(0, 1);
        interval.kind = IntervalKind::FileInteraction {
            file_name: "A.cs".to_string(),
            file_type: DocumentType::Production,
            interaction: FileInteractionType::Typing,
        };

        let json = serde_json::to_string(&interval).unwrap();
        assert!(json.contains("\"interval_type\":\"file_interaction\""));
        assert!(json.contains("\"interaction\":\"typing\""));

        let back: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(back, interval);
    }
}
