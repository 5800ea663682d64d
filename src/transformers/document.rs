//! Classification of documents into production and test code

use crate::schema::DocumentName;
use crate::types::DocumentType;
use std::collections::HashSet;

const TEST_FRAMEWORK_DIRECTORIES: [&str; 3] = ["nunit", "xunit", "mstest"];

/// Most specific classification the document name supports.
///
/// `known_test_classes` holds simple class names seen in test runs so far; a
/// document whose file stem is one of them is a confirmed test.
pub fn classify_document(
    document: &DocumentName,
    known_test_classes: &HashSet<String>,
) -> DocumentType {
    let stem = document.file_stem();
    if stem.is_empty() {
        return DocumentType::Undefined;
    }

    if known_test_classes.contains(stem) {
        return DocumentType::Test;
    }

    let directories: Vec<String> = document
        .directories()
        .map(|dir| dir.to_ascii_lowercase())
        .collect();

    if directories
        .iter()
        .any(|dir| TEST_FRAMEWORK_DIRECTORIES.contains(&dir.as_str()))
    {
        DocumentType::TestFramework
    } else if stem.ends_with("Test") || stem.ends_with("Tests") {
        DocumentType::FilenameTest
    } else if directories.iter().any(|dir| dir.contains("test")) {
        DocumentType::PathnameTest
    } else {
        DocumentType::Production
    }
}
