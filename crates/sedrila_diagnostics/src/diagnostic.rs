//! Structured diagnostic messages with severity, codes, and file locations.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A structured diagnostic message about a course source file.
///
/// Each diagnostic includes a severity level, a unique code, the message, and
/// up to two files it concerns. Any file named here is scheduled for forced
/// reprocessing in the next build run so that the message reappears until
/// the problem is fixed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The file the problem was found in, if any.
    pub file: Option<PathBuf>,
    /// A second file involved in the problem (e.g. the other duplicate).
    pub file2: Option<PathBuf>,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic with the given code and message.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a new warning diagnostic with the given code and message.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            file: None,
            file2: None,
            notes: Vec::new(),
        }
    }

    /// Attaches the file this diagnostic is about.
    pub fn in_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    /// Attaches a second involved file.
    pub fn also_in(mut self, file: impl AsRef<Path>) -> Self {
        self.file2 = Some(file.as_ref().to_path_buf());
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// All files this diagnostic names, in order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.file.iter().chain(self.file2.iter()).map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_error() {
        let diag = Diagnostic::error(DiagnosticCode::MISSING_SEPARATOR, "separator missing");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "separator missing");
        assert_eq!(format!("{}", diag.code), "E101");
        assert!(diag.file.is_none());
    }

    #[test]
    fn create_warning() {
        let diag = Diagnostic::warning(DiagnosticCode::UNKNOWN_MACRO, "unknown macro [FOO]");
        assert_eq!(diag.severity, Severity::Warning);
    }

    #[test]
    fn builder_methods() {
        let diag = Diagnostic::error(DiagnosticCode::DUPLICATE_PART, "duplicate task 'a'")
            .in_file("ch/x/a.md")
            .also_in("ch/y/a.md")
            .with_note("task names must be unique across the course");
        assert_eq!(diag.notes.len(), 1);
        let files: Vec<_> = diag.files().collect();
        assert_eq!(files, vec![Path::new("ch/x/a.md"), Path::new("ch/y/a.md")]);
    }

    #[test]
    fn files_empty_without_location() {
        let diag = Diagnostic::warning(DiagnosticCode::UNKNOWN_MACRO, "x");
        assert_eq!(diag.files().count(), 0);
    }
}
