//! Diagnostic codes with category prefixes for structured error identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Error diagnostics, prefixed with `E`.
    Error,
    /// Warning diagnostics, prefixed with `W`.
    Warning,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g., `E101`, `W203`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// The `---` line between topmatter and content is missing.
    pub const MISSING_SEPARATOR: Self = Self::new(Category::Error, 101);
    /// The topmatter is not a YAML mapping.
    pub const MALFORMED_TOPMATTER: Self = Self::new(Category::Error, 102);
    /// A `stage:` value that the course does not declare.
    pub const UNKNOWN_STAGE: Self = Self::new(Category::Error, 103);
    /// Two parts share the same name.
    pub const DUPLICATE_PART: Self = Self::new(Category::Error, 104);
    /// A source file that a part needs does not exist.
    pub const MISSING_FILE: Self = Self::new(Category::Error, 105);
    /// A macro call with the wrong number of arguments.
    pub const MACRO_ARGUMENTS: Self = Self::new(Category::Error, 106);
    /// A required topmatter attribute is absent.
    pub const MISSING_ATTRIBUTE: Self = Self::new(Category::Error, 107);
    /// A topmatter attribute has an unusable value.
    pub const BAD_ATTRIBUTE: Self = Self::new(Category::Error, 108);
    /// `assumes` or `requires` names no task or taskgroup.
    pub const UNKNOWN_TASK_REFERENCE: Self = Self::new(Category::Error, 109);
    /// The `assumes`/`requires` links of some tasks form a cycle.
    pub const DEPENDENCY_CYCLE: Self = Self::new(Category::Error, 110);
    /// A macro name nobody has defined.
    pub const UNKNOWN_MACRO: Self = Self::new(Category::Warning, 201);
    /// An `[INCLUDE::...]` target that cannot be read.
    pub const INCLUDE_NOT_FOUND: Self = Self::new(Category::Warning, 202);
    /// A `*.zip` entry that is a plain file, not a directory.
    pub const ZIP_NOT_A_DIR: Self = Self::new(Category::Warning, 203);
    /// A block macro opened without being closed, or closed without being opened.
    pub const UNBALANCED_BLOCK: Self = Self::new(Category::Warning, 204);

    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Error.prefix(), 'E');
        assert_eq!(Category::Warning.prefix(), 'W');
    }

    #[test]
    fn display_format() {
        assert_eq!(DiagnosticCode::MISSING_SEPARATOR.to_string(), "E101");
        assert_eq!(DiagnosticCode::new(Category::Warning, 3).to_string(), "W003");
    }

    #[test]
    fn predefined_codes_match_category() {
        assert_eq!(DiagnosticCode::UNKNOWN_STAGE.category, Category::Error);
        assert_eq!(DiagnosticCode::UNKNOWN_MACRO.category, Category::Warning);
        assert_eq!(DiagnosticCode::DEPENDENCY_CYCLE.to_string(), "E110");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::MALFORMED_TOPMATTER;
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
