//! Output audience of a rendered page.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which audience a piece of output is rendered for.
///
/// Every course part is published twice: once for students and once for
/// instructors, the latter including instructor-only blocks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The public student variant.
    Student,
    /// The instructor variant, a superset of the student variant.
    Instructor,
}

impl Mode {
    /// Returns `true` for [`Mode::Instructor`].
    pub fn is_instructor(self) -> bool {
        self == Mode::Instructor
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Student => write!(f, "student"),
            Mode::Instructor => write!(f, "instructor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Mode::Student.to_string(), "student");
        assert_eq!(Mode::Instructor.to_string(), "instructor");
    }

    #[test]
    fn is_instructor() {
        assert!(Mode::Instructor.is_instructor());
        assert!(!Mode::Student.is_instructor());
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Mode::Instructor).unwrap();
        assert_eq!(json, "\"instructor\"");
        let back: Mode = serde_json::from_str("\"student\"").unwrap();
        assert_eq!(back, Mode::Student);
    }
}
