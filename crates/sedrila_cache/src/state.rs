//! The tri-state freshness classification shared by cache entries and build elements.

use serde::Serialize;
use std::fmt;

/// Freshness of a file, cache entry or build element.
///
/// Before an element is built, `Missing` and `Changed` mean "must build";
/// afterwards `Changed` means "was (re)built this run". The variants are
/// ordered by conservatism: `Unchanged < Changed < Missing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Older than the reference time and not written this run.
    Unchanged,
    /// Newer than the reference time, marked dirty, or written this run.
    Changed,
    /// Absent, or never recorded in the cache.
    Missing,
}

impl State {
    /// Whether this state requires (or records) a build.
    pub fn needs_build(self) -> bool {
        self != State::Unchanged
    }

    /// The lowercase name used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            State::Unchanged => "unchanged",
            State::Changed => "changed",
            State::Missing => "missing",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
