//! Common result and error types for the course builder.

use std::path::PathBuf;

/// The standard result type for fallible internal operations.
///
/// `Ok` contains the result value (which may be degraded after error
/// recovery). `Err` indicates an unrecoverable failure that aborts the whole
/// build run, such as an output file that cannot be written. Problems in the
/// course content are reported through the diagnostics sink and the operation
/// still returns `Ok`.
pub type SedrilaResult<T> = Result<T, InternalError>;

/// A failure that aborts the build run.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the failure.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Wraps an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        Self {
            message: format!("I/O error at {}: {err}", path.display()),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
