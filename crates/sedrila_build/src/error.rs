//! Errors that abort an author run.

use std::path::PathBuf;

use sedrila_cache::CacheError;
use sedrila_common::InternalError;
use sedrila_config::ConfigError;

/// Errors that stop a build before it completes.
///
/// Problems in the course content are not errors: they are reported as
/// diagnostics and the build continues.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cache could not be opened or written.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The target directory cannot be used.
    #[error("unusable target directory {path}: {reason}")]
    TargetDir {
        /// The offending directory.
        path: PathBuf,
        /// Why it was refused.
        reason: String,
    },

    /// Writing output failed, or an internal invariant broke.
    #[error(transparent)]
    Internal(#[from] InternalError),
}
