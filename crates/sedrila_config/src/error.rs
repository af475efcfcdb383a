//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `sedrila.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Two chapters, or two taskgroups, use the same slug.
    #[error("duplicate slug '{0}'")]
    DuplicateSlug(String),

    /// A stage name that is not listed in `course.stages`.
    #[error("unknown stage '{stage}', must be one of {allowed:?}")]
    UnknownStage {
        /// The offending stage name.
        stage: String,
        /// The stages the course declares.
        allowed: Vec<String>,
    },
}
