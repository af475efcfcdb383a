//! Parsing and validation of `sedrila.toml` course configuration files.
//!
//! This crate reads the course description (title, stages, chapters and
//! taskgroups) together with the build settings and produces a
//! strongly-typed [`CourseConfig`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILENAME};
pub use types::*;
