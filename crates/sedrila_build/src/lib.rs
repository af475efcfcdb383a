//! The incremental build engine for course material.
//!
//! Every input, intermediate value and output of a build is an [`Element`]
//! of one of a closed set of [`Kind`]s. The [`Directory`] owns all elements
//! in an arena, indexes them per kind, and builds them kind by kind in a
//! fixed order in which dependencies always come first. Each element decides
//! from the [`CacheStore`](sedrila_cache::CacheStore) and the states of its
//! dependencies whether it must be rebuilt.
//!
//! [`run_author`] drives a complete run: load the configuration, register
//! the course, build, write the course metadata, purge stale files, and
//! persist the cache.

#![warn(missing_docs)]

pub mod author;
pub mod course;
pub mod directory;
pub mod element;
pub mod error;
pub mod kind;
pub mod render;
pub mod template;

mod build;
mod outputs;
mod parts;
mod pieces;
mod sources;
mod tasks;

pub use author::{run_author, AuthorOptions, BuildReport, ElementReport};
pub use course::CourseBuilder;
pub use directory::{Directory, Settings};
pub use element::{Detail, Element, ElementId, PartInfo};
pub use error::BuildError;
pub use kind::{Kind, Role};
pub use tasks::{TaskInfo, DIFFICULTY_LEVELS};
pub use render::{MarkdownRenderer, Problem, RenderRequest, Rendered, Renderer};
pub use template::{DefaultTemplate, Page, PageTemplate};
