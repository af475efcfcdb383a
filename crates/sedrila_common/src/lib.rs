//! Shared foundational types used across the sedrila course builder.
//!
//! This crate provides the render [`Mode`] that distinguishes student from
//! instructor output, and the result type for unrecoverable internal failures.

#![warn(missing_docs)]

pub mod mode;
pub mod result;

pub use mode::Mode;
pub use result::{InternalError, SedrilaResult};
