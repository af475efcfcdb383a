//! Diagnostic creation, severity management, and rendering.
//!
//! Course content problems (malformed topmatter, unknown macros, missing
//! include files) are never fatal. They become structured [`Diagnostic`]s that
//! the thread-safe [`DiagnosticSink`] accumulates over a whole build run, and
//! [`DiagnosticRenderer`] implementations format them for the terminal or as
//! JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
