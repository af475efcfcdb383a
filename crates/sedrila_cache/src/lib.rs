//! Persistent build cache for incremental course builds.
//!
//! The [`CacheStore`] maps string keys to typed, individually compressed
//! values and remembers the reference time of the previous run together with
//! the set of files that produced diagnostics. The freshness queries layered
//! on top of it classify files and keys as [`State::Missing`],
//! [`State::Changed`] or [`State::Unchanged`].

#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod freshness;
pub mod state;
pub mod store;

pub use codec::Value;
pub use error::CacheError;
pub use state::State;
pub use store::{cache_key, CacheStore, StoreSummary};
