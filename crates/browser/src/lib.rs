//! Session layer over the extraction core.
//!
//! Drives a live page through the [`PageDriver`] seam: runs the in-page
//! marker script, fetches serialized HTML for the walker, serializes all
//! page access behind a session lock, settles the DOM after interactions
//! and diffs consecutive snapshots.

pub mod benchmark;
pub mod driver;
pub mod error;
pub mod session;

pub use driver::{LoadState, PageDriver};
pub use error::{Result, SessionError};
pub use session::{normalize_url, ActionOutcome, Session};
