//! Session-layer errors.
//!
//! Everything the facade surfaces as `{status: "error", message}` starts
//! here. Settle timeouts are the one kind swallowed internally (best
//! effort); compressor failures never reach this crate at all.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser is not open")]
    NotOpen,

    #[error("node '{hid}' not found; take a snapshot first")]
    NodeNotFound { hid: String },

    #[error("timed out waiting for {what}")]
    Timeout { what: String },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Dom(#[from] pagelens_dom::DomError),
}
