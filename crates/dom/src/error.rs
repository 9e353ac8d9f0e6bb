//! Error types for the extraction core.
//!
//! Flat hierarchy. Compressor failures are the only kind that is recovered
//! silently (the registry falls back to the default profile).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("HTML parse error: {0}")]
    Parse(String),

    #[error("compressor '{name}' failed: {message}")]
    CompressorFailure { name: String, message: String },

    #[error("compressor profile rejected: {0}")]
    ScriptValidation(String),

    #[error("unknown compressor profile: {0}")]
    ProfileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
