//! The driver seam.
//!
//! Everything the extraction core needs from a browser-automation driver
//! fits in four calls: evaluate script in the page, read the serialized
//! page, report the URL, and wait for a load state. The concrete driver
//! (CDP, WebDriver, an in-memory fixture) lives behind this trait.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Load states the session waits on after interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    NetworkIdle,
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Evaluate a script in the active page and return its JSON value.
    /// `args` is passed as the script's single argument.
    async fn evaluate(&self, script: &str, args: Value) -> Result<Value>;

    /// Serialized HTML of the active page.
    async fn content(&self) -> Result<String>;

    /// Current page URL.
    async fn url(&self) -> Result<String>;

    /// Wait for a load state; resolves early if already reached.
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;
}
