//! Page provider collaborator
//!
//! The host side of a tab: whatever can navigate, evaluate script and
//! capture pixels. The agent-browser CLI is one implementation; an embedding
//! browser would supply its own.

use async_trait::async_trait;
use serde_json::Value;

use crate::automation::action::BoundingBox;
use crate::core::{PilotError, Result};

#[async_trait]
pub trait PageProvider: Send + Sync {
    /// Load `url` in the tab
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Evaluate a script in the page and return its completion value
    async fn evaluate_script(&self, script: &str) -> Result<Value>;

    /// Capture the viewport, or only `rect` when given. Returns encoded image bytes.
    async fn capture_image(&self, rect: Option<BoundingBox>) -> Result<Vec<u8>>;

    /// URL of the document currently loaded, if known
    async fn current_url(&self) -> Result<Option<String>>;

    /// Bring another tab to the front
    async fn switch_tab(&self, target: &str) -> Result<()> {
        Err(PilotError::page(format!(
            "tab switching is not supported by this page (requested {})",
            target
        )))
    }
}
