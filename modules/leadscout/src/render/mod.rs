// Render Engine boundary.
//
// The pipeline never renders anything itself. It issues navigation and script
// commands through `RenderEngine` and reads back rendered HTML. One engine is
// launched per batch via `EngineFactory` and owned exclusively by that batch.
//
// MockEngine (in `testing`) implements the same trait for deterministic tests.

pub mod browserless;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use leadscout_common::{Cookie, LeadScoutError};

pub use browserless::{BrowserlessEngine, BrowserlessFactory};

pub type RenderResult<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("no navigation context with id {0}")]
    NoContext(u32),

    #[error("render engine error: {0}")]
    Engine(String),
}

impl From<RenderError> for LeadScoutError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Timeout { operation, .. } => LeadScoutError::RenderTimeout {
                operation: operation.to_string(),
            },
            other => LeadScoutError::Render(other.to_string()),
        }
    }
}

/// Handle to a navigation context (a tab). The root context is never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

impl ContextId {
    pub const ROOT: ContextId = ContextId(0);
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RenderEngine
// ---------------------------------------------------------------------------

/// A browser session. Every method acts on the focused navigation context.
#[async_trait]
pub trait RenderEngine: Send {
    /// Load `url` in the focused context.
    async fn navigate(&mut self, url: &str) -> RenderResult<()>;

    /// Evaluate a script in the focused page and return its JSON result.
    async fn execute_script(&mut self, script: &str) -> RenderResult<serde_json::Value>;

    /// Wait up to `timeout` for `selector` to match. A miss is `Ok(false)`.
    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> RenderResult<bool>;

    /// Rendered HTML of the focused page.
    async fn document(&mut self) -> RenderResult<String>;

    /// URL the focused context actually landed on (after redirects).
    async fn current_url(&mut self) -> RenderResult<String>;

    async fn cookies(&mut self) -> RenderResult<Vec<Cookie>>;

    async fn set_cookies(&mut self, cookies: Vec<Cookie>) -> RenderResult<()>;

    /// Open `url` in a new context and focus it.
    async fn open_context(&mut self, url: &str) -> RenderResult<ContextId>;

    /// Close a context opened with `open_context` and refocus the previous one.
    async fn close_context(&mut self, id: ContextId) -> RenderResult<()>;

    /// Release the session. The engine is not used afterwards.
    async fn shutdown(&mut self) -> RenderResult<()>;

    /// Load `url`, wait for the first of `ready` to match, then evaluate
    /// `script`. Returns the selector that matched. A failing script is
    /// logged and does not fail the load.
    ///
    /// Engines that can do all of this in one round trip override it.
    async fn navigate_with(
        &mut self,
        url: &str,
        ready: &[&'static str],
        wait: Duration,
        script: Option<&str>,
    ) -> RenderResult<Option<&'static str>> {
        self.navigate(url).await?;
        let per_selector = wait / ready.len().max(1) as u32;
        let mut matched = None;
        for &selector in ready {
            match self.wait_for_element(selector, per_selector).await {
                Ok(true) => {
                    matched = Some(selector);
                    break;
                }
                Ok(false) | Err(RenderError::Timeout { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        if let Some(script) = script {
            if let Err(e) = self.execute_script(script).await {
                warn!(url, error = %e, "Page script failed");
            }
        }
        Ok(matched)
    }
}

/// Produces a fresh engine per batch.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn launch(&self) -> RenderResult<Box<dyn RenderEngine>>;
}

/// Wait for the first of `selectors` to appear, splitting `timeout` across
/// them in order. Returns the selector that matched. Timeouts count as misses.
pub async fn wait_for_any(
    engine: &mut dyn RenderEngine,
    selectors: &[&'static str],
    timeout: Duration,
) -> RenderResult<Option<&'static str>> {
    if selectors.is_empty() {
        return Ok(None);
    }
    let per_selector = timeout / selectors.len() as u32;
    for &selector in selectors {
        match engine.wait_for_element(selector, per_selector).await {
            Ok(true) => return Ok(Some(selector)),
            Ok(false) | Err(RenderError::Timeout { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}
