use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use leadscout_common::LeadScoutError;

use crate::extract::{extract_detail_fields, ExtractedFields};
use crate::render::{wait_for_any, RenderEngine, RenderResult};

/// Selectors that signal a profile detail page has rendered.
pub const DETAIL_READY_SELECTORS: &[&str] = &["h1", "main", "body"];

// ---------------------------------------------------------------------------
// EnrichmentBudget
// ---------------------------------------------------------------------------

/// Run-wide ceiling on field-backfill detail fetches. Never reset between
/// batches.
pub struct EnrichmentBudget {
    cap: u32,
    used: AtomicU32,
}

impl EnrichmentBudget {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            used: AtomicU32::new(0),
        }
    }

    /// Reserve one detail fetch. Returns false once the cap is reached.
    pub fn try_acquire(&self) -> bool {
        let acquired = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.cap).then_some(used + 1)
            })
            .is_ok();
        if !acquired {
            debug!(cap = self.cap, "Enrichment cap reached");
        }
        acquired
    }

    pub fn attempted(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u32 {
        self.cap.saturating_sub(self.attempted())
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub fn log_status(&self) {
        info!(
            attempted = self.attempted(),
            remaining = self.remaining(),
            cap = self.cap,
            "Enrichment budget status"
        );
    }
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Fetches a profile detail page in an isolated context.
pub struct Enricher {
    element_wait: Duration,
}

impl Enricher {
    pub fn new(element_wait: Duration) -> Self {
        Self { element_wait }
    }

    /// Read name, headline and location from the detail page at `url`.
    ///
    /// The detail context is closed on every path, so focus returns to the
    /// listing page whether or not the fetch succeeded.
    pub async fn enrich(
        &self,
        engine: &mut dyn RenderEngine,
        url: &str,
    ) -> Result<ExtractedFields, LeadScoutError> {
        let html = read_isolated(engine, url, DETAIL_READY_SELECTORS, self.element_wait).await?;
        let fields = extract_detail_fields(&html);
        debug!(
            url,
            name = fields.name.as_str(),
            headline = fields.headline.as_str(),
            location = fields.location.as_str(),
            "Detail fields extracted"
        );
        Ok(fields)
    }
}

/// Open `url` in a new context, wait for any of `ready`, read the document,
/// then close the context regardless of outcome.
pub(crate) async fn read_isolated(
    engine: &mut dyn RenderEngine,
    url: &str,
    ready: &[&'static str],
    wait: Duration,
) -> Result<String, LeadScoutError> {
    let failure = |reason: String| LeadScoutError::EnrichmentFailure {
        url: url.to_string(),
        reason,
    };

    let context = engine
        .open_context(url)
        .await
        .map_err(|e| failure(e.to_string()))?;

    let outcome = read_focused(engine, ready, wait).await;

    if let Err(e) = engine.close_context(context).await {
        warn!(url, context = %context, error = %e, "Failed to close detail context");
    }

    outcome.map_err(|e| failure(e.to_string()))
}

async fn read_focused(
    engine: &mut dyn RenderEngine,
    ready: &[&'static str],
    wait: Duration,
) -> RenderResult<String> {
    if wait_for_any(engine, ready, wait).await?.is_none() {
        debug!("Detail page never showed a ready marker");
    }
    engine.document().await
}
