//! Batch Scheduler: walks the page range in batches, one render session per batch.
//!
//! States: Idle → BatchStarting → BatchRunning → BatchCooldown → (BatchStarting | Done).
//!
//! Per-page and per-record failures are absorbed here and counted in
//! [`RunStats`]. Only persistence failures and an operator that gives up
//! escape `run`.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use leadscout_common::{CrawlConfig, FileConfig, LeadScoutError, Record};

use crate::activity::ActivityProbe;
use crate::checkpoint::CheckpointStore;
use crate::classifier::Classifier;
use crate::enrichment::{Enricher, EnrichmentBudget};
use crate::extract::{
    extract_cards, extract_fields, lazy_load_script, CardHandle, ListingQuery, RESULT_SELECTORS,
};
use crate::render::{EngineFactory, RenderEngine};
use crate::session::{Operator, SessionStore};
use crate::stats::RunStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    BatchStarting,
    BatchRunning,
    BatchCooldown,
    Done,
}

/// Run-scoped mutable state threaded through every batch.
pub struct RunContext {
    pub checkpoint: CheckpointStore,
    pub budget: EnrichmentBudget,
    pub stats: RunStats,
}

impl RunContext {
    pub fn new(checkpoint: CheckpointStore, max_enrichments: u32) -> Self {
        Self {
            checkpoint,
            budget: EnrichmentBudget::new(max_enrichments),
            stats: RunStats::default(),
        }
    }

    pub fn open(config: &FileConfig) -> Result<Self, LeadScoutError> {
        let checkpoint = CheckpointStore::open(&config.output.dir)?;
        Ok(Self::new(checkpoint, config.crawl.max_enrichments))
    }
}

/// Split `start..=end` into consecutive ranges of at most `batch_size` pages.
pub fn plan_batches(start: u32, end: u32, batch_size: u32) -> Vec<RangeInclusive<u32>> {
    let size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut first = start;
    while first <= end {
        let last = first.saturating_add(size - 1).min(end);
        batches.push(first..=last);
        if last == u32::MAX {
            break;
        }
        first = last + 1;
    }
    batches
}

fn cooldown_delay((min, max): (Duration, Duration)) -> Duration {
    let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
    if hi <= lo {
        return Duration::from_millis(lo);
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}

pub struct BatchScheduler {
    factory: Arc<dyn EngineFactory>,
    operator: Arc<dyn Operator>,
    session: SessionStore,
    login_url: String,
    query: ListingQuery,
    classifier: Classifier,
    enricher: Enricher,
    activity: Option<ActivityProbe>,
    crawl: CrawlConfig,
    profile_marker: String,
    state: BatchState,
}

impl BatchScheduler {
    pub fn from_config(
        config: &FileConfig,
        factory: Arc<dyn EngineFactory>,
        operator: Arc<dyn Operator>,
    ) -> Result<Self, LeadScoutError> {
        config.validate()?;
        let query = ListingQuery::from_config(&config.search, &config.classifier.keywords)?;
        let element_wait = config.crawl.element_wait();
        Ok(Self {
            factory,
            operator,
            session: SessionStore::from_config(&config.session),
            login_url: config
                .session
                .login_url
                .clone()
                .unwrap_or_else(|| config.session.auth_check_url.clone()),
            query,
            classifier: Classifier::from_config(&config.classifier),
            enricher: Enricher::new(element_wait),
            activity: config
                .crawl
                .recent_activity_days
                .map(|days| ActivityProbe::new(days, element_wait)),
            crawl: config.crawl.clone(),
            profile_marker: config.search.profile_path_marker.clone(),
            state: BatchState::Idle,
        })
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    fn transition(&mut self, next: BatchState) {
        debug!(from = ?self.state, to = ?next, "Batch state");
        self.state = next;
    }

    /// Process every configured page, batch by batch.
    pub async fn run(&mut self, ctx: &mut RunContext) -> Result<(), LeadScoutError> {
        let batches = plan_batches(self.crawl.start_page, self.crawl.end_page, self.crawl.batch_size);
        info!(
            start_page = self.crawl.start_page,
            end_page = self.crawl.end_page,
            batches = batches.len(),
            already_processed = ctx.checkpoint.processed_count(),
            "Starting crawl"
        );

        for (index, pages) in batches.iter().enumerate() {
            self.transition(BatchState::BatchStarting);
            ctx.stats.batches += 1;
            info!(batch = index + 1, first = pages.start(), last = pages.end(), "Batch starting");

            let outcome = match self.start_batch(ctx).await {
                Ok(mut engine) => {
                    self.transition(BatchState::BatchRunning);
                    let outcome = self.run_batch(engine.as_mut(), pages.clone(), ctx).await;
                    self.transition(BatchState::BatchCooldown);
                    if let Err(e) = engine.shutdown().await {
                        warn!(error = %e, "Failed to release render session");
                    }
                    outcome
                }
                Err(e) if e.is_fatal() || matches!(e, LeadScoutError::AuthenticationRequired(_)) => {
                    Err(e)
                }
                Err(e) => {
                    warn!(batch = index + 1, error = %e, "Batch could not start, skipping its pages");
                    ctx.stats.pages_failed += pages.end() - pages.start() + 1;
                    self.transition(BatchState::BatchCooldown);
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                self.transition(BatchState::Done);
                return Err(e);
            }

            ctx.checkpoint.verify_flushed();
            info!(
                batch = index + 1,
                processed = ctx.checkpoint.processed_count(),
                qualified = ctx.checkpoint.qualified_count(),
                "Batch complete"
            );

            if index + 1 < batches.len() {
                let delay = cooldown_delay(self.crawl.cooldown_range());
                if !delay.is_zero() {
                    info!(secs = delay.as_secs_f64(), "Cooling down");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.transition(BatchState::Done);
        ctx.stats.total_processed = ctx.checkpoint.processed_count();
        ctx.stats.total_qualified = ctx.checkpoint.qualified_count();
        ctx.budget.log_status();
        Ok(())
    }

    /// Launch a fresh engine, restore the session and get past any login wall.
    async fn start_batch(&self, ctx: &mut RunContext) -> Result<Box<dyn RenderEngine>, LeadScoutError> {
        let mut engine = self.factory.launch().await?;

        if self.session.restore(engine.as_mut()).await {
            debug!("Saved session applied");
        }

        let mut intervened = false;
        while !self.session.is_authenticated(engine.as_mut()).await {
            ctx.stats.manual_logins += 1;
            intervened = true;
            if let Err(e) = self
                .operator
                .await_manual_login(engine.as_mut(), &self.session, &self.login_url)
                .await
            {
                if let Err(shutdown) = engine.shutdown().await {
                    warn!(error = %shutdown, "Failed to release render session");
                }
                return Err(e);
            }
        }

        if intervened {
            self.session.save(engine.as_mut()).await?;
        }
        Ok(engine)
    }

    async fn run_batch(
        &self,
        engine: &mut dyn RenderEngine,
        pages: RangeInclusive<u32>,
        ctx: &mut RunContext,
    ) -> Result<(), LeadScoutError> {
        for page in pages {
            self.process_page(engine, page, ctx).await?;
        }
        Ok(())
    }

    async fn process_page(
        &self,
        engine: &mut dyn RenderEngine,
        page: u32,
        ctx: &mut RunContext,
    ) -> Result<(), LeadScoutError> {
        let url = self.query.page_url(page);
        info!(page, url = url.as_str(), "Scanning page");

        let script = lazy_load_script(self.crawl.scroll_rounds, self.crawl.scroll_pause_ms);
        match engine
            .navigate_with(&url, RESULT_SELECTORS, self.crawl.element_wait(), Some(&script))
            .await
        {
            Ok(Some(selector)) => debug!(page, selector, "Results rendered"),
            Ok(None) => warn!(page, "Result list never appeared"),
            Err(e) => {
                warn!(page, error = %e, "Listing page failed to load");
                ctx.stats.pages_failed += 1;
                return Ok(());
            }
        }

        let html = match engine.document().await {
            Ok(html) => html,
            Err(e) => {
                warn!(page, error = %e, "Could not read listing document");
                ctx.stats.pages_failed += 1;
                return Ok(());
            }
        };
        let landed = engine.current_url().await.unwrap_or_else(|_| url.clone());

        let cards = extract_cards(&html, &landed, &self.profile_marker);
        ctx.stats.pages_scanned += 1;
        ctx.stats.cards_found += cards.len() as u32;
        info!(page, cards = cards.len(), "Cards found");

        for card in cards {
            self.process_card(engine, card, ctx).await?;
        }
        Ok(())
    }

    async fn process_card(
        &self,
        engine: &mut dyn RenderEngine,
        card: CardHandle,
        ctx: &mut RunContext,
    ) -> Result<(), LeadScoutError> {
        if ctx.checkpoint.is_processed(&card.url) {
            ctx.stats.records_skipped += 1;
            debug!(url = card.url.as_str(), "Already processed");
            return Ok(());
        }

        let fields = extract_fields(&card);
        let mut record = Record::new(card.url);
        record.name = fields.name;
        record.headline = fields.headline;
        record.location = fields.location;
        record.open_to_work = fields.open_to_work;

        if record.needs_enrichment() {
            if ctx.budget.try_acquire() {
                ctx.stats.enrichments_attempted += 1;
                match self.enricher.enrich(engine, &record.url).await {
                    Ok(detail) => {
                        record.apply_enrichment(&detail.name, &detail.headline, &detail.location)
                    }
                    Err(e) => {
                        ctx.stats.enrichments_failed += 1;
                        warn!(error = %e, "Enrichment failed, keeping card values");
                    }
                }
            } else {
                debug!(url = record.url.as_str(), "Enrichment cap reached, keeping card values");
            }
        }

        let mut qualified = self.classifier.passes_filters(&record);
        if qualified {
            // Every gated record is probed. The enrichment cap does not apply.
            if let Some(probe) = &self.activity {
                ctx.stats.activity_probes += 1;
                record.recently_active = Some(probe.probe(engine, &record.url).await);
            }
            qualified = self.classifier.qualifies(&record);
        }
        record.set_verdict(qualified);

        ctx.checkpoint.checkpoint(&record)?;
        ctx.stats.records_processed += 1;

        if qualified {
            ctx.stats.records_qualified += 1;
            info!(
                url = record.url.as_str(),
                name = record.name.as_str(),
                headline = record.headline.as_str(),
                location = record.location.as_str(),
                "Qualified"
            );
        } else {
            info!(
                url = record.url.as_str(),
                headline = record.headline.as_str(),
                location = record.location.as_str(),
                "Skipped, not qualified"
            );
        }
        Ok(())
    }
}
