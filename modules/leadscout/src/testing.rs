// Test doubles for the crawl pipeline.
//
// Two mocks matching the two trait boundaries the scheduler drives:
// - MockEngine (RenderEngine): HashMap-based URL→HTML site with redirects,
//   failures and an optional login gate
// - ScriptedOperator (Operator): "logs in" by handing the engine a cookie
//
// Plus fixture builders for listing and detail pages.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use leadscout_common::{Cookie, LeadScoutError};

use crate::render::browserless::{document_has, merge_cookies};
use crate::render::{ContextId, EngineFactory, RenderEngine, RenderError, RenderResult};
use crate::session::{Operator, SessionStore};

const BLANK_PAGE: &str = "<html><head></head><body></body></html>";

// ---------------------------------------------------------------------------
// MockSite: what every engine launched from the same factory can see
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct MockSite {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    failing: HashSet<String>,
    failing_document: HashSet<String>,
    /// (required cookie name, login URL). Without the cookie every page redirects to login.
    login_gate: Option<(String, String)>,
}

impl MockSite {
    fn resolve(&self, url: &str, cookies: &[Cookie]) -> RenderResult<(String, String)> {
        if self.failing.contains(url) {
            return Err(RenderError::Timeout {
                operation: "navigate",
                timeout: Duration::from_secs(30),
            });
        }
        if let Some((cookie, login_url)) = &self.login_gate {
            if url != login_url && !cookies.iter().any(|c| &c.name == cookie) {
                let html = self.pages.get(login_url).cloned().unwrap_or_else(|| BLANK_PAGE.to_string());
                return Ok((login_url.clone(), html));
            }
        }
        let landed = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        let html = self
            .pages
            .get(&landed)
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string());
        Ok((landed, html))
    }
}

/// Shared call log, visible across every engine a factory launches.
#[derive(Debug, Default)]
pub struct MockLog {
    pub navigations: Vec<String>,
    pub contexts_opened: Vec<String>,
    pub scripts: usize,
    pub launches: usize,
    pub shutdowns: usize,
}

// ---------------------------------------------------------------------------
// MockEngine
// ---------------------------------------------------------------------------

/// In-memory render engine. Unknown URLs render as a blank page.
/// Builder pattern: `.on_page()`, `.redirect()`, `.failing()`, `.login_gate()`.
pub struct MockEngine {
    site: Arc<MockSite>,
    log: Arc<Mutex<MockLog>>,
    cookies: Vec<Cookie>,
    /// Focused context is the last entry. Index 0 is the root.
    stack: Vec<(ContextId, String, String)>,
    next_id: u32,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::with_site(Arc::new(MockSite::default()), Arc::new(Mutex::new(MockLog::default())))
    }

    fn with_site(site: Arc<MockSite>, log: Arc<Mutex<MockLog>>) -> Self {
        Self {
            site,
            log,
            cookies: Vec::new(),
            stack: vec![(ContextId::ROOT, "about:blank".to_string(), BLANK_PAGE.to_string())],
            next_id: 1,
        }
    }

    fn site_mut(&mut self) -> &mut MockSite {
        Arc::make_mut(&mut self.site)
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.site_mut().pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.site_mut().redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Navigation to `url` times out.
    pub fn failing(mut self, url: &str) -> Self {
        self.site_mut().failing.insert(url.to_string());
        self
    }

    /// Navigation to `url` succeeds but reading its document fails.
    pub fn failing_document(mut self, url: &str) -> Self {
        self.site_mut().failing_document.insert(url.to_string());
        self
    }

    /// Every page except `login_url` redirects there until `cookie` is set.
    pub fn login_gate(mut self, cookie: &str, login_url: &str) -> Self {
        self.site_mut().login_gate = Some((cookie.to_string(), login_url.to_string()));
        self
    }

    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        self.log.clone()
    }

    /// Contexts currently open besides the root.
    pub fn open_contexts(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn navigations(&self) -> Vec<String> {
        self.log.lock().unwrap().navigations.clone()
    }

    fn focused(&self) -> &(ContextId, String, String) {
        // Root is never removed.
        &self.stack[self.stack.len() - 1]
    }
}

#[async_trait]
impl RenderEngine for MockEngine {
    async fn navigate(&mut self, url: &str) -> RenderResult<()> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        let (landed, html) = self.site.resolve(url, &self.cookies)?;
        let top = self.stack.len() - 1;
        self.stack[top].1 = landed;
        self.stack[top].2 = html;
        Ok(())
    }

    async fn execute_script(&mut self, _script: &str) -> RenderResult<serde_json::Value> {
        self.log.lock().unwrap().scripts += 1;
        Ok(serde_json::Value::from(0))
    }

    async fn wait_for_element(&mut self, selector: &str, _timeout: Duration) -> RenderResult<bool> {
        Ok(document_has(&self.focused().2, selector))
    }

    async fn document(&mut self) -> RenderResult<String> {
        let (_, url, html) = self.focused();
        if self.site.failing_document.contains(url) {
            return Err(RenderError::Engine(format!("document unavailable for {url}")));
        }
        Ok(html.clone())
    }

    async fn current_url(&mut self) -> RenderResult<String> {
        Ok(self.focused().1.clone())
    }

    async fn cookies(&mut self) -> RenderResult<Vec<Cookie>> {
        Ok(self.cookies.clone())
    }

    async fn set_cookies(&mut self, cookies: Vec<Cookie>) -> RenderResult<()> {
        merge_cookies(&mut self.cookies, cookies);
        Ok(())
    }

    async fn open_context(&mut self, url: &str) -> RenderResult<ContextId> {
        self.log.lock().unwrap().contexts_opened.push(url.to_string());
        let (landed, html) = self.site.resolve(url, &self.cookies)?;
        let id = ContextId(self.next_id);
        self.next_id += 1;
        self.stack.push((id, landed, html));
        Ok(id)
    }

    async fn close_context(&mut self, id: ContextId) -> RenderResult<()> {
        if id == ContextId::ROOT {
            return Err(RenderError::NoContext(id.0));
        }
        let pos = self
            .stack
            .iter()
            .position(|(ctx, _, _)| *ctx == id)
            .ok_or(RenderError::NoContext(id.0))?;
        self.stack.remove(pos);
        Ok(())
    }

    async fn shutdown(&mut self) -> RenderResult<()> {
        self.log.lock().unwrap().shutdowns += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockEngineFactory
// ---------------------------------------------------------------------------

/// Launches fresh engines (empty cookie jar) over a shared site and log.
pub struct MockEngineFactory {
    site: Arc<MockSite>,
    log: Arc<Mutex<MockLog>>,
    fail_launches: Mutex<u32>,
}

impl MockEngineFactory {
    pub fn new(template: MockEngine) -> Self {
        Self {
            site: template.site,
            log: template.log,
            fail_launches: Mutex::new(0),
        }
    }

    /// The next `n` launches fail.
    pub fn failing_launches(self, n: u32) -> Self {
        *self.fail_launches.lock().unwrap() = n;
        self
    }

    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn launch(&self) -> RenderResult<Box<dyn RenderEngine>> {
        {
            let mut remaining = self.fail_launches.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RenderError::Engine("render service unavailable".to_string()));
            }
        }
        self.log.lock().unwrap().launches += 1;
        Ok(Box::new(MockEngine::with_site(self.site.clone(), self.log.clone())))
    }
}

// ---------------------------------------------------------------------------
// ScriptedOperator
// ---------------------------------------------------------------------------

/// Resolves a login wall by setting a cookie, or gives up.
pub struct ScriptedOperator {
    cookie: Option<Cookie>,
    calls: Mutex<u32>,
}

impl ScriptedOperator {
    /// Logs in by setting `cookie` on the engine.
    pub fn logging_in(cookie: Cookie) -> Self {
        Self {
            cookie: Some(cookie),
            calls: Mutex::new(0),
        }
    }

    /// Never logs in; every call fails.
    pub fn absent() -> Self {
        Self {
            cookie: None,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn await_manual_login(
        &self,
        engine: &mut dyn RenderEngine,
        _session: &SessionStore,
        login_url: &str,
    ) -> Result<(), LeadScoutError> {
        *self.calls.lock().unwrap() += 1;
        match &self.cookie {
            Some(cookie) => {
                engine.set_cookies(vec![cookie.clone()]).await?;
                Ok(())
            }
            None => Err(LeadScoutError::AuthenticationRequired(format!(
                "no operator to log in at {login_url}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// One result card on a listing page. Empty fields are left out of the markup.
#[derive(Debug, Clone, Default)]
pub struct CardFixture {
    pub slug: String,
    pub name: String,
    pub headline: String,
    pub location: String,
    pub open_to_work: bool,
}

impl CardFixture {
    pub fn new(slug: &str, name: &str, headline: &str, location: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            headline: headline.to_string(),
            location: location.to_string(),
            open_to_work: false,
        }
    }

    pub fn open_to_work(mut self) -> Self {
        self.open_to_work = true;
        self
    }

    fn html(&self) -> String {
        let mut inner = format!(
            r#"<span class="entity-result__title-text"><a href="/in/{slug}/?miniProfileUrn=x"><span aria-hidden="true">{name}</span></a></span>"#,
            slug = self.slug,
            name = self.name,
        );
        if !self.headline.is_empty() {
            inner.push_str(&format!(
                r#"<div class="entity-result__primary-subtitle">{}</div>"#,
                self.headline
            ));
        }
        if !self.location.is_empty() {
            inner.push_str(&format!(
                r#"<div class="entity-result__secondary-subtitle">{}</div>"#,
                self.location
            ));
        }
        if self.open_to_work {
            inner.push_str(r#"<img alt="Open to work" class="frame-opentowork">"#);
        }
        format!(r#"<li class="reusable-search__result-container">{inner}</li>"#)
    }
}

pub fn listing_page(cards: &[CardFixture]) -> String {
    let items: String = cards.iter().map(CardFixture::html).collect();
    format!(
        r#"<html><body><ul class="reusable-search__entity-result-list">{items}</ul></body></html>"#
    )
}

pub fn detail_page(name: &str, headline: &str, location: &str) -> String {
    format!(
        r#"<html><body><main>
             <h1>{name}</h1>
             <div class="text-body-medium break-words">{headline}</div>
             <span class="text-body-small inline t-black--light break-words">{location}</span>
           </main></body></html>"#
    )
}
