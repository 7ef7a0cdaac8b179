use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browserless_client::{BrowserlessClient, BrowserlessError};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use leadscout_common::Cookie;

use super::{ContextId, EngineFactory, RenderEngine, RenderError, RenderResult};

/// Puppeteer function run remotely for every render. Applies the cookie jar,
/// loads the page, optionally waits for a selector and evaluates a script,
/// then reports the landed URL, HTML and refreshed cookies. A zero `waitMs`
/// skips the wait; puppeteer reads a zero timeout as "wait forever".
const RENDER_FUNCTION: &str = r#"
export default async function ({ page, context }) {
  const cookies = context.cookies.map((c) => (c.domain ? c : { ...c, url: context.url }));
  if (cookies.length) {
    await page.setCookie(...cookies);
  }
  await page.goto(context.url, { waitUntil: "networkidle2", timeout: context.timeoutMs });
  let found = true;
  if (context.waitFor && context.waitMs > 0) {
    found = await page
      .waitForSelector(context.waitFor, { timeout: context.waitMs })
      .then(() => true, () => false);
  }
  let result = null;
  let scriptError = null;
  if (context.script) {
    result = await page.evaluate(context.script).catch((e) => {
      scriptError = String(e);
      return null;
    });
  }
  return {
    data: {
      url: page.url(),
      html: await page.content(),
      cookies: await page.cookies(),
      found,
      result: result === undefined ? null : result,
      scriptError,
    },
    type: "application/json",
  };
}
"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderContext<'a> {
    url: &'a str,
    cookies: &'a [Cookie],
    wait_for: Option<&'a str>,
    script: Option<&'a str>,
    timeout_ms: u64,
    wait_ms: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderOutput {
    url: String,
    html: String,
    #[serde(default)]
    cookies: Vec<Cookie>,
    #[serde(default)]
    found: bool,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    script_error: Option<String>,
}

struct PageState {
    id: ContextId,
    url: Option<String>,
    html: String,
}

impl PageState {
    fn blank(id: ContextId) -> Self {
        Self {
            id,
            url: None,
            html: String::new(),
        }
    }
}

/// Render engine backed by the stateless Browserless `/function` API.
///
/// Session state (cookie jar, open contexts, last rendered HTML) is held
/// client-side and shipped with each render call.
pub struct BrowserlessEngine {
    client: Arc<BrowserlessClient>,
    cookies: Vec<Cookie>,
    contexts: Vec<PageState>,
    next_id: u32,
    navigation_timeout: Duration,
}

impl BrowserlessEngine {
    pub fn new(client: Arc<BrowserlessClient>, navigation_timeout: Duration) -> Self {
        Self {
            client,
            cookies: Vec::new(),
            contexts: vec![PageState::blank(ContextId::ROOT)],
            next_id: 1,
            navigation_timeout,
        }
    }

    fn focused(&mut self) -> &mut PageState {
        if self.contexts.is_empty() {
            self.contexts.push(PageState::blank(ContextId::ROOT));
        }
        let last = self.contexts.len() - 1;
        &mut self.contexts[last]
    }

    async fn render(
        &mut self,
        operation: &'static str,
        url: &str,
        wait_for: Option<&str>,
        wait: Duration,
        script: Option<&str>,
    ) -> RenderResult<RenderOutput> {
        let context = RenderContext {
            url,
            cookies: &self.cookies,
            wait_for,
            script,
            timeout_ms: self.navigation_timeout.as_millis() as u64,
            wait_ms: wait.as_millis() as u64,
        };

        let output: RenderOutput = self
            .client
            .function(RENDER_FUNCTION, &context)
            .await
            .map_err(|e| match e {
                BrowserlessError::Timeout(_) => RenderError::Timeout {
                    operation,
                    timeout: self.navigation_timeout,
                },
                other => RenderError::Engine(other.to_string()),
            })?;

        debug!(
            operation,
            requested = url,
            landed = output.url.as_str(),
            html_bytes = output.html.len(),
            "Rendered page"
        );

        merge_cookies(&mut self.cookies, output.cookies.clone());
        let page = self.focused();
        page.url = Some(output.url.clone());
        page.html = output.html.clone();
        Ok(output)
    }

    fn current_target(&mut self, operation: &'static str) -> RenderResult<String> {
        self.focused()
            .url
            .clone()
            .ok_or_else(|| RenderError::Engine(format!("{operation}: no page loaded")))
    }
}

#[async_trait]
impl RenderEngine for BrowserlessEngine {
    async fn navigate(&mut self, url: &str) -> RenderResult<()> {
        self.render("navigate", url, None, Duration::ZERO, None).await?;
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> RenderResult<serde_json::Value> {
        let url = self.current_target("execute_script")?;
        let output = self
            .render("execute_script", &url, None, Duration::ZERO, Some(script))
            .await?;
        match output.script_error {
            Some(e) => Err(RenderError::Engine(format!("script failed: {e}"))),
            None => Ok(output.result),
        }
    }

    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> RenderResult<bool> {
        if document_has(&self.focused().html, selector) {
            return Ok(true);
        }
        if timeout.is_zero() {
            return Ok(false);
        }
        let url = self.current_target("wait_for_element")?;
        let output = self
            .render("wait_for_element", &url, Some(selector), timeout, None)
            .await?;
        Ok(output.found)
    }

    async fn document(&mut self) -> RenderResult<String> {
        Ok(self.focused().html.clone())
    }

    async fn current_url(&mut self) -> RenderResult<String> {
        Ok(self
            .focused()
            .url
            .clone()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn cookies(&mut self) -> RenderResult<Vec<Cookie>> {
        Ok(self.cookies.clone())
    }

    async fn set_cookies(&mut self, cookies: Vec<Cookie>) -> RenderResult<()> {
        merge_cookies(&mut self.cookies, cookies);
        Ok(())
    }

    async fn open_context(&mut self, url: &str) -> RenderResult<ContextId> {
        let id = ContextId(self.next_id);
        self.next_id += 1;
        self.contexts.push(PageState::blank(id));
        if let Err(e) = self.render("open_context", url, None, Duration::ZERO, None).await {
            self.contexts.pop();
            return Err(e);
        }
        Ok(id)
    }

    async fn close_context(&mut self, id: ContextId) -> RenderResult<()> {
        close_in_stack(&mut self.contexts, id)
    }

    /// One `/function` call: the ready selectors are sent as a selector group
    /// and the matched one is picked from the returned HTML.
    async fn navigate_with(
        &mut self,
        url: &str,
        ready: &[&'static str],
        wait: Duration,
        script: Option<&str>,
    ) -> RenderResult<Option<&'static str>> {
        let group = ready.join(", ");
        let wait_for = (!group.is_empty()).then_some(group.as_str());
        let output = self.render("navigate", url, wait_for, wait, script).await?;
        if let Some(e) = &output.script_error {
            warn!(url, error = e.as_str(), "Page script failed");
        }
        Ok(first_present(&output.html, ready))
    }

    async fn shutdown(&mut self) -> RenderResult<()> {
        self.contexts.clear();
        self.contexts.push(PageState::blank(ContextId::ROOT));
        info!("Browserless session released");
        Ok(())
    }
}

fn close_in_stack(contexts: &mut Vec<PageState>, id: ContextId) -> RenderResult<()> {
    if id == ContextId::ROOT {
        return Err(RenderError::NoContext(id.0));
    }
    match contexts.iter().position(|c| c.id == id) {
        Some(pos) => {
            contexts.remove(pos);
            Ok(())
        }
        None => Err(RenderError::NoContext(id.0)),
    }
}

/// Upsert by (name, domain, path); later values win.
pub(crate) fn merge_cookies(jar: &mut Vec<Cookie>, incoming: Vec<Cookie>) {
    for cookie in incoming {
        match jar.iter_mut().find(|c| {
            c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path
        }) {
            Some(existing) => *existing = cookie,
            None => jar.push(cookie),
        }
    }
}

/// First of `selectors` that matches `html`, parsing the document once.
fn first_present(html: &str, selectors: &[&'static str]) -> Option<&'static str> {
    if html.is_empty() {
        return None;
    }
    let document = Html::parse_document(html);
    selectors.iter().copied().find(|s| {
        Selector::parse(s)
            .map(|selector| document.select(&selector).next().is_some())
            .unwrap_or(false)
    })
}

pub(crate) fn document_has(html: &str, selector: &str) -> bool {
    if html.is_empty() {
        return false;
    }
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub struct BrowserlessFactory {
    client: Arc<BrowserlessClient>,
    navigation_timeout: Duration,
}

impl BrowserlessFactory {
    pub fn new(client: Arc<BrowserlessClient>, navigation_timeout: Duration) -> Self {
        Self {
            client,
            navigation_timeout,
        }
    }
}

#[async_trait]
impl EngineFactory for BrowserlessFactory {
    async fn launch(&self) -> RenderResult<Box<dyn RenderEngine>> {
        info!("Launching Browserless session");
        Ok(Box::new(BrowserlessEngine::new(
            self.client.clone(),
            self.navigation_timeout,
        )))
    }
}
