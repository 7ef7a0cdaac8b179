use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use leadscout_common::{Cookie, LeadScoutError, SessionConfig};

use crate::checkpoint::write_atomic;
use crate::render::RenderEngine;

/// Persisted cookie jar plus the authentication probe.
pub struct SessionStore {
    path: PathBuf,
    auth_check_url: String,
    login_markers: Vec<String>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, auth_check_url: impl Into<String>, login_markers: Vec<String>) -> Self {
        Self {
            path: path.into(),
            auth_check_url: auth_check_url.into(),
            login_markers: login_markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.session_file.clone(),
            config.auth_check_url.clone(),
            config.login_markers.clone(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted cookies, or `None` when the file is missing or unreadable.
    pub fn load_cookies(&self) -> Option<Vec<Cookie>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved session");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                return None;
            }
        };
        match serde_json::from_slice::<Vec<Cookie>>(&raw) {
            Ok(cookies) => Some(cookies),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Session file is corrupt, ignoring");
                None
            }
        }
    }

    pub fn save_cookies(&self, cookies: &[Cookie]) -> Result<(), LeadScoutError> {
        let json = serde_json::to_vec_pretty(cookies)
            .map_err(|e| LeadScoutError::Persistence(format!("serialize session: {e}")))?;
        write_atomic(&self.path, &json)?;
        info!(path = %self.path.display(), cookies = cookies.len(), "Session saved");
        Ok(())
    }

    /// Persist the engine's current cookie jar.
    pub async fn save(&self, engine: &mut dyn RenderEngine) -> Result<(), LeadScoutError> {
        let cookies = engine.cookies().await?;
        self.save_cookies(&cookies)
    }

    /// Apply saved cookies to a fresh engine. Returns false when nothing was applied.
    pub async fn restore(&self, engine: &mut dyn RenderEngine) -> bool {
        let Some(cookies) = self.load_cookies() else {
            return false;
        };
        if cookies.is_empty() {
            return false;
        }
        let count = cookies.len();
        match engine.set_cookies(cookies).await {
            Ok(()) => {
                debug!(cookies = count, "Session restored");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to apply saved session");
                false
            }
        }
    }

    /// Visit an authenticated-only page; a login or checkpoint marker in the
    /// landed URL means the session is not valid.
    pub async fn is_authenticated(&self, engine: &mut dyn RenderEngine) -> bool {
        if let Err(e) = engine.navigate(&self.auth_check_url).await {
            warn!(url = self.auth_check_url.as_str(), error = %e, "Auth check navigation failed");
            return false;
        }
        let landed = match engine.current_url().await {
            Ok(url) => url.to_lowercase(),
            Err(e) => {
                warn!(error = %e, "Auth check could not read current URL");
                return false;
            }
        };
        let blocked = self.login_markers.iter().find(|m| landed.contains(m.as_str()));
        if let Some(marker) = blocked {
            info!(landed = landed.as_str(), marker = marker.as_str(), "Session not authenticated");
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Operator: manual intervention
// ---------------------------------------------------------------------------

/// Whoever resolves a login wall. Blocks until the session may be valid again.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn await_manual_login(
        &self,
        engine: &mut dyn RenderEngine,
        session: &SessionStore,
        login_url: &str,
    ) -> Result<(), LeadScoutError>;
}

/// Prompts on the terminal, then re-imports the session file.
pub struct StdinOperator;

#[async_trait]
impl Operator for StdinOperator {
    async fn await_manual_login(
        &self,
        engine: &mut dyn RenderEngine,
        session: &SessionStore,
        login_url: &str,
    ) -> Result<(), LeadScoutError> {
        if let Err(e) = engine.navigate(login_url).await {
            warn!(url = login_url, error = %e, "Could not open login page");
        }
        warn!(
            login_url,
            session_file = %session.path().display(),
            "Manual login required: sign in, export cookies to the session file, then press Enter"
        );

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| LeadScoutError::AuthenticationRequired(format!("stdin: {e}")))?;
        if read == 0 {
            return Err(LeadScoutError::AuthenticationRequired(
                "stdin closed before login was confirmed".to_string(),
            ));
        }

        if !session.restore(engine).await {
            warn!("Session file still missing or unreadable after manual login");
        }
        Ok(())
    }
}
