use std::env;

use crate::error::LeadScoutError;

/// Environment-specific values and secrets. Everything tunable lives in the
/// TOML [`FileConfig`](crate::FileConfig).
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Render service
    pub browserless_url: String,
    pub browserless_token: Option<String>,
}

impl AppConfig {
    /// Load configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self, LeadScoutError> {
        dotenvy::dotenv().ok();

        let config = Self {
            browserless_url: required_env("BROWSERLESS_URL")?,
            browserless_token: env::var("BROWSERLESS_TOKEN").ok().filter(|t| !t.is_empty()),
        };

        config.log_redacted();
        Ok(config)
    }

    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(4);
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  BROWSERLESS_URL: {}", self.browserless_url);
        tracing::info!(
            "  BROWSERLESS_TOKEN: {}",
            self.browserless_token
                .as_deref()
                .map(preview)
                .unwrap_or_else(|| "<not set>".to_string())
        );
    }
}

fn required_env(key: &str) -> Result<String, LeadScoutError> {
    env::var(key).map_err(|_| LeadScoutError::Config(format!("{key} environment variable is required")))
}
