pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct FunctionRequest<'a, C: Serialize> {
    code: &'a str,
    context: &'a C,
}

impl BrowserlessClient {
    /// `timeout` bounds a whole request, including the remote page load.
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrowserlessError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    /// Run a puppeteer function on the remote browser via the /function endpoint.
    ///
    /// `code` is an ES module whose default export receives `{ page, context }`.
    /// The JSON it returns under `data` is decoded into `T`.
    pub async fn function<C, T>(&self, code: &str, context: &C) -> Result<T>
    where
        C: Serialize + Sync,
        T: DeserializeOwned,
    {
        let endpoint = self.endpoint("function");
        let body = FunctionRequest { code, context };

        tracing::debug!(endpoint = %self.base_url, "Browserless /function call");

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            if status.as_u16() == 408 {
                return Err(BrowserlessError::Timeout(message));
            }
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw = resp.text().await?;
        serde_json::from_str(&raw).map_err(|e| BrowserlessError::Decode(e.to_string()))
    }
}
