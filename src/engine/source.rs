// Skiff Engine — Page Sources
//
// `PageSource` is the browser's only collaborator: something that can turn a
// `{page, pageSize}` request into one page of records plus a total count.
// The trait keeps the browser testable and transport-agnostic; `EdgeSource`
// is the production implementation speaking to a hosted edge function that
// proxies the real table (the service key stays on its side).

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{PageRequest, PageResponse};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page. Implementations must distinguish transport failures,
    /// collaborator-reported errors, and malformed replies — and must never
    /// coerce a reported error into an empty success.
    async fn fetch(&self, req: PageRequest) -> EngineResult<PageResponse>;
}

// ── HTTP edge-function source ──────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EdgeSourceConfig {
    /// Edge function URL, e.g. "https://<project>.functions.example/episodes".
    #[serde(default)]
    pub url: String,
    /// Public (anon) key — sent as `apikey` and bearer token, pass-through
    /// only, never validated here.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    crate::atoms::constants::DEFAULT_TIMEOUT_SECS
}

impl Default for EdgeSourceConfig {
    fn default() -> Self {
        EdgeSourceConfig {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug)]
pub struct EdgeSource {
    config: EdgeSourceConfig,
    client: reqwest::Client,
}

impl EdgeSource {
    pub fn new(config: EdgeSourceConfig) -> EngineResult<Self> {
        url::Url::parse(&config.url)
            .map_err(|e| EngineError::Config(format!("source url '{}': {e}", config.url)))?;
        let client = super::http::client(Duration::from_secs(config.timeout_secs))?;
        Ok(EdgeSource { config, client })
    }
}

#[async_trait]
impl PageSource for EdgeSource {
    async fn fetch(&self, req: PageRequest) -> EngineResult<PageResponse> {
        debug!("[source] fetch page={} pageSize={}", req.page, req.page_size);

        let response = self
            .client
            .post(&self.config.url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            if status.is_success() {
                EngineError::malformed(format!("reply is not JSON: {}", preview(&body)))
            } else {
                // Non-JSON error page from an intermediary — still a reply.
                EngineError::remote(format!("HTTP {status}"))
            }
        })?;

        // A reported error wins over the status line: the function answers
        // `{"error": msg}` with 500, but an error body on 200 counts too.
        if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
            let message = err.as_str().map(str::to_owned).unwrap_or_else(|| err.to_string());
            return Err(EngineError::Remote(message));
        }
        if !status.is_success() {
            return Err(EngineError::remote(format!("HTTP {status}")));
        }

        if value.get("data").is_none() {
            return Err(EngineError::malformed("success reply has no `data` field"));
        }
        serde_json::from_value(value).map_err(|e| EngineError::malformed(e.to_string()))
    }
}

fn preview(body: &str) -> String {
    body.chars().take(120).collect()
}

// ── Tests ──────────────────────────────────────────────────────────────────
