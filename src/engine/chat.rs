// Skiff Engine — Webhook Chat Client
//
// One configurable client where there used to be a copy of the same script
// per bot. Everything that varied between the copies — endpoint, reply field
// order, request shape, greeting and fallback copy — lives in `BotConfig`;
// everything that didn't lives here exactly once.
//
// The send path is the whole product: append the escaped user message, POST
// `{question: …}` (plus static routing metadata) to the webhook, hand the
// raw reply text to the normalizer, append the bot bubble. Failures append
// the bot's error bubble and surface the typed error for the status line.

use crate::atoms::constants::{BOT_PAYLOAD_FIELDS, DEFAULT_TIMEOUT_SECS};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Conversation, Sender};
use crate::engine::normalize::{escape_html, normalize_with_fields};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Request shape ──────────────────────────────────────────────────────────

/// How a question is packaged for the webhook: the field name carrying the
/// text plus any static routing metadata (a bot or topic identifier) merged
/// into the same JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestShape {
    #[serde(default = "default_question_field")]
    pub question_field: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_question_field() -> String {
    "question".into()
}

impl Default for RequestShape {
    fn default() -> Self {
        RequestShape { question_field: default_question_field(), metadata: Default::default() }
    }
}

// ── Bot configuration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Stable identifier, used for routing and the last-bot preference.
    pub id: String,
    /// Human-facing name, also woven into the default fallback copy.
    pub title: String,
    /// Webhook URL the questions are POSTed to.
    pub endpoint: String,
    /// Reply fields probed in order when the webhook answers with JSON.
    #[serde(default = "default_field_names")]
    pub field_names: Vec<String>,
    #[serde(default)]
    pub request: RequestShape,
    /// Seeded as the first bot bubble of every fresh conversation.
    #[serde(default)]
    pub greeting_html: Option<String>,
    /// Shown when the webhook answers with nothing displayable.
    #[serde(default)]
    pub empty_reply_html: Option<String>,
    /// Shown when the webhook cannot be reached or reports failure.
    #[serde(default)]
    pub error_html: Option<String>,
    /// Passed through as `Authorization: Bearer …`, never validated here.
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_field_names() -> Vec<String> {
    BOT_PAYLOAD_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl BotConfig {
    pub fn empty_reply_html(&self) -> String {
        self.empty_reply_html.clone().unwrap_or_else(|| {
            format!("<p>The {} workflow returned an empty response.</p>", self.title)
        })
    }

    pub fn error_html(&self) -> String {
        self.error_html.clone().unwrap_or_else(|| {
            format!(
                "<p>Error contacting the {} webhook. Confirm the workflow is running.</p>",
                self.title
            )
        })
    }
}

// ── Chat client ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ChatClient {
    config: BotConfig,
    client: reqwest::Client,
    conversation: Conversation,
}

impl ChatClient {
    /// Validates the endpoint up front so a typo fails at construction, not
    /// on the first send. Seeds the greeting when one is configured.
    pub fn new(config: BotConfig) -> EngineResult<Self> {
        url::Url::parse(&config.endpoint).map_err(|e| {
            EngineError::Config(format!("bot '{}' endpoint '{}': {e}", config.id, config.endpoint))
        })?;
        let client = super::http::client(Duration::from_secs(config.timeout_secs))?;
        let mut chat = ChatClient { config, client, conversation: Conversation::default() };
        chat.seed_greeting();
        Ok(chat)
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Clear the thread and re-seed the greeting.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.seed_greeting();
    }

    fn seed_greeting(&mut self) {
        if let Some(greeting) = self.config.greeting_html.clone() {
            self.conversation.push(Sender::Bot, greeting);
        }
    }

    /// The JSON object POSTed for `question`: routing metadata plus the
    /// question under the configured field name (which always wins a clash).
    fn request_body(&self, question: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut body = self.config.request.metadata.clone();
        body.insert(self.config.request.question_field.clone(), question.into());
        body
    }

    /// Send one question and append both sides of the exchange.
    ///
    /// A blank question is a no-op. On failure the bot's error bubble is
    /// appended and the typed error is returned for the status line — the
    /// conversation always ends on a bot message either way.
    pub async fn send(&mut self, question: &str) -> EngineResult<()> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(());
        }

        self.conversation.push(Sender::User, escape_html(question));

        match self.exchange(question).await {
            Ok(html) => {
                let html =
                    if html.is_empty() { self.config.empty_reply_html() } else { html };
                self.conversation.push(Sender::Bot, html);
                Ok(())
            }
            Err(e) => {
                warn!("[chat] {}: send failed: {e}", self.config.id);
                self.conversation.push(Sender::Bot, self.config.error_html());
                Err(e)
            }
        }
    }

    /// POST the question, normalize whatever comes back.
    async fn exchange(&self, question: &str) -> EngineResult<String> {
        info!("[chat] {}: sending {} chars", self.config.id, question.len());

        let mut request = self.client.post(&self.config.endpoint).json(&self.request_body(question));
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| EngineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::remote(format!("webhook returned HTTP {status}")));
        }

        let body =
            response.text().await.map_err(|e| EngineError::Transport(e.to_string()))?;
        Ok(normalize_with_fields(&body, &self.config.field_names))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
