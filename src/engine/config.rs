// Skiff Engine — Application Configuration
//
// One explicit configuration object instead of ambient lookups scattered
// through initialization. Loaded from a TOML file; every field has a
// documented default so an empty (or missing) file is a valid config.

use crate::atoms::constants::DEFAULT_PAGE_SIZE;
use crate::atoms::error::{EngineError, EngineResult};
use crate::engine::chat::BotConfig;
use crate::engine::relay::RelayConfig;
use crate::engine::source::EdgeSourceConfig;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat bots, each a `{endpoint, field order, request shape}` bundle.
    #[serde(default)]
    pub bots: Vec<BotConfig>,
    /// Record source for the browse view.
    #[serde(default)]
    pub source: EdgeSourceConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    /// Browse page size; the stored preference overrides it when present.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bots: vec![],
            source: EdgeSourceConfig::default(),
            relay: RelayConfig::default(),
            page_size: default_page_size(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file at the default location yields the defaults; an explicitly named
    /// file must exist.
    pub fn load(path: Option<&Path>) -> EngineResult<AppConfig> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (super::paths::default_config_path(), false),
        };

        if !path.exists() {
            if required {
                return Err(EngineError::Config(format!("config file {path:?} not found")));
            }
            info!("[config] no config at {path:?}, using defaults");
            return Ok(AppConfig::default());
        }

        let text = std::fs::read_to_string(&path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> EngineResult<AppConfig> {
        toml::from_str(text).map_err(|e| EngineError::Config(format!("config parse: {e}")))
    }

    /// Resolve a bot by id, falling back to the first configured bot.
    pub fn bot(&self, id: Option<&str>) -> EngineResult<&BotConfig> {
        match id {
            Some(id) => self
                .bots
                .iter()
                .find(|b| b.id == id)
                .ok_or_else(|| EngineError::Config(format!("no bot named '{id}' in config"))),
            None => self
                .bots
                .first()
                .ok_or_else(|| EngineError::Config("no bots configured".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        page_size = 24

        [source]
        url = "https://project.functions.example/episodes"
        api_key = "anon-key"

        [relay]
        port = 4100

        [[relay.routes]]
        name = "chatpine"
        upstream = "http://localhost:5678/webhook/chatpine"

        [[bots]]
        id = "chatpine"
        title = "Pinecone RAG"
        endpoint = "http://localhost:5678/webhook/chatpine"
        greeting_html = "<p>Hi, I'm your Pinecone RAG assistant.</p>"

        [[bots]]
        id = "chatsql"
        title = "RAG with SQL"
        endpoint = "http://localhost:5678/webhook/chatsql"
        field_names = ["result", "answer"]

        [bots.request]
        question_field = "prompt"
    "#;

    #[test]
    fn parses_a_full_config() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.page_size, 24);
        assert_eq!(config.source.api_key, "anon-key");
        assert_eq!(config.relay.port, 4100);
        assert_eq!(config.relay.routes.len(), 1);
        assert_eq!(config.bots.len(), 2);
        assert_eq!(config.bots[1].field_names, vec!["result", "answer"]);
        assert_eq!(config.bots[1].request.question_field, "prompt");
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(AppConfig::default().page_size, DEFAULT_PAGE_SIZE);
        assert!(config.bots.is_empty());
        assert_eq!(config.relay.port, 4000);
        assert_eq!(config.source.timeout_secs, 15);
    }

    #[test]
    fn bot_lookup_by_id_and_fallback() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.bot(Some("chatsql")).unwrap().title, "RAG with SQL");
        assert_eq!(config.bot(None).unwrap().id, "chatpine");
        assert!(config.bot(Some("nope")).is_err());

        let empty = AppConfig::default();
        assert!(empty.bot(None).is_err());
    }
}
