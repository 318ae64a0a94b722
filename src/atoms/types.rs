// ── Skiff Atoms: Pure Data Types ───────────────────────────────────────────
// All plain struct/enum definitions with no logic beyond trivial accessors.
// Atoms layer rule: no I/O, no side effects, no imports from engine/.

use serde::{Deserialize, Serialize};

// ── Records ────────────────────────────────────────────────────────────────

/// One row from the remote record set. The field set is owned by the data
/// source (`pub_date`, `summary`, `clean_html`, …) and treated as opaque;
/// a record's identity is its position in the global descending ordering,
/// not anything stored inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub serde_json::Map<String, serde_json::Value>);

impl Record {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    /// The field's value when it is a string, else `None`.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }
}

// ── Page fetch wire shapes ─────────────────────────────────────────────────

/// What the browser asks its source for: one page of a record set ordered by
/// a stable descending sort key (page 0 is always the most recent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
}

/// A successful source reply. `count` is the total known record count, or
/// `None` when the source does not report one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageResponse {
    pub data: Vec<Record>,
    #[serde(default)]
    pub count: Option<u64>,
}

// ── Conversation ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One rendered chat bubble. `html` is already display-safe: user messages
/// are escaped on append, bot messages go through the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub html: String,
}

/// An append-only message log for one bot, living for the session.
/// Cleared only by an explicit reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn push(&mut self, sender: Sender, html: impl Into<String>) {
        self.messages.push(ChatMessage { sender, html: html.into() });
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ── Pagination view model ──────────────────────────────────────────────────

/// Pure derivation of the browser state for a rendering layer: labels and
/// button enablement. Recomputed after every state change, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u64,
    pub page_size: u32,
    /// `ceil(total / page_size)` when the total is known.
    pub total_pages: Option<u64>,
    /// "Page 2 of 3", or "Page 2" while the total is unknown.
    pub page_label: String,
    /// "Showing 13-24 of 25" — only when the total is known.
    pub range_label: Option<String>,
    pub can_page_back: bool,
    pub can_page_forward: bool,
    /// Selection-level navigation. With no open selection both read `false`:
    /// the detail arrows stay disabled until a record is opened.
    pub can_shift_back: bool,
    pub can_shift_forward: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_field_access() {
        let rec: Record =
            serde_json::from_value(json!({"pub_date": "2024-03-01", "n": 7})).unwrap();
        assert_eq!(rec.str_field("pub_date"), Some("2024-03-01"));
        assert_eq!(rec.str_field("n"), None); // not a string
        assert_eq!(rec.field("n"), Some(&json!(7)));
        assert_eq!(rec.field("missing"), None);
    }

    #[test]
    fn page_request_uses_wire_casing() {
        let req = PageRequest { page: 2, page_size: 12 };
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire, json!({"page": 2, "pageSize": 12}));
    }

    #[test]
    fn page_response_count_defaults_to_none() {
        let resp: PageResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(resp.count.is_none());
        assert!(resp.data.is_empty());
    }

    #[test]
    fn conversation_is_append_only_until_cleared() {
        let mut convo = Conversation::default();
        convo.push(Sender::User, "hi");
        convo.push(Sender::Bot, "<p>hello</p>");
        assert_eq!(convo.messages().len(), 2);
        assert_eq!(convo.last().unwrap().sender, Sender::Bot);
        convo.clear();
        assert!(convo.is_empty());
    }
}
