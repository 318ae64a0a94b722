// ── Skiff Atoms: Constants ─────────────────────────────────────────────────
// All named constants for the crate live here.
// Rationale: collecting constants in one place eliminates magic strings,
// makes auditing easier, and keeps every layer's code self-documenting.

// ── Page-size clamp ────────────────────────────────────────────────────────
// The edge function rejects nothing — it clamps. The client clamps to the
// same window so both sides agree on what a page means.
pub const MIN_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 12;

// ── Fetch timeout ──────────────────────────────────────────────────────────
// Every outbound request resolves within this window or is reported as a
// transport failure. Workflow webhooks can take several seconds to run a
// whole pipeline before answering, hence the generous default.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

// ── Normalizer candidate fields ────────────────────────────────────────────
// Field names probed, in order, on a JSON reply body. Order is a tie-break:
// when several are present the first non-empty string wins. Workflow nodes
// disagree on what to call their output; this list covers the ones seen in
// production.
pub const BOT_PAYLOAD_FIELDS: &[&str] = &["html", "output", "answer", "result"];

// ── Sanitizer denylist ─────────────────────────────────────────────────────
// Element kinds removed (with their subtrees) from raw-HTML detail content.
// Attributes on retained elements are NOT touched — see sanitize_html docs.
pub const DENYLIST_TAGS: &[&str] = &["script", "style", "link", "iframe", "object", "embed"];

// ── Preference store keys ──────────────────────────────────────────────────
// Used by PrefStore typed accessors. Changing a key orphans the stored value;
// treat as stable identifiers.
pub const PREF_PAGE_SIZE: &str = "page_size";
pub const PREF_THEME: &str = "theme";
pub const PREF_LAST_BOT: &str = "last_bot";
