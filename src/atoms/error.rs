// ── Skiff Atoms: Error Types ───────────────────────────────────────────────
// Single canonical error enum for the crate, built with `thiserror`.
//
// Design rules:
//   • The first four variants classify every fetch failure: transport (no
//     response reached us), remote (response present, marked failed),
//     malformed (response present, unparsable), validation (rejected before
//     any I/O). Callers surface them as status strings but tests and logs
//     can tell them apart.
//   • The `#[from]` attribute wires std/external error conversions.
//   • No variant carries secret material (API keys, tokens) in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// No response reached the client: connect failure, read failure, or
    /// the configured timeout elapsed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response arrived but the collaborator marked it failed. Carries the
    /// collaborator's human-readable message.
    #[error("Remote error: {0}")]
    Remote(String),

    /// A response arrived but could not be parsed into the expected shape,
    /// or a required field was missing.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Caller-supplied parameters out of range. Checked synchronously before
    /// any network call; rejection has no side effects.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A page load is already in flight on this browser instance. Loads are
    /// serialized, never queued; retry after the current one resolves.
    #[error("A page load is already in flight")]
    Busy,

    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite / rusqlite preference-store failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations return this type. At the rendering boundary,
/// convert with `.map_err(|e| e.to_string())` — errors become status copy.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_kinds_are_distinguishable() {
        let t = EngineError::transport("connection refused");
        let r = EngineError::remote("row limit exceeded");
        let m = EngineError::malformed("missing data field");
        assert!(matches!(t, EngineError::Transport(_)));
        assert!(matches!(r, EngineError::Remote(_)));
        assert!(matches!(m, EngineError::MalformedResponse(_)));
    }

    #[test]
    fn display_carries_the_message() {
        let e = EngineError::validation("page -1 is negative");
        assert_eq!(e.to_string(), "Validation error: page -1 is negative");
    }
}
