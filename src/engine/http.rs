// Skiff Engine — Shared HTTP Client Factory
//
// One place builds every outbound `reqwest::Client`: explicit connect and
// request timeouts, rustls TLS, a stable User-Agent. Components never call
// `Client::builder()` themselves, so timeout policy stays in one file.
//
// No retry layer on purpose: a webhook POST re-triggers the workflow behind
// it, so replaying a request that may have been received is worse than
// reporting the failure.

use crate::atoms::error::{EngineError, EngineResult};
use std::time::Duration;

/// Connect-phase cap, independent of the overall request timeout.
const CONNECT_TIMEOUT_SECS: u64 = 10;

pub const USER_AGENT: &str = concat!("skiff/", env!("CARGO_PKG_VERSION"));

/// Build a client whose requests resolve (or fail) within `timeout`.
pub fn client(timeout: Duration) -> EngineResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| EngineError::Config(format!("HTTP client build failed: {e}")))
}
