// Skiff Engine — CORS Relay
//
// A byte-forwarding proxy between browser pages and workflow webhooks: the
// page POSTs here, the relay POSTs the same body upstream and hands the raw
// reply text straight back, adding the CORS headers the upstream never sends.
// No parsing of either body — the normalizer lives client-side.
//
// Architecture: raw `tokio::net::TcpListener`, no framework dependency.
// Routes:
//   POST /relay/:name     — forward body to the route's upstream webhook
//   GET  /relay/health    — liveness probe
//   OPTIONS *             — CORS preflight
//
// Auth: none of its own; a caller-supplied Authorization header (and apikey)
// is passed through untouched. Rate limiting: fixed window per source IP.

use crate::atoms::constants::DEFAULT_TIMEOUT_SECS;
use crate::atoms::error::{EngineError, EngineResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Relay Config ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRoute {
    /// Path segment the page calls: POST /relay/<name>.
    pub name: String,
    /// Webhook URL the body is forwarded to.
    pub upstream: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address to bind — "127.0.0.1" (localhost) or "0.0.0.0" (LAN).
    #[serde(default = "default_bind")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Value of Access-Control-Allow-Origin on every response.
    #[serde(default = "default_origin")]
    pub allowed_origin: String,
    /// Max requests per IP per minute (0 = unlimited).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub routes: Vec<RelayRoute>,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4000
}
fn default_origin() -> String {
    "*".into()
}
fn default_rate_limit() -> u32 {
    60
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            bind_address: default_bind(),
            port: default_port(),
            allowed_origin: default_origin(),
            rate_limit_per_minute: default_rate_limit(),
            timeout_secs: default_timeout_secs(),
            routes: vec![],
        }
    }
}

// ── Rate Limiter ───────────────────────────────────────────────────────────

struct RateLimiter {
    /// IP → (count, window start)
    buckets: parking_lot::Mutex<HashMap<String, (u32, Instant)>>,
    limit: u32,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        RateLimiter { buckets: parking_lot::Mutex::new(HashMap::new()), limit }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&self, ip: &str) -> bool {
        if self.limit == 0 {
            return true; // unlimited
        }
        let mut map = self.buckets.lock();
        let now = Instant::now();
        let entry = map.entry(ip.to_string()).or_insert((0, now));
        if now.duration_since(entry.1).as_secs() >= 60 {
            *entry = (0, now);
        }
        if entry.0 >= self.limit {
            false
        } else {
            entry.0 += 1;
            true
        }
    }
}

// ── Server ─────────────────────────────────────────────────────────────────

/// Run the relay until the task is cancelled. Upstream URLs are validated
/// before the socket is bound so a bad config fails fast.
pub async fn run_relay(config: RelayConfig) -> EngineResult<()> {
    for route in &config.routes {
        url::Url::parse(&route.upstream).map_err(|e| {
            EngineError::Config(format!("route '{}' upstream '{}': {e}", route.name, route.upstream))
        })?;
    }

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| EngineError::Config(format!("bind {addr} failed: {e}")))?;

    if config.bind_address != "127.0.0.1" && config.bind_address != "localhost" {
        warn!("[relay] binding to {} — every origin allowed by '{}' can reach the upstreams",
            config.bind_address, config.allowed_origin);
    }
    info!("[relay] listening on http://{addr} ({} routes)", config.routes.len());

    let config = Arc::new(config);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));
    let client = super::http::client(Duration::from_secs(config.timeout_secs))?;

    loop {
        match listener.accept().await {
            Ok((mut stream, peer)) => {
                let config = Arc::clone(&config);
                let limiter = Arc::clone(&limiter);
                let client = client.clone();
                tokio::spawn(async move {
                    let peer_ip = peer.ip().to_string();
                    if let Err(e) =
                        handle_request(&mut stream, &peer_ip, &config, &limiter, &client).await
                    {
                        warn!("[relay] request error from {peer_ip}: {e}");
                    }
                });
            }
            Err(e) => warn!("[relay] accept error: {e}"),
        }
    }
}

// ── Request Handler ────────────────────────────────────────────────────────

/// Generic over the stream so tests can drive it through an in-memory pipe.
async fn handle_request<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    peer_ip: &str,
    config: &RelayConfig,
    limiter: &RateLimiter,
    client: &reqwest::Client,
) -> EngineResult<()> {
    // Read the full HTTP request (up to 64KB).
    let mut buf = vec![0u8; 65536];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }
    let raw = String::from_utf8_lossy(&buf[..n]).to_string();

    // Parse first line: "METHOD /path HTTP/1.x"
    let first_line = raw.lines().next().unwrap_or("");
    let mut parts = first_line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return send_text(stream, 400, &config.allowed_origin, "text/plain", "Malformed request").await;
    };

    // ── CORS preflight ──────────────────────────────────────────────────
    if method == "OPTIONS" {
        let response = format!(
            "HTTP/1.1 204 No Content\r\n{}\r\nAccess-Control-Max-Age: 86400\r\nConnection: close\r\n\r\n",
            cors_headers(&config.allowed_origin)
        );
        stream.write_all(response.as_bytes()).await?;
        return Ok(());
    }

    // ── Health check ────────────────────────────────────────────────────
    if method == "GET" && path == "/relay/health" {
        return send_text(stream, 200, &config.allowed_origin, "application/json", "{\"ok\":true}")
            .await;
    }

    // ── Rate limiting ───────────────────────────────────────────────────
    if !limiter.check(peer_ip) {
        return send_text(
            stream,
            429,
            &config.allowed_origin,
            "text/plain",
            "Rate limit exceeded — try again later.",
        )
        .await;
    }

    // ── Route: POST /relay/:name ────────────────────────────────────────
    if method == "POST" {
        if let Some(name) = path.strip_prefix("/relay/") {
            let Some(route) = config.routes.iter().find(|r| r.name == name) else {
                return send_text(
                    stream,
                    404,
                    &config.allowed_origin,
                    "text/plain",
                    &format!("No relay route named '{name}'."),
                )
                .await;
            };

            let body = raw.split("\r\n\r\n").nth(1).unwrap_or("").to_string();
            info!("[relay] POST from {peer_ip} → {} ({} bytes)", route.name, body.len());

            let mut upstream_req = client
                .post(&route.upstream)
                .header("Content-Type", "application/json")
                .body(body);
            // Pass caller credentials through untouched.
            for header in ["authorization", "apikey"] {
                if let Some(value) = header_value(&raw, header) {
                    upstream_req = upstream_req.header(header, value);
                }
            }

            return match upstream_req.send().await {
                Ok(upstream) => {
                    let content_type = upstream
                        .headers()
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("text/plain")
                        .to_string();
                    let text = upstream.text().await.unwrap_or_default();
                    // The page gets whatever the workflow said, byte for byte.
                    send_text(stream, 200, &config.allowed_origin, &content_type, &text).await
                }
                Err(e) => {
                    warn!("[relay] upstream '{}' unreachable: {e}", route.name);
                    send_text(
                        stream,
                        500,
                        &config.allowed_origin,
                        "text/plain",
                        "Error contacting the upstream workflow.",
                    )
                    .await
                }
            };
        }
    }

    send_text(
        stream,
        404,
        &config.allowed_origin,
        "text/plain",
        &format!("Not found: {method} {path}"),
    )
    .await
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn cors_headers(origin: &str) -> String {
    format!(
        "Access-Control-Allow-Origin: {origin}\r\n\
         Access-Control-Allow-Methods: POST, GET, OPTIONS\r\n\
         Access-Control-Allow-Headers: authorization, apikey, content-type"
    )
}

/// Case-insensitive header lookup on a raw request string.
fn header_value<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

async fn send_text<S: AsyncWrite + Unpin>(
    stream: &mut S,
    status: u16,
    origin: &str,
    content_type: &str,
    body: &str,
) -> EngineResult<()> {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {status} {status_text}\r\nContent-Type: {content_type}\r\n{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        cors_headers(origin),
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::TcpListener as TestListener;

    fn config_with_route(upstream: &str) -> RelayConfig {
        RelayConfig {
            routes: vec![RelayRoute { name: "chatpine".into(), upstream: upstream.into() }],
            ..RelayConfig::default()
        }
    }

    /// Drive the handler through an in-memory pipe and return the response.
    async fn drive(request: &str, config: &RelayConfig, limiter: &RateLimiter) -> String {
        let (mut client_end, mut server_end) = tokio::io::duplex(131072);
        client_end.write_all(request.as_bytes()).await.unwrap();

        let http = super::super::http::client(Duration::from_secs(5)).unwrap();
        handle_request(&mut server_end, "9.9.9.9", config, limiter, &http).await.unwrap();
        drop(server_end);

        let mut response = String::new();
        client_end.read_to_string(&mut response).await.unwrap();
        response
    }

    /// One-shot upstream webhook answering with a fixed text body.
    async fn upstream_stub(body: &'static str) -> SocketAddr {
        let listener = TestListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16384];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });
        addr
    }

    #[test]
    fn relay_config_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.allowed_origin, "*");
        assert_eq!(config.rate_limit_per_minute, 60);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn rate_limiter_allows_within_limit() {
        let rl = RateLimiter::new(3);
        assert!(rl.check("1.2.3.4"));
        assert!(rl.check("1.2.3.4"));
        assert!(rl.check("1.2.3.4"));
        assert!(!rl.check("1.2.3.4")); // 4th request blocked
    }

    #[test]
    fn rate_limiter_unlimited_when_zero() {
        let rl = RateLimiter::new(0);
        for _ in 0..1000 {
            assert!(rl.check("1.2.3.4"));
        }
    }

    #[test]
    fn rate_limiter_tracks_ips_separately() {
        let rl = RateLimiter::new(1);
        assert!(rl.check("1.1.1.1"));
        assert!(!rl.check("1.1.1.1"));
        assert!(rl.check("2.2.2.2"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let raw = "POST /x HTTP/1.1\r\nAuthorization: Bearer tok\r\nApiKey: k\r\n\r\n{}";
        assert_eq!(header_value(raw, "authorization"), Some("Bearer tok"));
        assert_eq!(header_value(raw, "apikey"), Some("k"));
        assert_eq!(header_value(raw, "x-missing"), None);
    }

    #[tokio::test]
    async fn preflight_carries_the_cors_headers() {
        let config = config_with_route("http://localhost:1/hook");
        let limiter = RateLimiter::new(0);
        let response =
            drive("OPTIONS /relay/chatpine HTTP/1.1\r\n\r\n", &config, &limiter).await;

        assert!(response.starts_with("HTTP/1.1 204"));
        assert!(response.contains("Access-Control-Allow-Origin: *"));
        assert!(response.contains("Access-Control-Allow-Methods: POST, GET, OPTIONS"));
        assert!(response.contains("Access-Control-Max-Age: 86400"));
    }

    #[tokio::test]
    async fn health_probe_answers_without_an_upstream() {
        let config = RelayConfig::default();
        let limiter = RateLimiter::new(0);
        let response = drive("GET /relay/health HTTP/1.1\r\n\r\n", &config, &limiter).await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("{\"ok\":true}"));
    }

    #[tokio::test]
    async fn unknown_route_is_a_404() {
        let config = config_with_route("http://localhost:1/hook");
        let limiter = RateLimiter::new(0);
        let response = drive(
            "POST /relay/nonexistent HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}",
            &config,
            &limiter,
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn forwards_the_body_and_returns_upstream_text_verbatim() {
        let addr = upstream_stub("<p>workflow says hi</p>").await;
        let config = config_with_route(&format!("http://{addr}/webhook/chatpine"));
        let limiter = RateLimiter::new(0);

        let request = "POST /relay/chatpine HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 24\r\n\r\n{\"question\":\"anybody?\"}";
        let response = drive(request, &config, &limiter).await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Access-Control-Allow-Origin: *"));
        assert!(response.contains("Content-Type: text/html"));
        assert!(response.ends_with("<p>workflow says hi</p>"));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_500_with_plain_copy() {
        let addr = {
            let listener = TestListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let config = config_with_route(&format!("http://{addr}/webhook"));
        let limiter = RateLimiter::new(0);

        let response = drive(
            "POST /relay/chatpine HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}",
            &config,
            &limiter,
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 500"));
        assert!(response.contains("Error contacting the upstream workflow."));
    }

    #[tokio::test]
    async fn rate_limited_request_is_a_429() {
        let config = config_with_route("http://localhost:1/hook");
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("9.9.9.9")); // use up the window

        let response = drive(
            "POST /relay/chatpine HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}",
            &config,
            &limiter,
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 429"));
    }

    #[tokio::test]
    async fn bad_route_urls_fail_before_binding() {
        let err = run_relay(config_with_route("not a url")).await.unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
