//! Pass-through fetch for viewing sites inside the client's iframe
//!
//! The upstream body and status are returned as-is. Headers that would stop
//! the page from rendering in a frame are dropped, along with hop-by-hop
//! headers that only made sense on the upstream connection.

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use linkshelf_core::embed::host_matches;
use linkshelf_core::validation::require_web_url;
use reqwest::redirect::Policy;
use serde::Deserialize;
use tracing::{debug, error, warn};

/// Response headers never copied back to the client
const STRIPPED_HEADERS: &[&str] = &[
    "x-frame-options",
    "content-security-policy",
    "content-security-policy-report-only",
    // hop-by-hop
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    // recomputed for the buffered body
    "content-length",
];

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
}

/// Outbound client with the configured timeouts and redirect ceiling.
///
/// Redirects to hosts outside the allow-list are not followed; the redirect
/// response itself is handed back instead.
pub fn build_client(config: &ServerConfig) -> reqwest::Result<reqwest::Client> {
    let allowed = config.proxy_allowed_hosts.clone();
    let max_redirects = config.proxy_max_redirects;
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            attempt.error("too many redirects")
        } else if !host_allowed(&allowed, attempt.url().host_str()) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    reqwest::Client::builder()
        .connect_timeout(config.proxy_connect_timeout())
        .timeout(config.proxy_timeout())
        .redirect(policy)
        .user_agent(concat!("linkshelf/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// An empty allow-list permits every host
fn host_allowed(allowed: &[String], host: Option<&str>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    host.is_some_and(|host| allowed.iter().any(|domain| host_matches(host, domain)))
}

fn is_forwarded(name: &str) -> bool {
    !STRIPPED_HEADERS
        .iter()
        .any(|stripped| name.eq_ignore_ascii_case(stripped))
}

pub async fn proxy(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> ApiResult<Response> {
    let raw = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL parameter is required".to_string()))?;
    let target = require_web_url("url", &raw)?;

    if !host_allowed(&state.config.proxy_allowed_hosts, target.host_str()) {
        warn!("Proxy request to disallowed host rejected: {}", target);
        return Err(ApiError::BadRequest(format!(
            "Host {} is not allowed",
            target.host_str().unwrap_or_default()
        )));
    }

    debug!("Proxying {}", target);
    let upstream = state
        .http
        .get(target.as_str())
        .send()
        .await
        .map_err(|e| {
            error!("Proxy fetch failed for {}: {}", target, e);
            ApiError::Internal(format!("Failed to fetch URL: {e}"))
        })?;

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    for (name, value) in upstream.headers() {
        if is_forwarded(name.as_str()) {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
    }

    let body = upstream.bytes().await.map_err(|e| {
        error!("Proxy body read failed for {}: {}", target, e);
        ApiError::Internal(format!("Failed to fetch URL: {e}"))
    })?;

    builder
        .body(Body::from(body))
        .map_err(|e| ApiError::internal("Failed to build proxy response", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_blocking_headers_are_stripped() {
        assert!(!is_forwarded("X-Frame-Options"));
        assert!(!is_forwarded("content-security-policy"));
        assert!(!is_forwarded("Content-Security-Policy-Report-Only"));
        assert!(!is_forwarded("Transfer-Encoding"));
        assert!(is_forwarded("content-type"));
        assert!(is_forwarded("cache-control"));
    }

    #[test]
    fn test_host_allowed() {
        assert!(host_allowed(&[], Some("anything.test")));
        assert!(host_allowed(&[], None));

        let allowed = vec!["example.com".to_string()];
        assert!(host_allowed(&allowed, Some("example.com")));
        assert!(host_allowed(&allowed, Some("docs.example.com")));
        assert!(!host_allowed(&allowed, Some("example.org")));
        assert!(!host_allowed(&allowed, None));
    }
}
