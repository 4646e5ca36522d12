// Remote-stream byte proxy - GET /api/proxy?target=
//
// Relays a resolved media URL to the browser when no local file exists.
// The target is untrusted input: only absolute http(s) URLs are fetched.
// A small fixed set of spoofed headers (UA, Referer/Origin tuned by the
// source host) keeps the CDNs that check them happy; Range requests and
// the upstream range headers pass through verbatim.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::AppState;

const DEFAULT_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub target: Option<String>,
}

pub async fn handle(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
    request_headers: HeaderMap,
) -> Response {
    let target = match params.target.as_deref().and_then(validate_target) {
        Some(url) => url,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "invalid target url" })),
            )
                .into_response();
        }
    };
    let host = target.host_str().unwrap_or("").to_string();

    let mut forward = spoofed_headers(&host);
    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("bytes=0-");
    if let Ok(value) = reqwest::header::HeaderValue::from_str(range) {
        forward.insert(reqwest::header::RANGE, value);
    }
    // TikTok CDNs key sessions on cookies; pass them through for that host only.
    if host.contains("tiktok") {
        if let Some(cookie) = request_headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            if let Ok(value) = reqwest::header::HeaderValue::from_str(cookie) {
                forward.insert(reqwest::header::COOKIE, value);
            }
        }
    }

    let upstream = match state.http.get(target).headers(forward).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(target: "medisave::proxy", host = %host, error = %err, "upstream fetch failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "bad gateway" })),
            )
                .into_response();
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    if !status.is_success() {
        let text = upstream.text().await.unwrap_or_default();
        tracing::warn!(
            target: "medisave::proxy",
            %status,
            host = %host,
            body = %text.chars().take(200).collect::<String>(),
            "upstream error"
        );
        return (status, text).into_response();
    }

    let mut response = Response::builder()
        .status(status)
        .header(header::CACHE_CONTROL, "no-store");
    for (name, axum_name) in [
        (reqwest::header::CONTENT_TYPE, header::CONTENT_TYPE),
        (reqwest::header::CONTENT_LENGTH, header::CONTENT_LENGTH),
        (reqwest::header::ACCEPT_RANGES, header::ACCEPT_RANGES),
        (reqwest::header::CONTENT_RANGE, header::CONTENT_RANGE),
        (reqwest::header::CONTENT_DISPOSITION, header::CONTENT_DISPOSITION),
    ] {
        if let Some(value) = upstream.headers().get(&name).and_then(|v| v.to_str().ok()) {
            response = response.header(axum_name, value);
        }
    }
    if !upstream.headers().contains_key(reqwest::header::CONTENT_TYPE) {
        response = response.header(header::CONTENT_TYPE, "video/mp4");
    }
    if !upstream.headers().contains_key(reqwest::header::CONTENT_DISPOSITION) {
        let ts = time::OffsetDateTime::now_utc().unix_timestamp();
        response = response.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"video_{}.mp4\"", ts),
        );
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

/// Absolute http(s) URLs only; anything else is refused before fetching.
fn validate_target(target: &str) -> Option<reqwest::Url> {
    let parsed = reqwest::Url::parse(target).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(parsed)
}

/// Fixed browser-shaped header set, with Referer/Origin tuned by source host.
fn spoofed_headers(host: &str) -> reqwest::header::HeaderMap {
    use reqwest::header::{HeaderMap, HeaderValue};

    let is_tiktok = host.contains("tiktok");
    let (referer, origin) = if is_tiktok {
        ("https://www.tiktok.com/", "https://www.tiktok.com")
    } else {
        ("https://www.youtube.com/", "https://www.youtube.com")
    };

    let mut headers = HeaderMap::new();
    headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(DEFAULT_UA));
    headers.insert(reqwest::header::REFERER, HeaderValue::from_static(referer));
    headers.insert(reqwest::header::ORIGIN, HeaderValue::from_static(origin));
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("video/mp4,video/*;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        reqwest::header::ACCEPT_ENCODING,
        HeaderValue::from_static("identity"),
    );
    headers
}
