use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use chrono::{DateTime, Utc};

/// Feeds are recomputed on every read; clients may reuse one briefly.
pub const FEED_MAX_AGE: u32 = 30;

/// Quoted ETag over the response bytes.
pub fn compute_etag(body: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

fn http_date(timestamp: DateTime<Utc>) -> Option<HeaderValue> {
    HeaderValue::from_str(&timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()).ok()
}

/// `*` or any listed tag equal to `etag`.
pub fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|raw| raw.split(',').map(str::trim).any(|tag| tag == "*" || tag == etag))
}

/// JSON response carrying `ETag`, `Cache-Control` and, when the data age
/// is known, `Last-Modified`. The tag is computed over `version` rather
/// than the body; answers 304 when the client already holds that version.
pub fn conditional_json(
    request_headers: &HeaderMap,
    version: &[u8],
    body: Vec<u8>,
    data_as_of: Option<DateTime<Utc>>,
) -> Response {
    let etag = compute_etag(version);
    let not_modified = if_none_match_matches(request_headers, &etag);

    let mut builder = Response::builder()
        .header(header::CACHE_CONTROL, format!("max-age={}", FEED_MAX_AGE))
        .header(header::ETAG, etag.as_str());
    if let Some(value) = data_as_of.and_then(http_date) {
        builder = builder.header(header::LAST_MODIFIED, value);
    }

    let built = if not_modified {
        builder.status(StatusCode::NOT_MODIFIED).body(Body::empty())
    } else {
        builder
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
    };

    built.unwrap_or_else(|err| {
        tracing::error!("Failed to build feed response: {}", err);
        let mut fallback = Response::new(Body::empty());
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}
