//! HTTP caching middleware

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::IntoResponse,
};

/// Marks successful responses as cacheable for `max_age_sec` seconds.
/// A max age of 0 sets `no-cache`.
pub async fn http_cache(
    State(max_age_sec): State<usize>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let response = next.run(request).await.into_response();
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let value = if max_age_sec == 0 {
        HeaderValue::from_static("no-cache")
    } else {
        match HeaderValue::from_str(&format!("max-age={}", max_age_sec)) {
            Ok(value) => value,
            Err(_) => HeaderValue::from_static("no-cache"),
        }
    };
    parts.headers.insert("Cache-Control", value);

    axum::http::Response::from_parts(parts, body)
}
