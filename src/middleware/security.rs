// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response hardening for a JSON-only backend.
//!
//! Nothing served here is a document: the payment function and the API
//! answer `fetch` calls with JSON. The content policy therefore denies every
//! fetch directive and all framing, and no Permissions-Policy is sent since
//! there is no page for it to govern. Replies carry profile details, booking
//! history and gateway order ids, so nothing may be stored by a cache.

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

fn response_headers() -> [(HeaderName, HeaderValue); 6] {
    [
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ),
        // Checkout pages call the function cross-origin; leak no path
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
    ]
}

/// Add the hardening headers to every response, including auth rejections
/// and CORS preflights.
pub async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in response_headers() {
        headers.insert(name, value);
    }

    response
}
