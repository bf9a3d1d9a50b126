// ABOUTME: HTTP route modules and shared response helpers
// ABOUTME: Redirect construction for OAuth round-trip error reporting
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! HTTP routes.
//!
//! Each surface owns a `Routes` struct exposing `routes(resources)`;
//! [`crate::server`] merges them into one router. Helpers here build the
//! 302 redirects OAuth uses to report results and errors back to a
//! verified `redirect_uri` (axum's `Redirect` issues 303, which some
//! client libraries refuse to follow for this flow).

pub mod authorize;
pub mod federation;
pub mod health;
pub mod token;

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use crate::errors::OAuthError;

/// A plain 302 Found to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

/// Append query parameters to a URL, respecting an existing query string.
/// Values are percent-encoded.
pub(crate) fn append_query(base: &str, params: &[(&str, &str)]) -> String {
    let mut url = base.to_owned();
    let mut separator = if url.contains('?') { '&' } else { '?' };
    for (key, value) in params {
        url.push(separator);
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
        separator = '&';
    }
    url
}

/// 302 back to a verified `redirect_uri` carrying `error`,
/// `error_description`, and `state` when present.
pub(crate) fn redirect_with_error(
    redirect_uri: &str,
    error: &OAuthError,
    state: Option<&str>,
) -> Response {
    let mut params = vec![
        ("error", error.kind.as_str()),
        ("error_description", error.description.as_str()),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }
    found(&append_query(redirect_uri, &params))
}

/// An HTML page with an explicit status.
pub(crate) fn html_page(status: StatusCode, body: String) -> Response {
    (status, Html(body)).into_response()
}
