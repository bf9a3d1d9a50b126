// ABOUTME: OAuth 2.0 protocol error taxonomy and internal application errors
// ABOUTME: Maps every failure to its RFC 6749 error code and HTTP status
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! # Error handling
//!
//! Two error types cover the system: [`OAuthError`] carries the OAuth2
//! protocol taxonomy rendered as `{error, error_description}` JSON with
//! the status the RFC assigns, and [`AppError`] covers internal failures
//! (store, RNG, configuration) that are never the client's fault.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OAuth 2.0 protocol error codes (RFC 6749 sections 4.1.2.1 and 5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorKind {
    /// Malformed or missing parameters.
    InvalidRequest,
    /// A `response_type` other than `code`.
    UnsupportedResponseType,
    /// A `grant_type` other than `authorization_code`.
    UnsupportedGrantType,
    /// Unknown client or failed client authentication.
    InvalidClient,
    /// Expired, used, or mismatched authorization code, or failed PKCE.
    InvalidGrant,
    /// The user declined consent.
    AccessDenied,
    /// Internal failure surfaced through the protocol.
    ServerError,
}

impl OAuthErrorKind {
    /// Wire representation of the error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
        }
    }

    /// HTTP status for this error at a JSON endpoint.
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// An OAuth 2.0 protocol error with its human-readable description.
#[derive(Debug, Clone, Error)]
#[error("{}: {description}", kind.as_str())]
pub struct OAuthError {
    /// Protocol error code.
    pub kind: OAuthErrorKind,
    /// Human-readable description for `error_description`.
    pub description: String,
}

impl OAuthError {
    /// Create an `invalid_request` error.
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self {
            kind: OAuthErrorKind::InvalidRequest,
            description: description.to_owned(),
        }
    }

    /// Create an `unsupported_response_type` error.
    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self {
            kind: OAuthErrorKind::UnsupportedResponseType,
            description: "only the 'code' response_type is supported".to_owned(),
        }
    }

    /// Create an `unsupported_grant_type` error.
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self {
            kind: OAuthErrorKind::UnsupportedGrantType,
            description: "only the 'authorization_code' grant_type is supported".to_owned(),
        }
    }

    /// Create an `invalid_client` error.
    #[must_use]
    pub fn invalid_client() -> Self {
        Self {
            kind: OAuthErrorKind::InvalidClient,
            description: "client authentication failed".to_owned(),
        }
    }

    /// Create an `invalid_grant` error.
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            kind: OAuthErrorKind::InvalidGrant,
            description: description.to_owned(),
        }
    }

    /// Create an `access_denied` error.
    #[must_use]
    pub fn access_denied() -> Self {
        Self {
            kind: OAuthErrorKind::AccessDenied,
            description: "the resource owner denied the request".to_owned(),
        }
    }

    /// Create a `server_error`.
    #[must_use]
    pub fn server_error(description: &str) -> Self {
        Self {
            kind: OAuthErrorKind::ServerError,
            description: description.to_owned(),
        }
    }

    /// Wire body `{error, error_description}`.
    #[must_use]
    pub fn to_body(&self) -> OAuthErrorBody {
        OAuthErrorBody {
            error: self.kind.as_str().to_owned(),
            error_description: Some(self.description.clone()),
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        (self.kind.http_status(), Json(self.to_body())).into_response()
    }
}

/// Serialized shape of an OAuth error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthErrorBody {
    /// Protocol error code.
    pub error: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Internal application error: never attributable to the remote client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Credential store operation failed.
    #[error("store error: {0}")]
    Store(String),
    /// Boot-time or runtime configuration problem.
    #[error("configuration error: {0}")]
    Config(String),
    /// External provider call failed.
    #[error("external provider error: {0}")]
    Provider(String),
    /// Anything else that should surface as a 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Store failure.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Configuration failure.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// External provider failure.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {self}");
        let body = serde_json::json!({
            "error": "server_error",
            "error_description": self.to_string(),
        });
        (self.http_status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(format!("{error:#}"))
    }
}
