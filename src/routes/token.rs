// ABOUTME: Token endpoint, resource-server introspection, and discovery metadata
// ABOUTME: Single-use code redemption rides the store's compare-and-swap
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! `/token`, `/introspect`, and the discovery document.
//!
//! Redemption checks run in a fixed order ending at the store's
//! `mark_code_used` compare-and-swap; losing that race is
//! indistinguishable from redeeming an already-used code. Introspection
//! answers `{active:false}` for expired and nonexistent tokens alike.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::TokenEndpointAuthMethod;
use crate::errors::{AppError, OAuthError};
use crate::models::AccessToken;
use crate::pkce;
use crate::resources::ServerResources;
use crate::tokens::{constant_time_eq, generate_opaque_token};

/// Routes for token issuance, introspection, and discovery.
pub struct TokenRoutes;

/// Form body of `POST /token`.
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    grant_type: Option<String>,
    code: Option<String>,
    redirect_uri: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    code_verifier: Option<String>,
}

/// Successful token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The opaque bearer token.
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Remaining lifetime in seconds.
    pub expires_in: i64,
    /// Granted scope, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Introspection response. Inactive responses carry only `active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is live.
    pub active: bool,
    /// Granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// User the token acts as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Expiry as a unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl IntrospectionResponse {
    fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            user_id: None,
            exp: None,
        }
    }
}

impl TokenRoutes {
    /// Create the token, introspection, and discovery routes.
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/token", post(Self::handle_token))
            .route("/introspect", post(Self::handle_introspect))
            .route(
                "/.well-known/oauth-authorization-server",
                get(Self::handle_discovery),
            )
            .with_state(resources)
    }

    /// `POST /token` - redeem an authorization code for a bearer token.
    async fn handle_token(
        State(resources): State<Arc<ServerResources>>,
        Form(form): Form<TokenForm>,
    ) -> Result<Response, AppError> {
        match Self::redeem(&resources, form).await {
            Ok(token) => Ok(Json(token).into_response()),
            Err(e) => Ok(e.into_response()),
        }
    }

    async fn redeem(
        resources: &Arc<ServerResources>,
        form: TokenForm,
    ) -> Result<TokenResponse, OAuthError> {
        match form.grant_type.as_deref() {
            None => return Err(OAuthError::invalid_request("grant_type is required")),
            Some("authorization_code") => {}
            Some(_) => return Err(OAuthError::unsupported_grant_type()),
        }
        let code_value = form
            .code
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("code is required"))?;
        let redirect_uri = form
            .redirect_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("redirect_uri is required"))?;
        let client_id = form
            .client_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("client_id is required"))?;
        let code_verifier = form
            .code_verifier
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("code_verifier is required"))?;

        resources
            .registry
            .authenticate_token_request(client_id, form.client_secret.as_deref())?;

        let store = &resources.store;
        let code = store
            .get_code(code_value)
            .await
            .map_err(|e| {
                tracing::error!("code lookup failed: {e}");
                OAuthError::server_error("storage failure")
            })?
            .ok_or_else(|| OAuthError::invalid_grant("unknown authorization code"))?;

        if code.is_expired(Utc::now()) {
            let _ = store.delete_code(code_value).await;
            return Err(OAuthError::invalid_grant("authorization code expired"));
        }
        if code.used {
            warn!(client_id, "redemption attempt on an already-used code");
            return Err(OAuthError::invalid_grant("authorization code already used"));
        }
        if code.client_id != client_id || code.redirect_uri != redirect_uri {
            return Err(OAuthError::invalid_grant(
                "client_id or redirect_uri does not match the authorization code",
            ));
        }
        if !pkce::verify(code_verifier, &code.code_challenge, &code.code_challenge_method) {
            return Err(OAuthError::invalid_grant("PKCE verification failed"));
        }

        // The compare-and-swap is the only thing standing between two
        // concurrent redemptions; everything above was advisory.
        let won = store.mark_code_used(code_value).await.map_err(|e| {
            tracing::error!("mark_code_used failed: {e}");
            OAuthError::server_error("storage failure")
        })?;
        if !won {
            warn!(client_id, "lost the code redemption race");
            return Err(OAuthError::invalid_grant("authorization code already used"));
        }

        let expires_in = resources.config.access_token_ttl_secs as i64;
        let now = Utc::now();
        let token = AccessToken {
            token: generate_opaque_token().map_err(|e| {
                tracing::error!("token generation failed: {e}");
                OAuthError::server_error("failed to generate access token")
            })?,
            client_id: code.client_id.clone(),
            user_id: code.user_id,
            scope: code.scope.clone(),
            expires_at: now + Duration::seconds(expires_in),
            created_at: now,
        };
        store.put_token(token.clone()).await.map_err(|e| {
            tracing::error!("token persistence failed: {e}");
            OAuthError::server_error("storage failure")
        })?;

        // Redundant with TTL expiry, so failure here is not fatal.
        if let Err(e) = store.delete_code(code_value).await {
            warn!("failed to delete redeemed code: {e}");
        }

        info!(client_id, user_id = %code.user_id, "access token issued");
        Ok(TokenResponse {
            access_token: token.token,
            token_type: "Bearer".to_owned(),
            expires_in,
            scope: token.scope,
        })
    }

    /// `POST /introspect` - resolve a bearer token for a resource server.
    async fn handle_introspect(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let Some(configured) = resources.config.resource_secret.as_deref() else {
            // Deployment error, not a client error.
            tracing::error!("introspection requested but RESOURCE_SECRET is not configured");
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "server_error",
                    "error_description": "introspection is not configured",
                })),
            )
                .into_response());
        };

        let presented = headers
            .get("x-resource-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !constant_time_eq(presented, configured) {
            warn!("introspection with a bad resource secret");
            return Ok((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "invalid_client",
                    "error_description": "resource secret mismatch",
                })),
            )
                .into_response());
        }

        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let Some(token_value) = bearer else {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "invalid_request",
                    "error_description": "a bearer token is required",
                })),
            )
                .into_response());
        };

        // Expired and nonexistent tokens produce identical responses.
        let response = match resources.store.get_token(token_value).await? {
            Some(token) if !token.is_expired(Utc::now()) => IntrospectionResponse {
                active: true,
                scope: token.scope,
                client_id: Some(token.client_id),
                user_id: Some(token.user_id.to_string()),
                exp: Some(token.expires_at.timestamp()),
            },
            _ => IntrospectionResponse::inactive(),
        };
        Ok(Json(response).into_response())
    }

    /// `GET /.well-known/oauth-authorization-server` - discovery document.
    async fn handle_discovery(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Response {
        let issuer = resources
            .config
            .issuer_url
            .clone()
            .unwrap_or_else(|| Self::derive_issuer(&headers));

        // Advertised coarsely: client_secret_post appears if any
        // registered client carries a secret.
        let mut auth_methods = vec!["none"];
        if resources
            .registry
            .clients()
            .iter()
            .any(|c| c.effective_auth_method() == TokenEndpointAuthMethod::ClientSecretPost)
        {
            auth_methods.push("client_secret_post");
        }

        Json(serde_json::json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
            "introspection_endpoint": format!("{issuer}/introspect"),
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code"],
            "code_challenge_methods_supported": ["S256"],
            "token_endpoint_auth_methods_supported": auth_methods,
        }))
        .into_response()
    }

    /// Derive the issuer from the inbound request when none is pinned:
    /// scheme from `X-Forwarded-Proto` (default http), host from `Host`.
    fn derive_issuer(headers: &HeaderMap) -> String {
        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let host = headers
            .get("host")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        format!("{proto}://{host}")
    }
}
