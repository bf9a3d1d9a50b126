// ABOUTME: Authorization endpoint, login, and consent - the pending-authorization state machine
// ABOUTME: Pre-redirect failures render HTML 400; post-verification failures 302 back to the client
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! `/authorize` and its login/consent continuation.
//!
//! The pending authorization moves `created` → `authenticated` →
//! `consumed` (code issued or denied) or `expired`. Errors found before
//! the `redirect_uri` is verified against the registry can never be
//! redirected, so they render a 400 page; everything after rides a 302
//! back to the client with `error`/`error_description`/`state`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{AppError, OAuthError};
use crate::models::{AuthorizationCode, AuthorizationRequest, PendingAuthorization};
use crate::pkce;
use crate::resources::ServerResources;
use crate::routes::{append_query, found, html_page, redirect_with_error};
use crate::tokens::generate_opaque_token;

/// Routes for the authorization endpoint and its login/consent pages.
pub struct AuthorizeRoutes;

/// Query parameters of `GET /authorize`. Everything is optional at the
/// extractor level; validation order is the handler's business.
#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    response_type: Option<String>,
    client_id: Option<String>,
    redirect_uri: Option<String>,
    scope: Option<String>,
    state: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
}

/// Form body of `POST /authorize/login`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pending_id: String,
    username: String,
    password: String,
}

/// Parameters of the consent view and decision.
#[derive(Debug, Deserialize)]
pub struct ConsentParams {
    pending_id: String,
    decision: Option<String>,
}

impl AuthorizeRoutes {
    /// Create the authorization routes.
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/authorize", get(Self::handle_authorize))
            .route("/authorize/login", post(Self::handle_login))
            .route(
                "/authorize/consent",
                get(Self::handle_consent_view).post(Self::handle_consent_decision),
            )
            .with_state(resources)
    }

    /// `GET /authorize` - validate the request and open the login window.
    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        Query(params): Query<AuthorizeParams>,
    ) -> Result<Response, AppError> {
        // Pre-redirect checks. Until the redirect_uri is confirmed
        // registered there is no safe place to send an error.
        if params.response_type.as_deref() != Some("code") {
            return Ok(Self::error_page(
                &resources,
                "only the 'code' response_type is supported",
            ));
        }
        let Some(client_id) = params.client_id.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(Self::error_page(&resources, "missing client_id"));
        };
        let Some(client) = resources.registry.lookup(client_id) else {
            warn!(client_id, "authorize request for unknown client");
            return Ok(Self::error_page(&resources, "unknown client"));
        };
        let Some(redirect_uri) = params.redirect_uri.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(Self::error_page(&resources, "missing redirect_uri"));
        };
        if !resources.registry.redirect_uri_allowed(client_id, redirect_uri) {
            warn!(client_id, redirect_uri, "unregistered redirect_uri");
            return Ok(Self::error_page(
                &resources,
                "redirect_uri is not registered for this client",
            ));
        }

        // The redirect target is now trusted; report the rest through it.
        let state = params.state.as_deref();
        let Some(challenge) = params.code_challenge.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(redirect_with_error(
                redirect_uri,
                &OAuthError::invalid_request("code_challenge is required"),
                state,
            ));
        };
        let method = params.code_challenge_method.as_deref().unwrap_or("S256");
        if method != "S256" {
            return Ok(redirect_with_error(
                redirect_uri,
                &OAuthError::invalid_request("only the S256 code_challenge_method is supported"),
                state,
            ));
        }
        if !pkce::validate_challenge_format(challenge) {
            return Ok(redirect_with_error(
                redirect_uri,
                &OAuthError::invalid_request("malformed code_challenge"),
                state,
            ));
        }

        let pending = PendingAuthorization {
            id: generate_opaque_token()?,
            request: AuthorizationRequest {
                response_type: "code".to_owned(),
                client_id: client_id.to_owned(),
                redirect_uri: redirect_uri.to_owned(),
                scope: params.scope.clone(),
                state: params.state.clone(),
                code_challenge: challenge.to_owned(),
                code_challenge_method: "S256".to_owned(),
            },
            user_id: None,
            expires_at: Utc::now()
                + Duration::seconds(resources.config.pending_auth_ttl_secs as i64),
        };
        let pending_id = pending.id.clone();
        resources.store.put_pending(pending).await?;
        info!(client_id, "pending authorization created");

        // Hand the browser to the external login UI when one is
        // configured, otherwise serve the built-in form.
        if let Some(login_ui) = resources.config.login_ui_url.as_deref() {
            let url = append_query(
                login_ui,
                &[
                    ("pending_id", pending_id.as_str()),
                    ("client_id", client_id),
                    ("client_name", client.client_name.as_str()),
                ],
            );
            return Ok(found(&url));
        }
        Ok(html_page(
            StatusCode::OK,
            resources
                .templates
                .render_login(&pending_id, &client.client_name, None),
        ))
    }

    /// `POST /authorize/login` - authenticate and bind the user.
    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        Form(form): Form<LoginForm>,
    ) -> Result<Response, AppError> {
        let Some(pending) = Self::load_live_pending(&resources, &form.pending_id).await? else {
            return Ok(Self::error_page(
                &resources,
                "this sign-in request is invalid or has expired",
            ));
        };
        let client_name = resources
            .registry
            .lookup(&pending.request.client_id)
            .map_or_else(|| pending.request.client_id.clone(), |c| c.client_name.clone());

        let credentials = resources
            .store
            .get_credentials_by_username(&form.username)
            .await?;

        // Verify even when the user is unknown so the form never
        // distinguishes "unknown user" from "wrong password".
        let verified = match credentials {
            Some(creds) => {
                let password = form.password.clone();
                let hash = creds.password_hash.clone();
                let ok = tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash))
                    .await
                    .map_err(|e| AppError::internal(format!("bcrypt task failed: {e}")))?
                    .unwrap_or(false);
                ok.then_some(creds.user_id)
            }
            None => None,
        };

        let Some(user_id) = verified else {
            info!(username = %form.username, "login attempt failed");
            return Ok(html_page(
                StatusCode::OK,
                resources.templates.render_login(
                    &form.pending_id,
                    &client_name,
                    Some("Invalid username or password"),
                ),
            ));
        };

        let Some(pending) = resources
            .store
            .bind_pending_user(&form.pending_id, user_id)
            .await?
        else {
            // Deleted between load and bind; treat like an expired request.
            return Ok(Self::error_page(
                &resources,
                "this sign-in request is invalid or has expired",
            ));
        };
        info!(client_id = %pending.request.client_id, %user_id, "user authenticated");

        Self::advance_to_consent(&resources, pending, user_id).await
    }

    /// `GET /authorize/consent` - render the consent view (or auto-approve
    /// for trusted clients).
    async fn handle_consent_view(
        State(resources): State<Arc<ServerResources>>,
        Query(params): Query<ConsentParams>,
    ) -> Result<Response, AppError> {
        let Some(pending) = Self::load_live_pending(&resources, &params.pending_id).await? else {
            return Ok(Self::error_page(
                &resources,
                "this sign-in request is invalid or has expired",
            ));
        };
        let Some(user_id) = pending.user_id else {
            return Ok(Self::error_page(&resources, "authentication is required"));
        };
        Self::advance_to_consent(&resources, pending, user_id).await
    }

    /// `POST /authorize/consent` - process an allow/deny decision.
    async fn handle_consent_decision(
        State(resources): State<Arc<ServerResources>>,
        Form(params): Form<ConsentParams>,
    ) -> Result<Response, AppError> {
        let Some(pending) = Self::load_live_pending(&resources, &params.pending_id).await? else {
            return Ok(Self::error_page(
                &resources,
                "this sign-in request is invalid or has expired",
            ));
        };
        let Some(user_id) = pending.user_id else {
            return Ok(Self::error_page(&resources, "authentication is required"));
        };

        match params.decision.as_deref() {
            Some("allow") => Self::finish_with_allow(&resources, pending, user_id).await,
            Some("deny") => {
                resources.store.delete_pending(&pending.id).await?;
                info!(client_id = %pending.request.client_id, "consent denied");
                Ok(redirect_with_error(
                    &pending.request.redirect_uri,
                    &OAuthError::access_denied(),
                    pending.request.state.as_deref(),
                ))
            }
            _ => Ok(Self::error_page(&resources, "invalid consent decision")),
        }
    }

    /// Show consent, or skip straight to approval for a trusted client.
    async fn advance_to_consent(
        resources: &Arc<ServerResources>,
        pending: PendingAuthorization,
        user_id: Uuid,
    ) -> Result<Response, AppError> {
        let trusted = resources
            .registry
            .lookup(&pending.request.client_id)
            .is_some_and(|c| c.trusted);
        if trusted {
            return Self::finish_with_allow(resources, pending, user_id).await;
        }
        let client_name = resources
            .registry
            .lookup(&pending.request.client_id)
            .map_or_else(|| pending.request.client_id.clone(), |c| c.client_name.clone());
        Ok(html_page(
            StatusCode::OK,
            resources.templates.render_consent(
                &pending.id,
                &client_name,
                pending.request.scope.as_deref(),
            ),
        ))
    }

    /// Consume the pending authorization and issue a code.
    async fn finish_with_allow(
        resources: &Arc<ServerResources>,
        pending: PendingAuthorization,
        user_id: Uuid,
    ) -> Result<Response, AppError> {
        // The pending record is consumed regardless of what happens next.
        resources.store.delete_pending(&pending.id).await?;

        let request = pending.request;
        let issued = Self::issue_code(resources, &request, user_id).await;
        match issued {
            Ok(code) => {
                info!(client_id = %request.client_id, %user_id, "authorization code issued");
                let mut params = vec![("code", code.as_str())];
                if let Some(state) = request.state.as_deref() {
                    params.push(("state", state));
                }
                Ok(found(&append_query(&request.redirect_uri, &params)))
            }
            Err(e) => {
                tracing::error!("code issuance failed: {e}");
                Ok(redirect_with_error(
                    &request.redirect_uri,
                    &OAuthError::server_error("failed to issue authorization code"),
                    request.state.as_deref(),
                ))
            }
        }
    }

    /// Generate and persist an authorization code for an approved request.
    async fn issue_code(
        resources: &Arc<ServerResources>,
        request: &AuthorizationRequest,
        user_id: Uuid,
    ) -> Result<String, AppError> {
        let code = AuthorizationCode {
            code: generate_opaque_token()?,
            client_id: request.client_id.clone(),
            user_id,
            redirect_uri: request.redirect_uri.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
            scope: request.scope.clone(),
            state: request.state.clone(),
            expires_at: Utc::now()
                + Duration::seconds(resources.config.auth_code_ttl_secs as i64),
            used: false,
        };
        let value = code.code.clone();
        resources.store.put_code(code).await?;
        Ok(value)
    }

    /// Load a pending authorization, treating expiry as absence (and
    /// deleting the stale record).
    async fn load_live_pending(
        resources: &Arc<ServerResources>,
        pending_id: &str,
    ) -> Result<Option<PendingAuthorization>, AppError> {
        match resources.store.get_pending(pending_id).await? {
            Some(pending) if pending.is_expired(Utc::now()) => {
                resources.store.delete_pending(pending_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn error_page(resources: &Arc<ServerResources>, message: &str) -> Response {
        html_page(
            StatusCode::BAD_REQUEST,
            resources.templates.render_error("Invalid request", message),
        )
    }
}
