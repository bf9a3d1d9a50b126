// ABOUTME: Federation entry and exit points for login-with-provider flows
// ABOUTME: State records are consumed exactly once, on success and on failure alike
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! `/oauth/providers/:id/start` and `/oauth/providers/:id/callback`.
//!
//! The start handler persists a one-time `ProviderState` and sends the
//! browser to the provider; the callback takes the state back atomically,
//! exchanges the code, maps the profile to a local user, and completes
//! with either a redirect to the caller or a JSON body.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::federation::ensure_user;
use crate::models::ProviderState;
use crate::pkce;
use crate::resources::ServerResources;
use crate::routes::{append_query, found, html_page};
use crate::tokens::generate_opaque_token;

/// Routes for external provider federation.
pub struct FederationRoutes;

/// Query parameters of the start endpoint.
#[derive(Debug, Deserialize)]
pub struct StartParams {
    redirect_uri: Option<String>,
}

/// Query parameters the provider sends to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl FederationRoutes {
    /// Create the federation routes.
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/oauth/providers/:id/start", get(Self::handle_start))
            .route("/oauth/providers/:id/callback", get(Self::handle_callback))
            .with_state(resources)
    }

    /// `GET /oauth/providers/:id/start` - begin a provider login flow.
    async fn handle_start(
        State(resources): State<Arc<ServerResources>>,
        Path(provider_id): Path<String>,
        Query(params): Query<StartParams>,
    ) -> Result<Response, AppError> {
        let Some(provider) = resources.federation.provider(&provider_id) else {
            return Ok(html_page(
                StatusCode::NOT_FOUND,
                resources
                    .templates
                    .render_error("Unknown provider", "no such identity provider is configured"),
            ));
        };

        // The caller here is an arbitrary browser flow, not a registered
        // client, so its redirect target comes from a separate allowlist.
        if let Some(redirect) = params.redirect_uri.as_deref() {
            if !resources
                .config
                .login_redirect_allowlist
                .iter()
                .any(|allowed| allowed == redirect)
            {
                warn!(provider = provider_id, redirect, "redirect_uri not on the login allowlist");
                return Ok(html_page(
                    StatusCode::BAD_REQUEST,
                    resources
                        .templates
                        .render_error("Invalid request", "redirect_uri is not allowed"),
                ));
            }
        }

        let verifier = pkce::generate_verifier();
        let challenge = pkce::compute_challenge(&verifier);
        let state = ProviderState {
            state: generate_opaque_token()?,
            provider: provider.id.to_owned(),
            redirect_uri: params.redirect_uri.clone(),
            code_verifier: verifier,
            expires_at: Utc::now()
                + Duration::seconds(resources.config.provider_state_ttl_secs as i64),
        };
        let authorize_url = provider.build_authorize_url(&state.state, &challenge);
        resources.store.put_provider_state(state).await?;

        info!(provider = provider_id, "federation flow started");
        Ok(found(&authorize_url))
    }

    /// `GET /oauth/providers/:id/callback` - complete a provider flow.
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        Path(provider_id): Path<String>,
        Query(params): Query<CallbackParams>,
    ) -> Result<Response, AppError> {
        // Consume the state first so it is gone on every path out of here.
        let taken = match params.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) => resources.store.take_provider_state(state).await?,
            None => None,
        };

        if let Some(error) = params.error.as_deref() {
            let description = params
                .error_description
                .as_deref()
                .unwrap_or("the provider reported an error");
            warn!(provider = provider_id, error, "provider callback carried an error");
            return Ok(html_page(
                StatusCode::BAD_REQUEST,
                resources
                    .templates
                    .render_error("Sign-in failed", &format!("{error}: {description}")),
            ));
        }

        let Some(record) = taken else {
            return Ok(Self::callback_error(&resources, "invalid or reused state"));
        };
        if record.provider != provider_id {
            warn!(
                provider = provider_id,
                stored = record.provider,
                "callback provider does not match the stored state"
            );
            return Ok(Self::callback_error(&resources, "invalid or reused state"));
        }
        if record.is_expired(Utc::now()) {
            return Ok(Self::callback_error(&resources, "this sign-in attempt has expired"));
        }
        let Some(code) = params.code.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(Self::callback_error(&resources, "missing authorization code"));
        };

        let Some(provider) = resources.federation.provider(&provider_id) else {
            return Ok(Self::callback_error(&resources, "no such identity provider"));
        };

        let token = resources
            .federation
            .exchange_code(provider, code, &record.code_verifier)
            .await?;
        let profile = resources
            .federation
            .fetch_profile(provider, &token.access_token)
            .await?;
        let identity = ensure_user(&resources.store, provider, &profile, &token).await?;

        info!(
            provider = provider_id,
            user_id = %identity.user_id,
            "federation login completed"
        );

        let user_id = identity.user_id.to_string();
        match record.redirect_uri.as_deref() {
            Some(redirect) => Ok(found(&append_query(
                redirect,
                &[
                    ("user_id", user_id.as_str()),
                    ("provider", identity.provider.as_str()),
                    ("provider_user_id", identity.provider_user_id.as_str()),
                ],
            ))),
            None => Ok(Json(serde_json::json!({
                "user_id": identity.user_id,
                "provider": identity.provider,
                "provider_user_id": identity.provider_user_id,
            }))
            .into_response()),
        }
    }

    fn callback_error(resources: &Arc<ServerResources>, message: &str) -> Response {
        html_page(
            StatusCode::BAD_REQUEST,
            resources.templates.render_error("Sign-in failed", message),
        )
    }
}
