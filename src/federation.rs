// ABOUTME: Client-role OAuth against external identity providers (Google, GitHub)
// ABOUTME: Authorize-URL construction, code exchange, userinfo fetch, local user mapping
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! External provider federation.
//!
//! For delegated login this server plays the OAuth *client* role toward a
//! third-party IdP, with its own PKCE pair per flow. A [`FederationClient`]
//! owns the provider table and a bounded-timeout `reqwest` client; the
//! routes layer drives it and owns the `ProviderState` single-use
//! bookkeeping.

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::errors::AppError;
use crate::models::{ExternalIdentity, LocalUser};
use crate::store::CredentialStore;

/// Timeout for provider token and userinfo calls.
pub const PROVIDER_HTTP_TIMEOUT_SECS: u64 = 5;

/// Which profile mapping a provider uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OIDC userinfo with `sub`/`name`/`email`.
    Google,
    /// REST user endpoint with numeric `id`/`login`/`name`.
    GitHub,
}

/// A fully resolved external provider.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider id as it appears in URLs (`google`, `github`).
    pub id: &'static str,
    /// Profile mapping flavor.
    pub kind: ProviderKind,
    /// Our client id at the provider.
    pub client_id: String,
    /// Our client secret at the provider.
    pub client_secret: String,
    /// Callback URI registered at the provider.
    pub redirect_uri: String,
    /// Space-separated scopes to request.
    pub scopes: String,
    /// Provider's authorization endpoint.
    pub authorize_url: String,
    /// Provider's token endpoint.
    pub token_url: String,
    /// Provider's userinfo endpoint.
    pub userinfo_url: String,
}

impl Provider {
    fn google(config: ProviderConfig) -> Self {
        Self {
            id: "google",
            kind: ProviderKind::Google,
            client_id: config.client_id,
            client_secret: config.client_secret,
            redirect_uri: config.redirect_uri,
            scopes: if config.scopes.is_empty() {
                "openid profile email".to_owned()
            } else {
                config.scopes
            },
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_owned(),
            token_url: "https://oauth2.googleapis.com/token".to_owned(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_owned(),
        }
    }

    fn github(config: ProviderConfig) -> Self {
        Self {
            id: "github",
            kind: ProviderKind::GitHub,
            client_id: config.client_id,
            client_secret: config.client_secret,
            redirect_uri: config.redirect_uri,
            scopes: if config.scopes.is_empty() {
                "read:user user:email".to_owned()
            } else {
                config.scopes
            },
            authorize_url: "https://github.com/login/oauth/authorize".to_owned(),
            token_url: "https://github.com/login/oauth/access_token".to_owned(),
            userinfo_url: "https://api.github.com/user".to_owned(),
        }
    }

    /// Build the provider authorize URL for one flow.
    #[must_use]
    pub fn build_authorize_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }
}

/// Token response from a provider's token endpoint. Providers omit fields
/// freely, so everything but `access_token` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokenResponse {
    /// Provider access token.
    pub access_token: String,
    /// Refresh token, when the provider grants one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, when reported.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Scope actually granted.
    #[serde(default)]
    pub scope: Option<String>,
    /// OIDC id_token, when the provider issues one.
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Normalized profile extracted from a provider userinfo response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Stable id at the provider.
    pub provider_user_id: String,
    /// Best available human name.
    pub display_name: String,
}

/// Map a Google OIDC userinfo document. `sub` is required; the display
/// name falls back through `name`, `email`, then "Unknown User".
pub(crate) fn map_google_profile(doc: &Value) -> Option<ProviderProfile> {
    let sub = doc.get("sub")?.as_str()?;
    let display_name = doc
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| doc.get("email").and_then(Value::as_str))
        .unwrap_or("Unknown User");
    Some(ProviderProfile {
        provider_user_id: sub.to_owned(),
        display_name: display_name.to_owned(),
    })
}

/// Map a GitHub user document. The numeric `id` is required and prefixed
/// to keep provider id spaces disjoint; the display name falls back
/// through `name`, `login`, `email`, then "Unknown User".
pub(crate) fn map_github_profile(doc: &Value) -> Option<ProviderProfile> {
    let id = doc.get("id")?.as_i64()?;
    let display_name = doc
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| doc.get("login").and_then(Value::as_str))
        .or_else(|| doc.get("email").and_then(Value::as_str))
        .unwrap_or("Unknown User");
    Some(ProviderProfile {
        provider_user_id: format!("github-{id}"),
        display_name: display_name.to_owned(),
    })
}

/// OAuth client toward the configured external providers.
pub struct FederationClient {
    providers: HashMap<&'static str, Provider>,
    http: reqwest::Client,
}

impl FederationClient {
    /// Build the provider table from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        google: Option<ProviderConfig>,
        github: Option<ProviderConfig>,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(PROVIDER_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;

        let mut providers = HashMap::new();
        if let Some(config) = google {
            providers.insert("google", Provider::google(config));
        }
        if let Some(config) = github {
            providers.insert("github", Provider::github(config));
        }
        Ok(Self { providers, http })
    }

    /// Look up a configured provider by id.
    #[must_use]
    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.get(id)
    }

    /// Exchange an authorization code (plus our PKCE verifier) for a
    /// provider token.
    ///
    /// # Errors
    /// Any transport failure, non-success status, or missing
    /// `access_token` is a hard failure for the federation attempt.
    pub async fn exchange_code(
        &self,
        provider: &Provider,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderTokenResponse, AppError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", provider.redirect_uri.as_str()),
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.as_str()),
            ("code_verifier", code_verifier),
        ];
        let response = self
            .http
            .post(&provider.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::provider(format!("{} token exchange failed: {e}", provider.id)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(provider = provider.id, %status, "provider token endpoint returned an error");
            return Err(AppError::provider(format!(
                "{} token endpoint returned {status}",
                provider.id
            )));
        }

        let token: ProviderTokenResponse = response.json().await.map_err(|e| {
            AppError::provider(format!("{} token response unreadable: {e}", provider.id))
        })?;
        if token.access_token.is_empty() {
            return Err(AppError::provider(format!(
                "{} token response carried no access_token",
                provider.id
            )));
        }
        Ok(token)
    }

    /// Fetch and normalize the user profile behind a provider access token.
    ///
    /// # Errors
    /// Transport failures, non-success statuses, and documents missing
    /// the provider's stable id are all hard failures.
    pub async fn fetch_profile(
        &self,
        provider: &Provider,
        access_token: &str,
    ) -> Result<ProviderProfile, AppError> {
        let mut request = self
            .http
            .get(&provider.userinfo_url)
            .bearer_auth(access_token)
            .header("Accept", "application/json");
        if provider.kind == ProviderKind::GitHub {
            // GitHub's API rejects requests without a User-Agent.
            request = request.header("User-Agent", "gatehouse");
        }

        let response = request.send().await.map_err(|e| {
            AppError::provider(format!("{} userinfo fetch failed: {e}", provider.id))
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::provider(format!(
                "{} userinfo endpoint returned {status}",
                provider.id
            )));
        }
        let doc: Value = response.json().await.map_err(|e| {
            AppError::provider(format!("{} userinfo response unreadable: {e}", provider.id))
        })?;

        let profile = match provider.kind {
            ProviderKind::Google => map_google_profile(&doc),
            ProviderKind::GitHub => map_github_profile(&doc),
        };
        profile.ok_or_else(|| {
            AppError::provider(format!(
                "{} userinfo response missing a stable user id",
                provider.id
            ))
        })
    }
}

/// Resolve the local user behind a provider profile, creating one on
/// first login, and record the fresh provider tokens on the identity
/// link.
///
/// # Errors
/// Propagates store failures.
pub async fn ensure_user(
    store: &Arc<dyn CredentialStore>,
    provider: &Provider,
    profile: &ProviderProfile,
    token: &ProviderTokenResponse,
) -> Result<ExternalIdentity, AppError> {
    let user_id = match store
        .find_identity(provider.id, &profile.provider_user_id)
        .await?
    {
        Some(existing) => existing.user_id,
        None => {
            let user = LocalUser {
                id: Uuid::new_v4(),
                display_name: profile.display_name.clone(),
                created_at: Utc::now(),
            };
            store.put_user(user.clone()).await?;
            info!(
                provider = provider.id,
                user_id = %user.id,
                "created local user for first federation login"
            );
            user.id
        }
    };

    let identity = ExternalIdentity {
        id: Uuid::new_v4(),
        provider: provider.id.to_owned(),
        provider_user_id: profile.provider_user_id.clone(),
        user_id,
        access_token: token.access_token.clone(),
        refresh_token: token.refresh_token.clone().unwrap_or_default(),
        scope: token.scope.clone(),
        expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        id_token: token.id_token.clone().unwrap_or_default(),
    };
    // upsert preserves the original id and user link when the identity
    // already exists.
    store.upsert_identity(identity).await
}
