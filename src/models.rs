// ABOUTME: Persistent data model for the authorization server protocol engine
// ABOUTME: Pending authorizations, codes, tokens, provider states, identities, credentials
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Data model entities.
//!
//! Every record here carries an `expires_at`; read paths re-check expiry
//! independently of the cleanup sweep. Opaque ids (pending id, code,
//! token, state) come from [`crate::tokens::generate_opaque_token`] and
//! are bearer secrets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated `/authorize` request, embedded in a pending authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Always `code`.
    pub response_type: String,
    /// Requesting client.
    pub client_id: String,
    /// Exact-match registered redirect URI.
    pub redirect_uri: String,
    /// Requested scope, passed through opaquely.
    pub scope: Option<String>,
    /// Client CSRF state, echoed back on completion.
    pub state: Option<String>,
    /// PKCE S256 code challenge (43 url-safe base64 chars).
    pub code_challenge: String,
    /// Always `S256`.
    pub code_challenge_method: String,
}

/// Server-side record of an in-flight `/authorize` request.
///
/// Lifecycle: created unauthenticated, mutated exactly once when login
/// binds a user, then deleted on the consent decision or by expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// Opaque bearer id carried through the login/consent redirects.
    pub id: String,
    /// The embedded authorization request.
    pub request: AuthorizationRequest,
    /// Authenticated user, `None` until login succeeds.
    pub user_id: Option<Uuid>,
    /// Expiry of the whole login/consent window.
    pub expires_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Whether this record is expired at `now` (expiry at `now` counts).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A single-use authorization code bound to PKCE and the redirect URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Opaque code value.
    pub code: String,
    /// Client the code was issued to.
    pub client_id: String,
    /// User who granted the authorization.
    pub user_id: Uuid,
    /// Redirect URI the code was issued against; must match at redemption.
    pub redirect_uri: String,
    /// Stored PKCE challenge.
    pub code_challenge: String,
    /// Stored PKCE method (always `S256`).
    pub code_challenge_method: String,
    /// Granted scope.
    pub scope: Option<String>,
    /// Client state from the originating request.
    pub state: Option<String>,
    /// Code expiry.
    pub expires_at: DateTime<Utc>,
    /// Single-use flag, flipped exactly once by the store CAS.
    pub used: bool,
}

impl AuthorizationCode {
    /// Whether this code is expired at `now` (expiry at `now` counts).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An opaque bearer access token. Non-renewable; no refresh token exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque token value.
    pub token: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// User the token acts as.
    pub user_id: Uuid,
    /// Granted scope.
    pub scope: Option<String>,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
    /// Issuance timestamp.
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    /// Whether this token is expired at `now` (expiry at `now` counts).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// State record for an in-flight federation flow against an external
/// provider. One-time use: deleted when its callback arrives, success or
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderState {
    /// Opaque state value carried through the provider redirect.
    pub state: String,
    /// Provider id (`google`, `github`, ...).
    pub provider: String,
    /// The caller's redirect URI, if one was supplied at start.
    pub redirect_uri: Option<String>,
    /// PKCE verifier for this server's own exchange with the provider.
    pub code_verifier: String,
    /// State expiry.
    pub expires_at: DateTime<Utc>,
}

impl ProviderState {
    /// Whether this state is expired at `now` (expiry at `now` counts).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Link between an external provider account and a local user.
/// Unique per `(provider, provider_user_id)`; upserted on every
/// successful federation callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Record id.
    pub id: Uuid,
    /// Provider id.
    pub provider: String,
    /// Stable user id at the provider (`sub`, or `github-<id>`).
    pub provider_user_id: String,
    /// Linked local user.
    pub user_id: Uuid,
    /// Provider access token from the latest exchange.
    pub access_token: String,
    /// Provider refresh token; may be empty.
    pub refresh_token: String,
    /// Scope granted by the provider.
    pub scope: Option<String>,
    /// Provider token expiry, if the provider reported one.
    pub expires_at: Option<DateTime<Utc>>,
    /// OIDC id_token if the provider returned one; may be empty.
    pub id_token: String,
}

/// A local user identity. Created at bootstrap for password users or on
/// first federation callback for external users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalUser {
    /// User id.
    pub id: Uuid,
    /// Display name shown on consent screens and in introspection clients.
    pub display_name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Password-login credentials for a local user. One record per user that
/// opts into password login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredentials {
    /// Owning user.
    pub user_id: Uuid,
    /// Login name, unique.
    pub username: String,
    /// bcrypt hash of the password.
    pub password_hash: String,
    /// Display name.
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let token = AccessToken {
            token: "t".to_owned(),
            client_id: "c".to_owned(),
            user_id: Uuid::new_v4(),
            scope: None,
            expires_at: now,
            created_at: now - Duration::hours(1),
        };
        // A record expiring exactly now is already expired.
        assert!(token.is_expired(now));
        assert!(token.is_expired(now + Duration::seconds(1)));
        assert!(!token.is_expired(now - Duration::seconds(1)));
    }
}
