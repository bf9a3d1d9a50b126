// ABOUTME: Credential store contract - the durable record collaborator boundary
// ABOUTME: Atomic CRUD plus the compare-and-swap that makes codes single-use
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! The credential store boundary.
//!
//! Everything durable the server touches goes through [`CredentialStore`].
//! The protocol engine owns the semantics; the store owns atomicity. Two
//! operations carry the concurrency guarantees the protocol depends on:
//!
//! - [`CredentialStore::mark_code_used`] is a compare-and-swap: it flips a
//!   code's `used` flag from false to true and reports whether this caller
//!   won. Concurrent redemptions of the same code race here, and exactly
//!   one wins.
//! - [`CredentialStore::take_provider_state`] atomically deletes and
//!   returns a federation state record, so a provider callback can be
//!   honored at most once.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    AccessToken, AuthorizationCode, ExternalIdentity, LocalUser, PendingAuthorization,
    ProviderState, UserCredentials,
};

/// Per-entity deletion counts from one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    /// Expired pending authorizations removed.
    pub pending: usize,
    /// Expired authorization codes removed.
    pub codes: usize,
    /// Expired access tokens removed.
    pub tokens: usize,
    /// Expired provider states removed.
    pub provider_states: usize,
}

impl PurgeCounts {
    /// Total records removed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending + self.codes + self.tokens + self.provider_states
    }
}

/// Durable storage for every credential the server issues.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // Pending authorizations.

    /// Persist a new pending authorization.
    async fn put_pending(&self, pending: PendingAuthorization) -> Result<(), AppError>;

    /// Fetch a pending authorization by id.
    async fn get_pending(&self, id: &str) -> Result<Option<PendingAuthorization>, AppError>;

    /// Bind an authenticated user to a pending authorization. Returns the
    /// updated record, or `None` if the id does not exist.
    async fn bind_pending_user(
        &self,
        id: &str,
        user_id: Uuid,
    ) -> Result<Option<PendingAuthorization>, AppError>;

    /// Delete a pending authorization.
    async fn delete_pending(&self, id: &str) -> Result<(), AppError>;

    // Authorization codes.

    /// Persist a freshly issued authorization code.
    async fn put_code(&self, code: AuthorizationCode) -> Result<(), AppError>;

    /// Fetch a code record by value.
    async fn get_code(&self, code: &str) -> Result<Option<AuthorizationCode>, AppError>;

    /// Atomically flip the code's `used` flag from false to true.
    /// Returns `true` iff this call performed the flip; a second caller,
    /// or a call for a missing code, gets `false`.
    async fn mark_code_used(&self, code: &str) -> Result<bool, AppError>;

    /// Delete a code record.
    async fn delete_code(&self, code: &str) -> Result<(), AppError>;

    // Access tokens.

    /// Persist an access token.
    async fn put_token(&self, token: AccessToken) -> Result<(), AppError>;

    /// Fetch a token record by value.
    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>, AppError>;

    /// Delete a token record.
    async fn delete_token(&self, token: &str) -> Result<(), AppError>;

    // Federation provider states.

    /// Persist a federation state record.
    async fn put_provider_state(&self, state: ProviderState) -> Result<(), AppError>;

    /// Atomically remove and return the state record, if present. After
    /// this returns `Some`, no other caller can obtain the same record.
    async fn take_provider_state(&self, state: &str) -> Result<Option<ProviderState>, AppError>;

    // External identities.

    /// Find the identity linked to `(provider, provider_user_id)`.
    async fn find_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<ExternalIdentity>, AppError>;

    /// Insert or replace the identity keyed by
    /// `(provider, provider_user_id)`, preserving the original record id
    /// and linked user on replace.
    async fn upsert_identity(&self, identity: ExternalIdentity) -> Result<ExternalIdentity, AppError>;

    // Users and credentials.

    /// Persist a local user.
    async fn put_user(&self, user: LocalUser) -> Result<(), AppError>;

    /// Fetch a local user by id.
    async fn get_user(&self, id: Uuid) -> Result<Option<LocalUser>, AppError>;

    /// Persist password credentials for a user.
    async fn put_credentials(&self, credentials: UserCredentials) -> Result<(), AppError>;

    /// Fetch credentials by login name.
    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AppError>;

    // Hygiene.

    /// Remove every record whose `expires_at` is in the past relative to
    /// `now`. Never touches unexpired records, users, credentials, or
    /// identities.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeCounts, AppError>;
}
