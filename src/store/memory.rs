// ABOUTME: In-memory CredentialStore on dashmap, used by the binary and tests
// ABOUTME: Per-shard locking gives mark_code_used and take_provider_state atomicity
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! In-memory credential store.
//!
//! `DashMap` entry operations hold the shard lock for the duration of the
//! closure, which is what makes [`CredentialStore::mark_code_used`] a real
//! compare-and-swap and `remove` an atomic take.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    AccessToken, AuthorizationCode, ExternalIdentity, LocalUser, PendingAuthorization,
    ProviderState, UserCredentials,
};
use crate::store::{CredentialStore, PurgeCounts};

/// In-memory reference implementation of [`CredentialStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    pending: DashMap<String, PendingAuthorization>,
    codes: DashMap<String, AuthorizationCode>,
    tokens: DashMap<String, AccessToken>,
    provider_states: DashMap<String, ProviderState>,
    /// Keyed by `(provider, provider_user_id)`.
    identities: DashMap<(String, String), ExternalIdentity>,
    users: DashMap<Uuid, LocalUser>,
    /// Keyed by username.
    credentials: DashMap<String, UserCredentials>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn put_pending(&self, pending: PendingAuthorization) -> Result<(), AppError> {
        self.pending.insert(pending.id.clone(), pending);
        Ok(())
    }

    async fn get_pending(&self, id: &str) -> Result<Option<PendingAuthorization>, AppError> {
        Ok(self.pending.get(id).map(|e| e.value().clone()))
    }

    async fn bind_pending_user(
        &self,
        id: &str,
        user_id: Uuid,
    ) -> Result<Option<PendingAuthorization>, AppError> {
        Ok(self.pending.get_mut(id).map(|mut entry| {
            entry.user_id = Some(user_id);
            entry.value().clone()
        }))
    }

    async fn delete_pending(&self, id: &str) -> Result<(), AppError> {
        self.pending.remove(id);
        Ok(())
    }

    async fn put_code(&self, code: AuthorizationCode) -> Result<(), AppError> {
        self.codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn get_code(&self, code: &str) -> Result<Option<AuthorizationCode>, AppError> {
        Ok(self.codes.get(code).map(|e| e.value().clone()))
    }

    async fn mark_code_used(&self, code: &str) -> Result<bool, AppError> {
        // get_mut holds the shard lock, so check-and-set is atomic.
        match self.codes.get_mut(code) {
            Some(mut entry) if !entry.used => {
                entry.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_code(&self, code: &str) -> Result<(), AppError> {
        self.codes.remove(code);
        Ok(())
    }

    async fn put_token(&self, token: AccessToken) -> Result<(), AppError> {
        self.tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>, AppError> {
        Ok(self.tokens.get(token).map(|e| e.value().clone()))
    }

    async fn delete_token(&self, token: &str) -> Result<(), AppError> {
        self.tokens.remove(token);
        Ok(())
    }

    async fn put_provider_state(&self, state: ProviderState) -> Result<(), AppError> {
        self.provider_states.insert(state.state.clone(), state);
        Ok(())
    }

    async fn take_provider_state(&self, state: &str) -> Result<Option<ProviderState>, AppError> {
        Ok(self.provider_states.remove(state).map(|(_, v)| v))
    }

    async fn find_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<ExternalIdentity>, AppError> {
        let key = (provider.to_owned(), provider_user_id.to_owned());
        Ok(self.identities.get(&key).map(|e| e.value().clone()))
    }

    async fn upsert_identity(
        &self,
        identity: ExternalIdentity,
    ) -> Result<ExternalIdentity, AppError> {
        let key = (identity.provider.clone(), identity.provider_user_id.clone());
        let mut stored = identity;
        if let Some(existing) = self.identities.get(&key) {
            stored.id = existing.id;
            stored.user_id = existing.user_id;
        }
        self.identities.insert(key, stored.clone());
        Ok(stored)
    }

    async fn put_user(&self, user: LocalUser) -> Result<(), AppError> {
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<LocalUser>, AppError> {
        Ok(self.users.get(&id).map(|e| e.value().clone()))
    }

    async fn put_credentials(&self, credentials: UserCredentials) -> Result<(), AppError> {
        self.credentials
            .insert(credentials.username.clone(), credentials);
        Ok(())
    }

    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        Ok(self.credentials.get(username).map(|e| e.value().clone()))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeCounts, AppError> {
        let mut counts = PurgeCounts::default();

        let before = self.pending.len();
        self.pending.retain(|_, p| !p.is_expired(now));
        counts.pending = before - self.pending.len();

        let before = self.codes.len();
        self.codes.retain(|_, c| !c.is_expired(now));
        counts.codes = before - self.codes.len();

        let before = self.tokens.len();
        self.tokens.retain(|_, t| !t.is_expired(now));
        counts.tokens = before - self.tokens.len();

        let before = self.provider_states.len();
        self.provider_states.retain(|_, s| !s.is_expired(now));
        counts.provider_states = before - self.provider_states.len();

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorizationRequest;
    use chrono::Duration;
    use std::sync::Arc;

    fn code(value: &str, expires_at: DateTime<Utc>) -> AuthorizationCode {
        AuthorizationCode {
            code: value.to_owned(),
            client_id: "web-app".into(),
            user_id: Uuid::new_v4(),
            redirect_uri: "https://app.example.com/cb".into(),
            code_challenge: "c".repeat(43),
            code_challenge_method: "S256".into(),
            scope: None,
            state: None,
            expires_at,
            used: false,
        }
    }

    fn pending(id: &str, expires_at: DateTime<Utc>) -> PendingAuthorization {
        PendingAuthorization {
            id: id.to_owned(),
            request: AuthorizationRequest {
                response_type: "code".into(),
                client_id: "web-app".into(),
                redirect_uri: "https://app.example.com/cb".into(),
                scope: None,
                state: None,
                code_challenge: "c".repeat(43),
                code_challenge_method: "S256".into(),
            },
            user_id: None,
            expires_at,
        }
    }

    #[tokio::test]
    async fn mark_code_used_wins_exactly_once() {
        let store = MemoryStore::new();
        let expires = Utc::now() + Duration::minutes(10);
        store.put_code(code("abc", expires)).await.unwrap();

        assert!(store.mark_code_used("abc").await.unwrap());
        assert!(!store.mark_code_used("abc").await.unwrap());
        assert!(!store.mark_code_used("missing").await.unwrap());
        assert!(store.get_code("abc").await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn concurrent_redemption_has_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let expires = Utc::now() + Duration::minutes(10);
        store.put_code(code("raced", expires)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.mark_code_used("raced").await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn take_provider_state_is_one_shot() {
        let store = MemoryStore::new();
        store
            .put_provider_state(ProviderState {
                state: "st".into(),
                provider: "google".into(),
                redirect_uri: None,
                code_verifier: "v".repeat(64),
                expires_at: Utc::now() + Duration::minutes(10),
            })
            .await
            .unwrap();

        assert!(store.take_provider_state("st").await.unwrap().is_some());
        assert!(store.take_provider_state("st").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bind_pending_user_sets_field_once() {
        let store = MemoryStore::new();
        let expires = Utc::now() + Duration::minutes(15);
        store.put_pending(pending("p1", expires)).await.unwrap();

        let user = Uuid::new_v4();
        let bound = store.bind_pending_user("p1", user).await.unwrap().unwrap();
        assert_eq!(bound.user_id, Some(user));
        assert!(store
            .bind_pending_user("ghost", user)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn upsert_identity_preserves_id_and_user_link() {
        let store = MemoryStore::new();
        let first = ExternalIdentity {
            id: Uuid::new_v4(),
            provider: "github".into(),
            provider_user_id: "github-42".into(),
            user_id: Uuid::new_v4(),
            access_token: "at1".into(),
            refresh_token: String::new(),
            scope: None,
            expires_at: None,
            id_token: String::new(),
        };
        let stored = store.upsert_identity(first.clone()).await.unwrap();
        assert_eq!(stored.id, first.id);

        let mut second = first.clone();
        second.id = Uuid::new_v4();
        second.user_id = Uuid::new_v4();
        second.access_token = "at2".into();
        let replaced = store.upsert_identity(second).await.unwrap();
        assert_eq!(replaced.id, first.id);
        assert_eq!(replaced.user_id, first.user_id);
        assert_eq!(replaced.access_token, "at2");
    }

    #[tokio::test]
    async fn purge_removes_only_expired_records() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .put_pending(pending("old", now - Duration::minutes(1)))
            .await
            .unwrap();
        store
            .put_pending(pending("fresh", now + Duration::minutes(10)))
            .await
            .unwrap();
        store
            .put_code(code("stale", now - Duration::seconds(1)))
            .await
            .unwrap();
        store
            .put_token(AccessToken {
                token: "live".into(),
                client_id: "web-app".into(),
                user_id: Uuid::new_v4(),
                scope: None,
                expires_at: now + Duration::hours(1),
                created_at: now,
            })
            .await
            .unwrap();

        let counts = store.purge_expired(now).await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.codes, 1);
        assert_eq!(counts.tokens, 0);
        assert_eq!(counts.total(), 2);
        assert!(store.get_pending("fresh").await.unwrap().is_some());
        assert!(store.get_pending("old").await.unwrap().is_none());
        assert!(store.get_token("live").await.unwrap().is_some());
    }
}
