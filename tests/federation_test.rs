// ABOUTME: Federation entry/exit tests - start redirect, state persistence, callback misuse
// ABOUTME: Provider network calls are not exercised here; state handling is
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

mod common;

use axum::http::StatusCode;
use common::{assert_found, harness_with, query_param, test_config, TestHarness};
use gatehouse::config::ProviderConfig;

async fn federated_harness() -> TestHarness {
    let mut config = test_config();
    config.google = Some(ProviderConfig {
        client_id: "our-google-id".to_owned(),
        client_secret: "our-google-secret".to_owned(),
        redirect_uri: "https://id.example.com/oauth/providers/google/callback".to_owned(),
        scopes: String::new(),
    });
    harness_with(config).await
}

#[tokio::test]
async fn start_redirects_to_the_provider_with_pkce_and_state() {
    let h = federated_harness().await;
    let response = h.get("/oauth/providers/google/start").await;
    let target = assert_found(&response);

    assert!(target.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert_eq!(query_param(&target, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(&target, "client_id").as_deref(), Some("our-google-id"));
    assert_eq!(
        query_param(&target, "code_challenge_method").as_deref(),
        Some("S256")
    );
    let state = query_param(&target, "state").unwrap();
    assert!(query_param(&target, "code_challenge").is_some());

    // The state record was persisted and is retrievable exactly once.
    let record = h.store.take_provider_state(&state).await.unwrap().unwrap();
    assert_eq!(record.provider, "google");
    assert!(record.redirect_uri.is_none());
    assert!(!record.code_verifier.is_empty());
    assert!(h.store.take_provider_state(&state).await.unwrap().is_none());
}

#[tokio::test]
async fn start_with_allowlisted_redirect_records_it() {
    let h = federated_harness().await;
    let response = h
        .get(&format!(
            "/oauth/providers/google/start?redirect_uri={}",
            urlencoding::encode("https://portal.example.com/after-login"),
        ))
        .await;
    let target = assert_found(&response);
    let state = query_param(&target, "state").unwrap();
    let record = h.store.take_provider_state(&state).await.unwrap().unwrap();
    assert_eq!(
        record.redirect_uri.as_deref(),
        Some("https://portal.example.com/after-login")
    );
}

#[tokio::test]
async fn start_rejects_non_allowlisted_redirect() {
    let h = federated_harness().await;
    let response = h
        .get(&format!(
            "/oauth/providers/google/start?redirect_uri={}",
            urlencoding::encode("https://evil.example.com/phish"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_provider_is_404() {
    let h = federated_harness().await;
    let response = h.get("/oauth/providers/gitlab/start").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_with_unknown_state_is_400() {
    let h = federated_harness().await;
    let response = h
        .get("/oauth/providers/google/callback?code=c&state=never-issued")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_error_is_surfaced_and_consumes_the_state() {
    let h = federated_harness().await;
    let start = h.get("/oauth/providers/google/start").await;
    let state = query_param(&assert_found(&start), "state").unwrap();

    let response = h
        .get(&format!(
            "/oauth/providers/google/callback?state={state}&error=access_denied&error_description=user+cancelled"
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The state was consumed even though the callback failed.
    assert!(h.store.take_provider_state(&state).await.unwrap().is_none());
}

#[tokio::test]
async fn callback_without_code_is_400_and_state_cannot_be_replayed() {
    let h = federated_harness().await;
    let start = h.get("/oauth/providers/google/start").await;
    let state = query_param(&assert_found(&start), "state").unwrap();

    let response = h
        .get(&format!("/oauth/providers/google/callback?state={state}"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Replaying the same state now fails as unknown.
    let response = h
        .get(&format!("/oauth/providers/google/callback?code=c&state={state}"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_for_the_wrong_provider_rejects_the_state() {
    let mut config = test_config();
    config.google = Some(ProviderConfig {
        client_id: "g".to_owned(),
        client_secret: "gs".to_owned(),
        redirect_uri: "https://id.example.com/oauth/providers/google/callback".to_owned(),
        scopes: String::new(),
    });
    config.github = Some(ProviderConfig {
        client_id: "h".to_owned(),
        client_secret: "hs".to_owned(),
        redirect_uri: "https://id.example.com/oauth/providers/github/callback".to_owned(),
        scopes: String::new(),
    });
    let h = harness_with(config).await;

    let start = h.get("/oauth/providers/google/start").await;
    let state = query_param(&assert_found(&start), "state").unwrap();

    let response = h
        .get(&format!("/oauth/providers/github/callback?code=c&state={state}"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
