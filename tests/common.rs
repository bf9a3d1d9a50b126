// ABOUTME: Shared test utilities for integration tests
// ABOUTME: Router construction, seeded users and clients, request helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

//! Shared test setup for `gatehouse` integration tests.

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use gatehouse::clients::{Client, TokenEndpointAuthMethod};
use gatehouse::config::{
    ServerConfig, DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_AUTH_CODE_TTL_SECS,
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_PENDING_AUTH_TTL_SECS, DEFAULT_PROVIDER_STATE_TTL_SECS,
};
use gatehouse::models::UserCredentials;
use gatehouse::resources::ServerResources;
use gatehouse::server::build_router;
use gatehouse::store::memory::MemoryStore;
use gatehouse::store::CredentialStore;
use std::sync::{Arc, Once};
use tower::ServiceExt;
use uuid::Uuid;

/// RFC 7636 appendix B verifier/challenge pair, used across tests.
pub const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

/// The resource secret every test harness configures.
pub const RESOURCE_SECRET: &str = "test-resource-secret";

/// Seeded password for the test user `alice`.
pub const ALICE_PASSWORD: &str = "correct horse battery staple";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process).
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// A running test harness: the router plus handles to its internals.
pub struct TestHarness {
    pub router: Router,
    pub store: Arc<dyn CredentialStore>,
    pub resources: Arc<ServerResources>,
    /// Seeded user id for `alice`.
    pub alice_id: Uuid,
}

/// Base configuration used by the harness. Registers:
/// - `client-1`: public client, redirect `http://localhost:5555/callback`
/// - `web-app`: confidential client with secret `s3cret`,
///   redirect `https://app.example.com/cb`
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        issuer_url: Some("https://id.example.com".to_owned()),
        resource_secret: Some(RESOURCE_SECRET.to_owned()),
        clients: vec![
            Client {
                client_id: "client-1".to_owned(),
                client_secret: None,
                redirect_uris: vec!["http://localhost:5555/callback".to_owned()],
                client_name: "Client One".to_owned(),
                token_endpoint_auth_method: Some(TokenEndpointAuthMethod::None),
                trusted: false,
            },
            Client {
                client_id: "web-app".to_owned(),
                client_secret: Some("s3cret".to_owned()),
                redirect_uris: vec!["https://app.example.com/cb".to_owned()],
                client_name: "Web App".to_owned(),
                token_endpoint_auth_method: None,
                trusted: false,
            },
        ],
        first_party: None,
        bootstrap_users: Vec::new(),
        login_redirect_allowlist: vec!["https://portal.example.com/after-login".to_owned()],
        login_ui_url: None,
        pending_auth_ttl_secs: DEFAULT_PENDING_AUTH_TTL_SECS,
        auth_code_ttl_secs: DEFAULT_AUTH_CODE_TTL_SECS,
        access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
        provider_state_ttl_secs: DEFAULT_PROVIDER_STATE_TTL_SECS,
        cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        google: None,
        github: None,
    }
}

/// Build a harness with the base config and a seeded `alice` user.
pub async fn harness() -> TestHarness {
    harness_with(test_config()).await
}

/// Build a harness from a custom configuration.
pub async fn harness_with(config: ServerConfig) -> TestHarness {
    init_test_logging();
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
    let alice_id = seed_alice(&store).await;
    let resources = Arc::new(ServerResources::new(config, store.clone()).unwrap());
    TestHarness {
        router: build_router(resources.clone()),
        store,
        resources,
        alice_id,
    }
}

/// Seed the `alice` user with a real bcrypt hash (low cost to keep tests
/// fast).
pub async fn seed_alice(store: &Arc<dyn CredentialStore>) -> Uuid {
    let user_id = Uuid::new_v4();
    store
        .put_user(gatehouse::models::LocalUser {
            id: user_id,
            display_name: "Alice".to_owned(),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
    store
        .put_credentials(UserCredentials {
            user_id,
            username: "alice".to_owned(),
            password_hash: bcrypt::hash(ALICE_PASSWORD, 4).unwrap(),
            display_name: "Alice".to_owned(),
        })
        .await
        .unwrap();
    user_id
}

impl TestHarness {
    /// Send a GET request.
    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// Send a POST with a urlencoded form body.
    pub async fn post_form(&self, uri: &str, form: &[(&str, &str)]) -> Response<Body> {
        let body = serde_urlencoded::to_string(form).unwrap();
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Send a POST with custom headers and no body.
    pub async fn post_with_headers(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The `Location` header of a redirect response.
pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response carries no Location header")
        .to_str()
        .unwrap()
        .to_owned()
}

/// Extract one query parameter from a URL, percent-decoded.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=')?;
        if key == name {
            return Some(urlencoding::decode(value).unwrap().into_owned());
        }
    }
    None
}

/// Assert a response is a 302 and return its target.
pub fn assert_found(response: &Response<Body>) -> String {
    assert_eq!(response.status(), StatusCode::FOUND);
    location(response)
}

/// Drive `/authorize` → login → consent-allow for `client-1` with the
/// RFC challenge, returning the issued authorization code.
pub async fn obtain_code(harness: &TestHarness, state: Option<&str>) -> String {
    let mut uri = format!(
        "/authorize?response_type=code&client_id=client-1&redirect_uri={}&code_challenge={}&code_challenge_method=S256",
        urlencoding::encode("http://localhost:5555/callback"),
        RFC_CHALLENGE,
    );
    if let Some(state) = state {
        uri.push_str(&format!("&state={state}"));
    }
    let response = harness.get(&uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_string(response).await;
    let pending_id = extract_pending_id(&page);

    let response = harness
        .post_form(
            "/authorize/login",
            &[
                ("pending_id", pending_id.as_str()),
                ("username", "alice"),
                ("password", ALICE_PASSWORD),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = harness
        .post_form(
            "/authorize/consent",
            &[("pending_id", pending_id.as_str()), ("decision", "allow")],
        )
        .await;
    let target = assert_found(&response);
    query_param(&target, "code").expect("consent redirect carries no code")
}

/// Pull the hidden `pending_id` field out of a rendered login/consent page.
pub fn extract_pending_id(page: &str) -> String {
    let marker = "name=\"pending_id\" value=\"";
    let start = page
        .find(marker)
        .expect("page has no pending_id field")
        + marker.len();
    let end = page[start..]
        .find('"')
        .expect("unterminated pending_id value")
        + start;
    page[start..end].to_owned()
}
