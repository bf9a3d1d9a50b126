// ABOUTME: Router assembly, bootstrap seeding, listener, and graceful shutdown
// ABOUTME: Owns the cleanup task lifecycle via a watch channel
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Server assembly and lifecycle.

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::cleanup::run_cleanup_loop;
use crate::config::{BootstrapUser, ServerConfig};
use crate::errors::AppError;
use crate::models::{LocalUser, UserCredentials};
use crate::resources::ServerResources;
use crate::routes::authorize::AuthorizeRoutes;
use crate::routes::federation::FederationRoutes;
use crate::routes::health::HealthRoutes;
use crate::routes::token::TokenRoutes;
use crate::store::memory::MemoryStore;
use crate::store::CredentialStore;

/// Build the complete application router.
#[must_use]
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(AuthorizeRoutes::routes(resources.clone()))
        .merge(TokenRoutes::routes(resources.clone()))
        .merge(FederationRoutes::routes(resources))
        .merge(HealthRoutes::routes())
        .layer(TraceLayer::new_for_http())
}

/// Create the configured bootstrap users. Passwords are bcrypt-hashed on
/// a blocking task and the plaintext is dropped here.
///
/// # Errors
/// Fails on hashing or store errors.
pub async fn seed_bootstrap_users(
    store: &Arc<dyn CredentialStore>,
    users: &[BootstrapUser],
) -> Result<(), AppError> {
    for user in users {
        if store
            .get_credentials_by_username(&user.username)
            .await?
            .is_some()
        {
            continue;
        }
        let password = user.password.clone();
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(&password, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| AppError::internal(format!("bcrypt task failed: {e}")))?
                .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?;

        let display_name = user
            .display_name
            .clone()
            .unwrap_or_else(|| user.username.clone());
        let local = LocalUser {
            id: Uuid::new_v4(),
            display_name: display_name.clone(),
            created_at: Utc::now(),
        };
        store.put_user(local.clone()).await?;
        store
            .put_credentials(UserCredentials {
                user_id: local.id,
                username: user.username.clone(),
                password_hash,
                display_name,
            })
            .await?;
        info!(username = %user.username, user_id = %local.id, "bootstrap user created");
    }
    Ok(())
}

/// Run the server until shutdown.
///
/// # Errors
/// Fails on resource assembly, seeding, or listener errors.
pub async fn run(config: ServerConfig) -> Result<()> {
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
    seed_bootstrap_users(&store, &config.bootstrap_users)
        .await
        .context("failed to seed bootstrap users")?;

    let port = config.http_port;
    let cleanup_interval = config.cleanup_interval_secs;
    let resources = Arc::new(
        ServerResources::new(config, store.clone())
            .map_err(|e| anyhow::anyhow!("failed to assemble server resources: {e}"))?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = tokio::spawn(run_cleanup_loop(store, cleanup_interval, shutdown_rx));

    let router = build_router(resources);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Stop the sweep in lockstep with the listener.
    let _ = shutdown_tx.send(true);
    let _ = cleanup.await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
