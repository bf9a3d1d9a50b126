// ABOUTME: Background sweep deleting expired credentials on a fixed interval
// ABOUTME: Hygiene only - every read path re-checks expiry independently
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Expired-credential cleanup.
//!
//! A single long-lived task ticks at `CLEANUP_INTERVAL_SECS` and calls
//! [`CredentialStore::purge_expired`]. It stops promptly when the shutdown
//! watch channel fires. A late or missed sweep is harmless; expiry is
//! enforced at every read site.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::store::CredentialStore;

/// Run the cleanup loop until `shutdown` signals.
pub async fn run_cleanup_loop(
    store: Arc<dyn CredentialStore>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    // The first tick fires immediately; skip it so boot is not followed by
    // an instant sweep of an empty store.
    ticker.tick().await;
    info!(interval_secs, "cleanup sweep started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep_once(store.as_ref()).await;
            }
            _ = shutdown.changed() => {
                info!("cleanup sweep stopping");
                return;
            }
        }
    }
}

/// Run one sweep. Exposed separately so tests can drive it without the
/// timer.
pub async fn sweep_once(store: &dyn CredentialStore) {
    match store.purge_expired(Utc::now()).await {
        Ok(counts) => {
            if counts.total() > 0 {
                info!(
                    pending = counts.pending,
                    codes = counts.codes,
                    tokens = counts.tokens,
                    provider_states = counts.provider_states,
                    "purged expired credentials"
                );
            } else {
                debug!("cleanup sweep found nothing to purge");
            }
        }
        Err(e) => error!("cleanup sweep failed: {e}"),
    }
}
