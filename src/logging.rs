// ABOUTME: Structured logging setup on tracing-subscriber
// ABOUTME: Env-filtered, with JSON or pretty output selected by LOG_FORMAT
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Logging configuration.
//!
//! `RUST_LOG` drives the filter when set; otherwise `LOG_LEVEL` (default
//! `info`) applies, with HTTP-stack noise pinned down to `warn`.
//! `LOG_FORMAT=json` switches to structured output for production.

use anyhow::Result;
use std::env;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON output for production log pipelines.
    Json,
    /// Human-readable output for development.
    Pretty,
}

impl LogFormat {
    fn from_env() -> Self {
        match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber from the environment.
///
/// # Errors
/// Returns an error if a subscriber is already installed.
pub fn init_from_env() -> Result<()> {
    let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    let env_filter = env::var("RUST_LOG")
        .map_or_else(|_| EnvFilter::new(&level), |directive| EnvFilter::new(directive))
        .add_directive(
            "hyper=warn"
                .parse()
                .unwrap_or_else(|_| tracing::Level::WARN.into()),
        )
        .add_directive(
            "reqwest=warn"
                .parse()
                .unwrap_or_else(|_| tracing::Level::WARN.into()),
        )
        .add_directive(
            "tower_http=info"
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        )
        .add_directive(
            format!("gatehouse={level}")
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        );

    let registry = tracing_subscriber::registry().with(env_filter);
    match LogFormat::from_env() {
        LogFormat::Json => {
            registry
                .with(fmt::layer().json().with_current_span(false))
                .try_init()?;
        }
        LogFormat::Pretty => {
            registry.with(fmt::layer().compact()).try_init()?;
        }
    }
    Ok(())
}
