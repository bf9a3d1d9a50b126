// ABOUTME: Liveness probe endpoint
// ABOUTME: Answers "OK" whenever the process is serving requests
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

use axum::routing::get;
use axum::Router;

/// Routes for the liveness probe.
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health routes.
    #[must_use]
    pub fn routes() -> Router {
        Router::new().route("/up", get(|| async { "OK" }))
    }
}
