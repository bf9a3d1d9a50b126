// ABOUTME: Shared server resources passed to every request handler
// ABOUTME: Immutable after boot - registry, store handle, templates, federation client
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Shared server resources.
//!
//! One [`ServerResources`] is built at boot and handed to every route as
//! `Arc<ServerResources>`. Nothing in it is mutable; all mutable state
//! lives behind the [`CredentialStore`] contract.

use std::sync::Arc;

use crate::clients::ClientRegistry;
use crate::config::ServerConfig;
use crate::errors::AppError;
use crate::federation::FederationClient;
use crate::store::CredentialStore;
use crate::templates::TemplateSet;

/// Everything a request handler needs, assembled once at boot.
pub struct ServerResources {
    /// Frozen configuration.
    pub config: ServerConfig,
    /// Registered clients, first-party first.
    pub registry: ClientRegistry,
    /// The credential store.
    pub store: Arc<dyn CredentialStore>,
    /// Compiled-in HTML templates.
    pub templates: TemplateSet,
    /// OAuth client toward external providers.
    pub federation: FederationClient,
}

impl ServerResources {
    /// Assemble the shared resources.
    ///
    /// # Errors
    /// Fails if the federation HTTP client cannot be built.
    pub fn new(config: ServerConfig, store: Arc<dyn CredentialStore>) -> Result<Self, AppError> {
        let registry = config.build_registry();
        let federation = FederationClient::new(config.google.clone(), config.github.clone())?;
        Ok(Self {
            config,
            registry,
            store,
            templates: TemplateSet::new(),
            federation,
        })
    }
}
