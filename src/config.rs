// ABOUTME: Environment configuration loaded once at boot, validated, then frozen
// ABOUTME: Client registry JSON, bootstrap users, TTLs, and federation provider settings
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Environment-based configuration.
//!
//! [`ServerConfig::from_env`] reads everything in one pass (after an
//! optional `.env` via dotenvy), validates it, and the result is shared
//! immutably for the life of the process. Malformed JSON blobs
//! (`OAUTH_CLIENTS`, `BOOTSTRAP_USERS`) fail startup rather than silently
//! registering nothing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::clients::{Client, ClientRegistry, TokenEndpointAuthMethod};

/// Default TTL for a pending authorization (the login/consent window).
pub const DEFAULT_PENDING_AUTH_TTL_SECS: u64 = 900;
/// Default TTL for an authorization code.
pub const DEFAULT_AUTH_CODE_TTL_SECS: u64 = 600;
/// Default TTL for an access token.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 3600;
/// Default TTL for a federation provider state.
pub const DEFAULT_PROVIDER_STATE_TTL_SECS: u64 = 600;
/// Default interval between cleanup sweeps.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// One entry in the `BOOTSTRAP_USERS` JSON blob. Passwords arrive in the
/// clear here and are bcrypt-hashed at boot; they are never stored.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapUser {
    /// Login name.
    pub username: String,
    /// Plaintext password, hashed at boot.
    pub password: String,
    /// Display name; defaults to the username.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Static configuration for one external federation provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Our client id at the provider.
    pub client_id: String,
    /// Our client secret at the provider.
    pub client_secret: String,
    /// Callback URI registered at the provider.
    pub redirect_uri: String,
    /// Space-separated scopes to request.
    pub scopes: String,
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port.
    pub http_port: u16,
    /// Canonical issuer URL for discovery metadata, if pinned.
    pub issuer_url: Option<String>,
    /// Shared secret resource servers present to `/introspect`.
    pub resource_secret: Option<String>,
    /// Registered clients parsed from `OAUTH_CLIENTS`.
    pub clients: Vec<Client>,
    /// Trusted first-party client, prepended to the registry.
    pub first_party: Option<Client>,
    /// Users to create at boot, parsed from `BOOTSTRAP_USERS`.
    pub bootstrap_users: Vec<BootstrapUser>,
    /// Redirect URIs federation callers may request, beyond registered
    /// client URIs.
    pub login_redirect_allowlist: Vec<String>,
    /// External login UI; `/authorize` hands pending authorizations off
    /// to it instead of serving the built-in login page.
    pub login_ui_url: Option<String>,
    /// Pending authorization TTL in seconds.
    pub pending_auth_ttl_secs: u64,
    /// Authorization code TTL in seconds.
    pub auth_code_ttl_secs: u64,
    /// Access token TTL in seconds.
    pub access_token_ttl_secs: u64,
    /// Federation provider state TTL in seconds.
    pub provider_state_ttl_secs: u64,
    /// Cleanup sweep interval in seconds.
    pub cleanup_interval_secs: u64,
    /// Google federation, if configured.
    pub google: Option<ProviderConfig>,
    /// GitHub federation, if configured.
    pub github: Option<ProviderConfig>,
}

impl ServerConfig {
    /// Load configuration from the environment. Reads `.env` first when
    /// present.
    ///
    /// # Errors
    /// Returns an error on unparseable numeric values, malformed JSON
    /// blobs, or failed validation.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let clients = match env::var("OAUTH_CLIENTS") {
            Ok(json) => ClientRegistry::parse_clients_json(&json)
                .context("OAUTH_CLIENTS is not a valid client list")?,
            Err(_) => Vec::new(),
        };

        let bootstrap_users: Vec<BootstrapUser> = match env::var("BOOTSTRAP_USERS") {
            Ok(json) => serde_json::from_str(&json)
                .context("BOOTSTRAP_USERS is not a valid user list")?,
            Err(_) => Vec::new(),
        };

        let first_party = match (
            env::var("FIRST_PARTY_CLIENT_ID").ok(),
            env::var("FIRST_PARTY_REDIRECT_URI").ok(),
        ) {
            (Some(client_id), Some(redirect_uri)) => Some(Client {
                client_name: client_id.clone(),
                client_id,
                client_secret: None,
                redirect_uris: vec![redirect_uri],
                token_endpoint_auth_method: Some(TokenEndpointAuthMethod::None),
                trusted: true,
            }),
            (None, None) => None,
            _ => anyhow::bail!(
                "FIRST_PARTY_CLIENT_ID and FIRST_PARTY_REDIRECT_URI must be set together"
            ),
        };

        let config = Self {
            http_port: env_var_or("HTTP_PORT", "8080")?
                .parse()
                .context("HTTP_PORT must be a valid port number")?,
            issuer_url: env::var("ISSUER_URL").ok(),
            resource_secret: env::var("RESOURCE_SECRET").ok(),
            clients,
            first_party,
            bootstrap_users,
            login_redirect_allowlist: env::var("LOGIN_REDIRECT_ALLOWLIST")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            login_ui_url: env::var("LOGIN_UI_URL").ok(),
            pending_auth_ttl_secs: parse_secs("PENDING_AUTH_TTL_SECS", DEFAULT_PENDING_AUTH_TTL_SECS)?,
            auth_code_ttl_secs: parse_secs("AUTH_CODE_TTL_SECS", DEFAULT_AUTH_CODE_TTL_SECS)?,
            access_token_ttl_secs: parse_secs("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL_SECS)?,
            provider_state_ttl_secs: parse_secs(
                "PROVIDER_STATE_TTL_SECS",
                DEFAULT_PROVIDER_STATE_TTL_SECS,
            )?,
            cleanup_interval_secs: parse_secs("CLEANUP_INTERVAL_SECS", DEFAULT_CLEANUP_INTERVAL_SECS)?,
            google: provider_from_env("GOOGLE")?,
            github: provider_from_env("GITHUB")?,
        };

        config.validate()?;
        info!("configuration loaded");
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error on zero TTLs or duplicate client ids.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("PENDING_AUTH_TTL_SECS", self.pending_auth_ttl_secs),
            ("AUTH_CODE_TTL_SECS", self.auth_code_ttl_secs),
            ("ACCESS_TOKEN_TTL_SECS", self.access_token_ttl_secs),
            ("PROVIDER_STATE_TTL_SECS", self.provider_state_ttl_secs),
            ("CLEANUP_INTERVAL_SECS", self.cleanup_interval_secs),
        ] {
            if value == 0 {
                anyhow::bail!("{name} must be greater than zero");
            }
        }

        let mut seen = std::collections::HashSet::new();
        for client in self
            .first_party
            .iter()
            .chain(self.clients.iter())
        {
            if !seen.insert(client.client_id.as_str()) {
                anyhow::bail!("duplicate client_id in configuration: {}", client.client_id);
            }
            if client.redirect_uris.is_empty() {
                anyhow::bail!(
                    "client {} has no registered redirect URIs",
                    client.client_id
                );
            }
        }

        if self.resource_secret.is_none() {
            warn!("RESOURCE_SECRET not set - /introspect will refuse all requests");
        }

        Ok(())
    }

    /// Build the immutable client registry from this configuration.
    #[must_use]
    pub fn build_registry(&self) -> ClientRegistry {
        ClientRegistry::new(self.first_party.clone(), self.clients.clone())
    }

    /// Configuration summary for boot logging, without secrets.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Gatehouse Configuration:\n\
             - HTTP Port: {}\n\
             - Issuer URL: {}\n\
             - Registered Clients: {}\n\
             - First-Party Client: {}\n\
             - Bootstrap Users: {}\n\
             - Introspection: {}\n\
             - Google Federation: {}\n\
             - GitHub Federation: {}\n\
             - Cleanup Interval: {}s",
            self.http_port,
            self.issuer_url.as_deref().unwrap_or("(derived per request)"),
            self.clients.len(),
            self.first_party
                .as_ref()
                .map_or("(none)", |c| c.client_id.as_str()),
            self.bootstrap_users.len(),
            if self.resource_secret.is_some() {
                "Enabled"
            } else {
                "Disabled"
            },
            if self.google.is_some() { "Enabled" } else { "Disabled" },
            if self.github.is_some() { "Enabled" } else { "Disabled" },
            self.cleanup_interval_secs,
        )
    }
}

/// Read an environment variable with a default.
///
/// # Errors
/// Never fails today; the `Result` keeps call sites uniform with parsing.
fn env_var_or(name: &str, default: &str) -> Result<String> {
    Ok(env::var(name).unwrap_or_else(|_| default.to_owned()))
}

fn parse_secs(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} must be a number of seconds")),
        Err(_) => Ok(default),
    }
}

/// Load one provider's settings from `<PREFIX>_CLIENT_ID` etc. The
/// provider is configured iff the client id is present; the remaining
/// variables are then required.
fn provider_from_env(prefix: &str) -> Result<Option<ProviderConfig>> {
    let Ok(client_id) = env::var(format!("{prefix}_CLIENT_ID")) else {
        return Ok(None);
    };
    let client_secret = env::var(format!("{prefix}_CLIENT_SECRET"))
        .with_context(|| format!("{prefix}_CLIENT_SECRET is required when {prefix}_CLIENT_ID is set"))?;
    let redirect_uri = env::var(format!("{prefix}_REDIRECT_URI"))
        .with_context(|| format!("{prefix}_REDIRECT_URI is required when {prefix}_CLIENT_ID is set"))?;
    let scopes = env::var(format!("{prefix}_SCOPES")).unwrap_or_default();
    Ok(Some(ProviderConfig {
        client_id,
        client_secret,
        redirect_uri,
        scopes,
    }))
}
