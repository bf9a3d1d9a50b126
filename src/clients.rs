// ABOUTME: Boot-time client registry with redirect URI allowlisting
// ABOUTME: Token-endpoint client authentication with effective-method inference
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! OAuth client registry.
//!
//! Clients are declared in configuration and frozen into an immutable
//! [`ClientRegistry`] at boot; there is no runtime registration endpoint.
//! The first-party client, when configured, is prepended and marked
//! trusted, which lets the consent screen auto-approve it.

use serde::Deserialize;

use crate::errors::OAuthError;
use crate::tokens::constant_time_eq;

/// How a client authenticates at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// `client_id` + `client_secret` in the form body.
    ClientSecretPost,
    /// Public client, no secret.
    None,
}

/// A registered OAuth client.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique client identifier.
    pub client_id: String,
    /// Shared secret for confidential clients.
    pub client_secret: Option<String>,
    /// Exact-match redirect URI allowlist.
    pub redirect_uris: Vec<String>,
    /// Display name shown on the consent screen.
    pub client_name: String,
    /// Declared auth method; `None` means infer from secret presence.
    pub token_endpoint_auth_method: Option<TokenEndpointAuthMethod>,
    /// Trusted first-party clients skip the consent screen.
    pub trusted: bool,
}

impl Client {
    /// The auth method this client effectively uses: the declared one, or
    /// `client_secret_post` iff a secret is configured, else `none`.
    #[must_use]
    pub fn effective_auth_method(&self) -> TokenEndpointAuthMethod {
        match self.token_endpoint_auth_method {
            Some(method) => method,
            None if self.client_secret.is_some() => TokenEndpointAuthMethod::ClientSecretPost,
            None => TokenEndpointAuthMethod::None,
        }
    }
}

/// JSON shape of one entry in the `OAUTH_CLIENTS` configuration blob.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Unique client identifier.
    pub client_id: String,
    /// Shared secret for confidential clients.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Exact-match redirect URI allowlist.
    pub redirect_uris: Vec<String>,
    /// Display name; defaults to the client id.
    #[serde(default)]
    pub client_name: Option<String>,
    /// Declared token endpoint auth method.
    #[serde(default)]
    pub token_endpoint_auth_method: Option<TokenEndpointAuthMethod>,
}

impl From<ClientConfig> for Client {
    fn from(config: ClientConfig) -> Self {
        let client_name = config
            .client_name
            .unwrap_or_else(|| config.client_id.clone());
        Self {
            client_id: config.client_id,
            client_secret: config.client_secret,
            redirect_uris: config.redirect_uris,
            client_name,
            token_endpoint_auth_method: config.token_endpoint_auth_method,
            trusted: false,
        }
    }
}

/// Immutable set of registered clients, ordered with the first-party
/// client (if any) first.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Vec<Client>,
}

impl ClientRegistry {
    /// Build a registry. An optional trusted first-party client is
    /// prepended; it authenticates with method `none`.
    #[must_use]
    pub fn new(first_party: Option<Client>, clients: Vec<Client>) -> Self {
        let mut all = Vec::with_capacity(clients.len() + 1);
        if let Some(fp) = first_party {
            all.push(fp);
        }
        all.extend(clients);
        Self { clients: all }
    }

    /// Parse the `OAUTH_CLIENTS` JSON blob.
    ///
    /// # Errors
    /// Returns the parse error; malformed configuration fails startup
    /// rather than silently registering nothing.
    pub fn parse_clients_json(json: &str) -> Result<Vec<Client>, serde_json::Error> {
        let configs: Vec<ClientConfig> = serde_json::from_str(json)?;
        Ok(configs.into_iter().map(Client::from).collect())
    }

    /// Look up a client by id.
    #[must_use]
    pub fn lookup(&self, client_id: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.client_id == client_id)
    }

    /// Whether `redirect_uri` is registered for `client_id`. Exact string
    /// match only; no prefix or wildcard semantics.
    #[must_use]
    pub fn redirect_uri_allowed(&self, client_id: &str, redirect_uri: &str) -> bool {
        self.lookup(client_id)
            .is_some_and(|c| c.redirect_uris.iter().any(|u| u == redirect_uri))
    }

    /// Authenticate a token-endpoint request.
    ///
    /// Confidential clients must present their secret; for public clients
    /// authentication always succeeds, and any presented secret is ignored
    /// (many client libraries unconditionally send an empty
    /// `client_secret` field). Secret comparison is constant-time.
    ///
    /// # Errors
    /// `invalid_client` on unknown client, missing secret, or mismatched
    /// secret.
    pub fn authenticate_token_request(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<&Client, OAuthError> {
        let client = self.lookup(client_id).ok_or_else(OAuthError::invalid_client)?;
        match client.effective_auth_method() {
            TokenEndpointAuthMethod::ClientSecretPost => {
                let expected = client
                    .client_secret
                    .as_deref()
                    .ok_or_else(OAuthError::invalid_client)?;
                let presented = client_secret.ok_or_else(OAuthError::invalid_client)?;
                if constant_time_eq(presented, expected) {
                    Ok(client)
                } else {
                    Err(OAuthError::invalid_client())
                }
            }
            TokenEndpointAuthMethod::None => Ok(client),
        }
    }

    /// All registered clients, first-party first.
    #[must_use]
    pub fn clients(&self) -> &[Client] {
        &self.clients
    }
}
