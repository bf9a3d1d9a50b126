// ABOUTME: Gatehouse - OAuth 2.0 authorization server library
// ABOUTME: PKCE, single-use code redemption, introspection, and provider federation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! # Gatehouse
//!
//! An OAuth 2.0 / OIDC-style authorization server: it issues, validates,
//! and revokes short-lived credentials (authorization codes, access
//! tokens), brokers delegated login through external providers, and
//! exposes a resource-server introspection endpoint.
//!
//! The protocol engine is layered leaf to root: the [`pkce`] engine and
//! [`clients`] registry feed the [`routes`] surfaces, which push all
//! durable state through the [`store::CredentialStore`] contract. The
//! [`cleanup`] sweep and [`federation`] client run alongside.

pub mod cleanup;
pub mod clients;
pub mod config;
pub mod errors;
pub mod federation;
pub mod logging;
pub mod models;
pub mod pkce;
pub mod resources;
pub mod routes;
pub mod server;
pub mod store;
pub mod templates;
pub mod tokens;
