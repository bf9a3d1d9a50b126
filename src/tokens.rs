// ABOUTME: Opaque bearer-secret generation from the system CSPRNG
// ABOUTME: Every credential id issued by this server comes through here
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Opaque token generation and comparison.
//!
//! Pending-authorization ids, authorization codes, access tokens, and
//! provider state values are all bearer secrets: unguessable random
//! strings from a cryptographically secure source. Comparisons that gate
//! authorization decisions go through [`constant_time_eq`].

use crate::errors::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;

/// Bytes of entropy per opaque token (256 bits).
const TOKEN_ENTROPY_BYTES: usize = 32;

/// Generate an opaque url-safe token.
///
/// # Errors
/// Returns an error if the system RNG fails. That is a critical security
/// failure; the server cannot mint credentials without working randomness.
pub fn generate_opaque_token() -> Result<String, AppError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    rng.fill(&mut bytes).map_err(|e| {
        tracing::error!("SystemRandom failed - cannot generate secure random bytes: {e}");
        AppError::internal("system RNG failure")
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Constant-time equality for secret material (resource secrets, token
/// values). Non-secret identifiers use ordinary `==`.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
