// ABOUTME: PKCE (RFC 7636) challenge computation and verification helpers
// ABOUTME: Pure functions, S256 only - the plain method is rejected outright
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! Proof Key for Code Exchange (RFC 7636).
//!
//! The authorization server only accepts the `S256` challenge method. All
//! functions here are free of state and side effects; [`verify`] compares
//! the computed challenge in constant time because the stored challenge
//! gates code redemption.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of the code verifiers we generate when acting as an OAuth client
/// toward an external provider. RFC 7636 allows 43-128.
const GENERATED_VERIFIER_LENGTH: usize = 64;

/// Compute the S256 code challenge for a verifier:
/// base64url(SHA-256(verifier)) without padding.
#[must_use]
pub fn compute_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Validate a code verifier per RFC 7636 section 4.1: 43-128 characters
/// from the unreserved set `[A-Za-z0-9\-._~]`.
#[must_use]
pub fn validate_verifier_format(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len())
        && verifier
            .chars()
            .all(|c| matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~'))
}

/// Validate a code challenge: exactly 43 characters of url-safe base64
/// (`[A-Za-z0-9\-_]`, no padding). A SHA-256 digest always encodes to 43.
#[must_use]
pub fn validate_challenge_format(challenge: &str) -> bool {
    challenge.len() == 43
        && challenge
            .chars()
            .all(|c| matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_'))
}

/// Verify a code verifier against a stored challenge.
///
/// Returns `false` unless the method is `S256`, the verifier is
/// well-formed, and the computed challenge matches the stored one under
/// constant-time byte comparison.
#[must_use]
pub fn verify(verifier: &str, challenge: &str, method: &str) -> bool {
    if method != "S256" {
        return false;
    }
    if !validate_verifier_format(verifier) {
        return false;
    }
    compute_challenge(verifier)
        .as_bytes()
        .ct_eq(challenge.as_bytes())
        .into()
}

/// Generate a fresh random code verifier for the client role (this server
/// driving an external provider's authorization flow).
#[must_use]
pub fn generate_verifier() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    let mut rng = rand::thread_rng();
    (0..GENERATED_VERIFIER_LENGTH)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 appendix B test vector.
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn rfc_vector_round_trips() {
        assert_eq!(compute_challenge(RFC_VERIFIER), RFC_CHALLENGE);
        assert!(verify(RFC_VERIFIER, RFC_CHALLENGE, "S256"));
    }

    #[test]
    fn plain_method_is_rejected() {
        assert!(!verify(RFC_VERIFIER, RFC_VERIFIER, "plain"));
        assert!(!verify(RFC_VERIFIER, RFC_CHALLENGE, "plain"));
        assert!(!verify(RFC_VERIFIER, RFC_CHALLENGE, ""));
    }

    #[test]
    fn single_byte_mutation_fails() {
        let mut mutated = RFC_VERIFIER.to_owned();
        // Flip the last character to a different unreserved character.
        mutated.pop();
        mutated.push('A');
        assert_ne!(mutated, RFC_VERIFIER);
        assert!(!verify(&mutated, RFC_CHALLENGE, "S256"));
    }

    #[test]
    fn verifier_format_bounds() {
        assert!(!validate_verifier_format(&"a".repeat(42)));
        assert!(validate_verifier_format(&"a".repeat(43)));
        assert!(validate_verifier_format(&"a".repeat(128)));
        assert!(!validate_verifier_format(&"a".repeat(129)));
        assert!(!validate_verifier_format(&format!("{}!", "a".repeat(42))));
    }

    #[test]
    fn challenge_format_is_strict() {
        assert!(validate_challenge_format(RFC_CHALLENGE));
        assert!(!validate_challenge_format(&"a".repeat(42)));
        assert!(!validate_challenge_format(&"a".repeat(44)));
        // '+', '/', '=' belong to standard base64, not the url-safe set.
        assert!(!validate_challenge_format(&format!("{}+", "a".repeat(42))));
        assert!(!validate_challenge_format(&format!("{}/", "a".repeat(42))));
        assert!(!validate_challenge_format(&format!("{}=", "a".repeat(42))));
    }

    #[test]
    fn generated_verifiers_are_valid_and_verify() {
        for _ in 0..8 {
            let v = generate_verifier();
            assert!(validate_verifier_format(&v));
            assert!(verify(&v, &compute_challenge(&v), "S256"));
        }
    }
}
