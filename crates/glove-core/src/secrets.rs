// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Secret primitives: PIN hashing and verification, request-id and token
//! minting, constant-time bearer-key comparison.
//!
//! The PIN digest is a PBKDF2-HMAC-SHA256 derivation over the UTF-8 PIN and
//! a 16-byte random salt.  The stored iteration count is authoritative on
//! verification so the cost factor can be raised without invalidating
//! existing digests.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// PBKDF2 iteration count used for newly hashed PINs.
pub const PBKDF2_ITERATIONS: u32 = 210_000;

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// Derived digest length in bytes.
const DIGEST_LEN: usize = 32;

/// The stored representation of a hashed PIN.
///
/// Salt and digest are base64 strings; the iteration count is persisted as
/// its own setting so it travels with the digest it produced.
#[derive(Debug, Clone)]
pub struct PinHash {
    pub salt_b64: String,
    pub digest_b64: String,
    pub iterations: u32,
}

/// Hash a PIN with a fresh random salt.
pub fn hash_pin(pin: &str) -> PinHash {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut digest);

    PinHash {
        salt_b64: STANDARD.encode(salt),
        digest_b64: STANDARD.encode(digest),
        iterations: PBKDF2_ITERATIONS,
    }
}

/// Verify a PIN against a stored salt / digest / iteration triple.
///
/// Re-derives with the *stored* iteration count and compares in constant
/// time.  Undecodable stored values verify as `false` rather than erroring:
/// a corrupt setting row must never read as a correct PIN.
pub fn verify_pin(pin: &str, salt_b64: &str, digest_b64: &str, iterations: u32) -> bool {
    let Ok(salt) = STANDARD.decode(salt_b64) else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(digest_b64) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }

    let mut actual = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), &salt, iterations.max(1), &mut actual);
    actual.ct_eq(&expected).into()
}

/// Mint a URL-safe random string carrying `num_bytes` bytes of entropy.
pub fn url_safe_token(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// New approval-request identifier (18 bytes of entropy).
pub fn new_request_id() -> String {
    url_safe_token(18)
}

/// New one-shot approval token (24 bytes of entropy).
pub fn new_approval_token() -> String {
    url_safe_token(24)
}

/// New process-scoped bearer key (24 bytes of entropy).
pub fn new_bearer_key() -> String {
    url_safe_token(24)
}

/// Constant-time string equality for bearer-key comparison.
///
/// Length is compared first (subtle requires equal-length slices); the
/// length of a bearer key is not secret.
pub fn constant_time_eq(left: &str, right: &str) -> bool {
    left.len() == right.len() && bool::from(left.as_bytes().ct_eq(right.as_bytes()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_round_trip() {
        let hashed = hash_pin("123456");
        assert_eq!(hashed.iterations, PBKDF2_ITERATIONS);
        assert!(verify_pin("123456", &hashed.salt_b64, &hashed.digest_b64, hashed.iterations));
        assert!(!verify_pin("654321", &hashed.salt_b64, &hashed.digest_b64, hashed.iterations));
    }

    #[test]
    fn test_verify_respects_stored_iteration_count() {
        // A digest produced at a lower cost factor must verify against its
        // own stored count, not the current default.
        let mut digest = [0u8; 32];
        pbkdf2_hmac::<Sha256>(b"0000", b"fixed-salt-16byte", 1_000, &mut digest);
        let salt_b64 = STANDARD.encode(b"fixed-salt-16byte");
        let digest_b64 = STANDARD.encode(digest);
        assert!(verify_pin("0000", &salt_b64, &digest_b64, 1_000));
        assert!(!verify_pin("0000", &salt_b64, &digest_b64, 2_000));
    }

    #[test]
    fn test_verify_rejects_undecodable_settings() {
        assert!(!verify_pin("1234", "not base64!!", "also not", 1_000));
    }

    #[test]
    fn test_token_lengths_and_charset() {
        let request_id = new_request_id();
        let token = new_approval_token();
        // 18 and 24 bytes of entropy encode to 24 and 32 url-safe chars.
        assert_eq!(request_id.len(), 24);
        assert_eq!(token.len(), 32);
        for ch in request_id.chars().chain(token.chars()) {
            assert!(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        }
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(new_request_id(), new_request_id());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }
}
