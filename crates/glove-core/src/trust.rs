// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Publisher trust store and extension-zip signature verification.
//!
//! The trust store maps publisher key ids to base64-encoded Ed25519 verify
//! keys.  An extension zip is admitted only when the publisher's signature
//! verifies over the **ASCII hex** SHA-256 digest of the zip bytes (a
//! 64-byte lowercase hex string), not over the raw bytes or the binary
//! digest.  Publishers sign the digest string their tooling prints, which
//! keeps the signing side scriptable without shipping the blob around.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Classified signature / trust-store failures.
///
/// The `Display` form doubles as the machine-readable error kind surfaced to
/// the admin UI.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("trust_store_unreadable: {0}")]
    Unreadable(std::io::Error),
    #[error("invalid_trust_store_format")]
    InvalidTrustStoreFormat,
    #[error("invalid_publishers_format")]
    InvalidPublishersFormat,
    #[error("unknown_publisher_key_id")]
    UnknownPublisherKeyId,
    #[error("invalid_trust_store_pubkey: {0}")]
    InvalidTrustStorePubkey(String),
    #[error("invalid_signature_b64: {0}")]
    InvalidSignatureB64(String),
    #[error("signature_verification_failed: {0}")]
    VerificationFailed(String),
}

/// Map of publisher key ids to base64-encoded Ed25519 verify keys.
///
/// # Examples
///
/// ```rust
/// use glove_core::trust::TrustStore;
///
/// let store = TrustStore::default();
/// assert!(store.publishers.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    pub publishers: BTreeMap<String, String>,
}

impl TrustStore {
    /// Load a trust store from a JSON file of the form
    /// `{"publishers": {"<key_id>": "<verify_key_b64>"}}`.
    ///
    /// A missing file yields an empty store (signature-requiring installs
    /// will then fail with `unknown_publisher_key_id`).  A present but
    /// malformed file is an error: a store the operator wrote must never be
    /// silently ignored.
    pub fn load(path: &Path) -> Result<Self, SignatureError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(SignatureError::Unreadable)?;
        let payload: serde_json::Value =
            serde_json::from_str(&raw).map_err(|_| SignatureError::InvalidTrustStoreFormat)?;
        let serde_json::Value::Object(payload) = payload else {
            return Err(SignatureError::InvalidTrustStoreFormat);
        };

        let mut publishers = BTreeMap::new();
        if let Some(raw_publishers) = payload.get("publishers") {
            let serde_json::Value::Object(raw_publishers) = raw_publishers else {
                return Err(SignatureError::InvalidPublishersFormat);
            };
            for (key_id, value) in raw_publishers {
                let serde_json::Value::String(verify_key_b64) = value else {
                    return Err(SignatureError::InvalidPublishersFormat);
                };
                publishers.insert(key_id.clone(), verify_key_b64.clone());
            }
        }
        Ok(Self { publishers })
    }

    /// Verify a publisher signature over a zip blob.
    ///
    /// The signed payload is the lowercase ASCII-hex SHA-256 digest of
    /// `zip_bytes`.  Each failure site maps to its own
    /// [`SignatureError`] kind so the admin UI can explain what went wrong.
    pub fn verify_zip_signature(
        &self,
        zip_bytes: &[u8],
        key_id: &str,
        signature_b64: &str,
    ) -> Result<(), SignatureError> {
        let verify_key_b64 = self
            .publishers
            .get(key_id)
            .filter(|value| !value.is_empty())
            .ok_or(SignatureError::UnknownPublisherKeyId)?;

        let key_bytes = STANDARD
            .decode(verify_key_b64)
            .map_err(|error| SignatureError::InvalidTrustStorePubkey(error.to_string()))?;
        let key_bytes: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            SignatureError::InvalidTrustStorePubkey("expected a 32-byte Ed25519 key".into())
        })?;
        let verify_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|error| SignatureError::InvalidTrustStorePubkey(error.to_string()))?;

        let signature_bytes = STANDARD
            .decode(signature_b64)
            .map_err(|error| SignatureError::InvalidSignatureB64(error.to_string()))?;
        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|error| SignatureError::InvalidSignatureB64(error.to_string()))?;

        let digest_hex = hex::encode(Sha256::digest(zip_bytes));
        verify_key
            .verify(digest_hex.as_bytes(), &signature)
            .map_err(|error| SignatureError::VerificationFailed(error.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed_store(zip_bytes: &[u8]) -> (TrustStore, String) {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let digest_hex = hex::encode(Sha256::digest(zip_bytes));
        let signature = signing_key.sign(digest_hex.as_bytes());

        let mut publishers = BTreeMap::new();
        publishers.insert(
            "publisher-1".to_string(),
            STANDARD.encode(signing_key.verifying_key().to_bytes()),
        );
        (
            TrustStore { publishers },
            STANDARD.encode(signature.to_bytes()),
        )
    }

    #[test]
    fn test_valid_signature_over_hex_digest_verifies() {
        let zip_bytes = b"not really a zip, but bytes are bytes";
        let (store, signature_b64) = signed_store(zip_bytes);
        assert!(store
            .verify_zip_signature(zip_bytes, "publisher-1", &signature_b64)
            .is_ok());
    }

    #[test]
    fn test_signature_over_raw_bytes_is_rejected() {
        // Signing the raw blob instead of its hex digest must fail: the
        // signed payload is explicitly the ASCII digest.
        let zip_bytes = b"payload";
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let signature = signing_key.sign(zip_bytes);

        let mut publishers = BTreeMap::new();
        publishers.insert(
            "publisher-1".to_string(),
            STANDARD.encode(signing_key.verifying_key().to_bytes()),
        );
        let store = TrustStore { publishers };

        let result = store.verify_zip_signature(
            zip_bytes,
            "publisher-1",
            &STANDARD.encode(signature.to_bytes()),
        );
        assert!(matches!(result, Err(SignatureError::VerificationFailed(_))));
    }

    #[test]
    fn test_unknown_key_id() {
        let (store, signature_b64) = signed_store(b"blob");
        let result = store.verify_zip_signature(b"blob", "publisher-2", &signature_b64);
        assert!(matches!(result, Err(SignatureError::UnknownPublisherKeyId)));
    }

    #[test]
    fn test_tampered_blob_fails_verification() {
        let (store, signature_b64) = signed_store(b"original");
        let result = store.verify_zip_signature(b"modified", "publisher-1", &signature_b64);
        assert!(matches!(result, Err(SignatureError::VerificationFailed(_))));
    }

    #[test]
    fn test_bad_signature_base64() {
        let (store, _) = signed_store(b"blob");
        let result = store.verify_zip_signature(b"blob", "publisher-1", "@@not-base64@@");
        assert!(matches!(result, Err(SignatureError::InvalidSignatureB64(_))));
    }

    #[test]
    fn test_bad_pubkey_in_store() {
        let mut publishers = BTreeMap::new();
        publishers.insert("publisher-1".to_string(), "zm9v".to_string()); // 3 bytes
        let store = TrustStore { publishers };
        let result = store.verify_zip_signature(b"blob", "publisher-1", "c2ln");
        assert!(matches!(
            result,
            Err(SignatureError::InvalidTrustStorePubkey(_))
        ));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TrustStore::load(&dir.path().join("absent.json")).expect("load");
        assert!(store.publishers.is_empty());
    }

    #[test]
    fn test_malformed_store_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trusted_publishers.json");
        fs::write(&path, "[1, 2, 3]").expect("write");
        assert!(matches!(
            TrustStore::load(&path),
            Err(SignatureError::InvalidTrustStoreFormat)
        ));

        fs::write(&path, r#"{"publishers": "nope"}"#).expect("write");
        assert!(matches!(
            TrustStore::load(&path),
            Err(SignatureError::InvalidPublishersFormat)
        ));
    }
}
