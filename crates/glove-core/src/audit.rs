// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Audit hash chain.
//!
//! Every audit entry carries a SHA-256 hex digest over its own fields plus
//! the digest of the preceding entry, forming a tamper-evident chain:
//!
//! ```text
//! entry_hash = SHA-256(
//!     prev_hash | "|" | ts | "|" | event_type | "|" |
//!     request_id_or_empty | "|" | action_or_empty | "|" |
//!     target_or_empty | "|" | outcome | "|" | canonical_json(details)
//! )
//! ```
//!
//! The `prev_hash` of the first entry is the empty string.  Storage backends
//! call [`compute_entry_hash`] inside the same critical section as the
//! insert, so the chain cannot fork under concurrent writers.
//! [`verify_chain`] recomputes every link and reports the first entry that
//! no longer matches.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::canon::canonical_map;
use crate::types::{AuditEntry, AuditEvent, Metadata};

/// Raised by [`verify_chain`] at the first entry whose recomputed hash or
/// back-link no longer matches the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("audit chain broken at entry {seq}")]
pub struct ChainViolation {
    /// Sequence number of the first failing entry.
    pub seq: u64,
}

/// Compute the chained hash for one entry.
#[allow(clippy::too_many_arguments)]
pub fn compute_entry_hash(
    prev_hash: &str,
    ts: &str,
    event_type: &str,
    request_id: Option<&str>,
    action: Option<&str>,
    target: Option<&str>,
    outcome: &str,
    details: &Metadata,
) -> String {
    let source = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        prev_hash,
        ts,
        event_type,
        request_id.unwrap_or(""),
        action.unwrap_or(""),
        target.unwrap_or(""),
        outcome,
        canonical_map(details),
    );
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// Convenience wrapper for storage backends: hash a caller-supplied
/// [`AuditEvent`] against the previous entry hash at a given timestamp.
pub fn hash_event(prev_hash: &str, ts: &str, event: &AuditEvent) -> String {
    compute_entry_hash(
        prev_hash,
        ts,
        &event.event_type,
        event.request_id.as_deref(),
        event.action.as_deref(),
        event.target.as_deref(),
        &event.outcome,
        &event.details,
    )
}

/// Verify a chain of entries in ascending `seq` order.
///
/// Checks both the back-link (`prev_hash` equals the previous entry's
/// `entry_hash`) and the recomputed hash of every entry.  A tampered entry
/// fails at itself; every later entry fails its back-link, so the first
/// reported violation pinpoints the earliest modification.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), ChainViolation> {
    let mut prev_hash = String::new();
    for entry in entries {
        if entry.prev_hash != prev_hash {
            return Err(ChainViolation { seq: entry.seq });
        }
        let recomputed = compute_entry_hash(
            &entry.prev_hash,
            &entry.ts,
            &entry.event_type,
            entry.request_id.as_deref(),
            entry.action.as_deref(),
            entry.target.as_deref(),
            &entry.outcome,
            &entry.details,
        );
        if recomputed != entry.entry_hash {
            return Err(ChainViolation { seq: entry.seq });
        }
        prev_hash = entry.entry_hash.clone();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_chain(len: u64) -> Vec<AuditEntry> {
        let mut entries = Vec::new();
        let mut prev_hash = String::new();
        for seq in 1..=len {
            let event = AuditEvent::new("agent_request", "allow")
                .with_details(json!({"index": seq}))
                .with_action_target(format!("action-{seq}"), format!("target-{seq}"));
            let ts = format!("2026-01-01T00:00:0{}+00:00", seq % 10);
            let entry_hash = hash_event(&prev_hash, &ts, &event);
            entries.push(AuditEntry {
                seq,
                ts,
                event_type: event.event_type,
                request_id: event.request_id,
                action: event.action,
                target: event.target,
                outcome: event.outcome,
                details: event.details,
                prev_hash: prev_hash.clone(),
                entry_hash: entry_hash.clone(),
            });
            prev_hash = entry_hash;
        }
        entries
    }

    #[test]
    fn test_genesis_prev_hash_is_empty() {
        let chain = build_chain(1);
        assert_eq!(chain[0].prev_hash, "");
        assert_eq!(chain[0].entry_hash.len(), 64);
    }

    #[test]
    fn test_intact_chain_verifies() {
        assert_eq!(verify_chain(&build_chain(5)), Ok(()));
    }

    #[test]
    fn test_tampered_details_detected_at_that_entry() {
        let mut chain = build_chain(5);
        chain[2]
            .details
            .insert("index".into(), json!(999));
        assert_eq!(verify_chain(&chain), Err(ChainViolation { seq: 3 }));
    }

    #[test]
    fn test_tampered_outcome_detected() {
        let mut chain = build_chain(3);
        chain[1].outcome = "deny".into();
        assert_eq!(verify_chain(&chain), Err(ChainViolation { seq: 2 }));
    }

    #[test]
    fn test_relinked_suffix_still_fails_at_tamper_point() {
        // An attacker who rewrites entry 3 *and* recomputes its hash still
        // breaks entry 4's back-link.
        let mut chain = build_chain(5);
        chain[2].outcome = "deny".into();
        chain[2].entry_hash = hash_event(
            &chain[2].prev_hash.clone(),
            &chain[2].ts.clone(),
            &AuditEvent::new("agent_request", "deny")
                .with_details(json!({"index": 3}))
                .with_action_target("action-3", "target-3"),
        );
        assert_eq!(verify_chain(&chain), Err(ChainViolation { seq: 4 }));
    }

    #[test]
    fn test_hash_depends_on_every_field() {
        let details = Metadata::new();
        let base = compute_entry_hash("", "t", "e", None, None, None, "o", &details);
        let with_request =
            compute_entry_hash("", "t", "e", Some("r"), None, None, "o", &details);
        let with_action = compute_entry_hash("", "t", "e", None, Some("a"), None, "o", &details);
        assert_ne!(base, with_request);
        assert_ne!(base, with_action);
        assert_ne!(with_request, with_action);
    }

    #[test]
    fn test_empty_chain_verifies() {
        assert_eq!(verify_chain(&[]), Ok(()));
    }
}
