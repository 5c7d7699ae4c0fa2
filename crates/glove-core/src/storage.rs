// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Storage abstraction for the approval shell.
//!
//! The [`Store`] trait is the single interface between the shell and any
//! persistence layer.  This crate ships [`InMemoryStore`] for development
//! and testing.  Production implementations (SQLite, etc.) live in
//! downstream crates so that this core crate stays free of database
//! dependencies.
//!
//! Implementations take `&self` and handle their own interior mutability;
//! every method is expected to be atomic.  In particular `append_audit`
//! must stamp the new entry (timestamp, sequence, previous hash, entry
//! hash) inside one critical section so the hash chain cannot fork under
//! concurrent writers, and `increment_attempts` must return the
//! post-increment value without interleaving.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::audit::hash_event;
use crate::types::{
    now_iso, ApprovalRequest, AuditEntry, AuditEvent, Metadata, RequestStatus,
};

/// Well-known settings keys.
pub mod settings {
    /// Base64 PIN salt.
    pub const PIN_SALT: &str = "pin_salt";
    /// Base64 PIN digest.
    pub const PIN_HASH: &str = "pin_hash";
    /// PBKDF2 iteration count the digest was produced with.
    pub const PIN_ITERATIONS: &str = "pin_iterations";
    /// Agent bearer key (when minted rather than injected by environment).
    pub const AGENT_KEY: &str = "agent_key";
    /// Admin bearer key (when minted rather than injected by environment).
    pub const ADMIN_KEY: &str = "admin_key";
    /// Comma-joined normalised risk keywords.
    pub const RISK_KEYWORDS: &str = "risk_keywords";
    /// Comma-joined enabled extension ids.
    pub const ENABLED_EXTENSIONS: &str = "clawhub_enabled_extensions";
}

/// Maximum rows returned by [`Store::list_pending_requests`].
pub const PENDING_LIST_LIMIT: usize = 100;

/// Inclusive clamp bounds for [`Store::recent_audit`].
pub const RECENT_AUDIT_MAX: usize = 500;

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed (I/O, SQL, lock poisoning).
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored row could not be decoded back into its typed form.
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

/// Field set for creating a new pending approval request.
///
/// `created_at` is stamped by the store; `expires_at` is supplied by the
/// caller because the expiry window is shell policy, not storage policy.
#[derive(Debug, Clone)]
pub struct NewApprovalRequest<'a> {
    pub id: &'a str,
    pub action: &'a str,
    pub target: &'a str,
    pub metadata: &'a Metadata,
    pub risk: &'a str,
    pub reason: &'a str,
    pub policy_id: &'a str,
    pub expires_at: &'a str,
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Pluggable persistence interface for the approval shell.
///
/// Implementations MUST be `Send + Sync`; the HTTP layer shares one store
/// across all handlers.
pub trait Store: Send + Sync {
    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Read a setting.  Missing keys are `Ok(None)`, never an error.
    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite a setting.
    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Approval requests
    // ------------------------------------------------------------------

    /// Persist a new request in `pending` status.
    fn create_request(&self, request: NewApprovalRequest<'_>) -> Result<(), StoreError>;

    /// Fetch a request by id.
    fn get_request(&self, request_id: &str) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Increment the failed-attempt counter and return the new value.
    /// Returns 0 when the request does not exist.
    fn increment_attempts(&self, request_id: &str) -> Result<u32, StoreError>;

    /// Update the lifecycle status.  `approved_at` is stamped iff the new
    /// status is [`RequestStatus::Approved`], and cleared otherwise.
    fn set_request_status(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<(), StoreError>;

    /// The most recent pending requests, newest first, capped at
    /// [`PENDING_LIST_LIMIT`].
    fn list_pending_requests(&self) -> Result<Vec<ApprovalRequest>, StoreError>;

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Append an event to the audit chain and return the stamped entry.
    fn append_audit(&self, event: &AuditEvent) -> Result<AuditEntry, StoreError>;

    /// The most recent audit entries, newest first.  `limit` is clamped to
    /// `1..=`[`RECENT_AUDIT_MAX`].
    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;
}

/// Clamp a caller-supplied audit limit to the supported range.
pub fn clamp_audit_limit(limit: usize) -> usize {
    limit.clamp(1, RECENT_AUDIT_MAX)
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InMemoryState {
    settings: HashMap<String, String>,
    requests: HashMap<String, ApprovalRequest>,
    audit: Vec<AuditEntry>,
}

/// A volatile, heap-allocated [`Store`] implementation.
///
/// All data lives in process memory behind one mutex and is lost when the
/// store is dropped.  Suitable for unit tests and the library examples.
///
/// # Examples
///
/// ```rust
/// use glove_core::storage::{InMemoryStore, Store};
///
/// let store = InMemoryStore::new();
/// store.set_setting("pin_salt", "abc").unwrap();
/// assert_eq!(store.get_setting("pin_salt").unwrap().as_deref(), Some("abc"));
/// assert_eq!(store.get_setting("missing").unwrap(), None);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryStore {
    /// Create a new, empty [`InMemoryStore`].
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }
}

impl Store for InMemoryStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.settings.get(key).cloned())
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.settings.insert(key.into(), value.into());
        Ok(())
    }

    fn create_request(&self, request: NewApprovalRequest<'_>) -> Result<(), StoreError> {
        let record = ApprovalRequest {
            id: request.id.into(),
            action: request.action.into(),
            target: request.target.into(),
            metadata: request.metadata.clone(),
            risk: request.risk.into(),
            status: RequestStatus::Pending,
            reason: request.reason.into(),
            policy_id: request.policy_id.into(),
            attempts: 0,
            created_at: now_iso(),
            expires_at: request.expires_at.into(),
            approved_at: None,
        };
        self.lock()?.requests.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_request(&self, request_id: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self.lock()?.requests.get(request_id).cloned())
    }

    fn increment_attempts(&self, request_id: &str) -> Result<u32, StoreError> {
        let mut state = self.lock()?;
        match state.requests.get_mut(request_id) {
            Some(request) => {
                request.attempts += 1;
                Ok(request.attempts)
            }
            None => Ok(0),
        }
    }

    fn set_request_status(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if let Some(request) = state.requests.get_mut(request_id) {
            request.status = status;
            request.approved_at = if status == RequestStatus::Approved {
                Some(now_iso())
            } else {
                None
            };
        }
        Ok(())
    }

    fn list_pending_requests(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        let state = self.lock()?;
        let mut pending: Vec<ApprovalRequest> = state
            .requests
            .values()
            .filter(|request| request.status == RequestStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        pending.truncate(PENDING_LIST_LIMIT);
        Ok(pending)
    }

    fn append_audit(&self, event: &AuditEvent) -> Result<AuditEntry, StoreError> {
        let mut state = self.lock()?;
        let prev_hash = state
            .audit
            .last()
            .map(|entry| entry.entry_hash.clone())
            .unwrap_or_default();
        let ts = now_iso();
        let entry_hash = hash_event(&prev_hash, &ts, event);
        let entry = AuditEntry {
            seq: state.audit.len() as u64 + 1,
            ts,
            event_type: event.event_type.clone(),
            request_id: event.request_id.clone(),
            action: event.action.clone(),
            target: event.target.clone(),
            outcome: event.outcome.clone(),
            details: event.details.clone(),
            prev_hash,
            entry_hash,
        };
        state.audit.push(entry.clone());
        Ok(entry)
    }

    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.lock()?;
        let limit = clamp_audit_limit(limit);
        Ok(state.audit.iter().rev().take(limit).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::verify_chain;
    use serde_json::json;

    fn new_request<'a>(id: &'a str, metadata: &'a Metadata) -> NewApprovalRequest<'a> {
        NewApprovalRequest {
            id,
            action: "fs.write",
            target: "/etc/hosts",
            metadata,
            risk: "high",
            reason: "Rule-based policy applied.",
            policy_id: "r-write",
            expires_at: "2099-01-01T00:00:00+00:00",
        }
    }

    #[test]
    fn test_setting_upsert() {
        let store = InMemoryStore::new();
        store.set_setting("k", "v1").unwrap();
        store.set_setting("k", "v2").unwrap();
        assert_eq!(store.get_setting("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_request_lifecycle() {
        let store = InMemoryStore::new();
        let metadata = Metadata::new();
        store.create_request(new_request("req-1", &metadata)).unwrap();

        let request = store.get_request("req-1").unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.attempts, 0);
        assert!(request.approved_at.is_none());

        store
            .set_request_status("req-1", RequestStatus::Approved)
            .unwrap();
        let request = store.get_request("req-1").unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.approved_at.is_some());
    }

    #[test]
    fn test_increment_attempts_is_monotone() {
        let store = InMemoryStore::new();
        let metadata = Metadata::new();
        store.create_request(new_request("req-1", &metadata)).unwrap();
        for expected in 1..=5 {
            assert_eq!(store.increment_attempts("req-1").unwrap(), expected);
        }
        assert_eq!(store.increment_attempts("missing").unwrap(), 0);
    }

    #[test]
    fn test_audit_chain_is_well_formed() {
        let store = InMemoryStore::new();
        for index in 0..5 {
            store
                .append_audit(
                    &AuditEvent::new("agent_request", "allow")
                        .with_details(json!({"index": index})),
                )
                .unwrap();
        }
        let mut entries = store.recent_audit(500).unwrap();
        entries.reverse(); // ascending seq
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].prev_hash, "");
        verify_chain(&entries).unwrap();
    }

    #[test]
    fn test_recent_audit_clamps_limit() {
        let store = InMemoryStore::new();
        for _ in 0..3 {
            store
                .append_audit(&AuditEvent::new("agent_request", "allow"))
                .unwrap();
        }
        // limit 0 clamps up to 1
        assert_eq!(store.recent_audit(0).unwrap().len(), 1);
        // ordering is newest first
        let entries = store.recent_audit(10).unwrap();
        assert_eq!(entries[0].seq, 3);
        assert_eq!(clamp_audit_limit(9_999), RECENT_AUDIT_MAX);
    }

    #[test]
    fn test_pending_list_is_newest_first_and_excludes_terminal() {
        let store = InMemoryStore::new();
        let metadata = Metadata::new();
        for index in 0..3 {
            let id = format!("req-{index}");
            store.create_request(new_request(&id, &metadata)).unwrap();
        }
        store
            .set_request_status("req-1", RequestStatus::Denied)
            .unwrap();

        let pending = store.list_pending_requests().unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|r| r.status == RequestStatus::Pending));
        assert!(pending[0].created_at >= pending[1].created_at);
    }
}
