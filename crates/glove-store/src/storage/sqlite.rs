// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! SQLite-backed storage.
//!
//! [`SqliteStore`] persists all shell state to a single database file.
//! The connection lives behind a [`Mutex`], so every operation is serialised
//! per-connection; the audit append wraps its read-previous-hash + insert
//! pair in one transaction under that lock, keeping the hash chain
//! well-formed under concurrent writers.
//!
//! ## Schema
//!
//! ```sql
//! settings(key PRIMARY KEY, value)
//! approval_requests(id PRIMARY KEY, action, target, metadata_json, risk,
//!                   status, reason, policy_id, attempts, created_at,
//!                   expires_at, approved_at)
//! audit_log(id AUTOINCREMENT, ts, event_type, request_id, action, target,
//!           outcome, details_json, prev_hash, entry_hash)
//! ```
//!
//! ## Caveats
//!
//! * Concurrent access from multiple processes is not supported; run one
//!   shell per database file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use glove_core::audit::hash_event;
use glove_core::storage::{
    clamp_audit_limit, NewApprovalRequest, Store, StoreError, PENDING_LIST_LIMIT,
};
use glove_core::types::{now_iso, ApprovalRequest, AuditEntry, AuditEvent, RequestStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS approval_requests (
    id TEXT PRIMARY KEY,
    action TEXT NOT NULL,
    target TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    risk TEXT NOT NULL,
    status TEXT NOT NULL,
    reason TEXT NOT NULL,
    policy_id TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    approved_at TEXT
);

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    event_type TEXT NOT NULL,
    request_id TEXT,
    action TEXT,
    target TEXT,
    outcome TEXT NOT NULL,
    details_json TEXT NOT NULL,
    prev_hash TEXT NOT NULL DEFAULT '',
    entry_hash TEXT NOT NULL
);
";

/// A single-file SQLite [`Store`] implementation.
///
/// # Examples
///
/// ```rust,no_run
/// use glove_store::SqliteStore;
/// use glove_core::Store;
///
/// let store = SqliteStore::open("/tmp/glove.db").expect("open database");
/// store.set_setting("pin_iterations", "210000").unwrap();
/// assert!(store.get_setting("pin_iterations").unwrap().is_some());
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.  Intended for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".into()))
    }
}

impl Store for SqliteStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(backend)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn create_request(&self, request: NewApprovalRequest<'_>) -> Result<(), StoreError> {
        let metadata_json = serde_json::to_string(request.metadata)
            .map_err(|error| StoreError::Backend(error.to_string()))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO approval_requests
             (id, action, target, metadata_json, risk, status, reason, policy_id,
              created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8, ?9)",
            params![
                request.id,
                request.action,
                request.target,
                metadata_json,
                request.risk,
                request.reason,
                request.policy_id,
                now_iso(),
                request.expires_at,
            ],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn get_request(&self, request_id: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT id, action, target, metadata_json, risk, status, reason,
                        policy_id, attempts, created_at, expires_at, approved_at
                 FROM approval_requests WHERE id = ?1",
                params![request_id],
                raw_request_from_row,
            )
            .optional()
            .map_err(backend)?;
        raw.map(RawRequest::into_request).transpose()
    }

    fn increment_attempts(&self, request_id: &str) -> Result<u32, StoreError> {
        // Both statements run under the connection lock, so the returned
        // value is exactly the post-increment count for this call.
        let conn = self.conn()?;
        conn.execute(
            "UPDATE approval_requests SET attempts = attempts + 1 WHERE id = ?1",
            params![request_id],
        )
        .map_err(backend)?;
        conn.query_row(
            "SELECT attempts FROM approval_requests WHERE id = ?1",
            params![request_id],
            |row| row.get::<_, u32>(0),
        )
        .optional()
        .map_err(backend)
        .map(|attempts| attempts.unwrap_or(0))
    }

    fn set_request_status(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<(), StoreError> {
        let approved_at = if status == RequestStatus::Approved {
            Some(now_iso())
        } else {
            None
        };
        let conn = self.conn()?;
        conn.execute(
            "UPDATE approval_requests SET status = ?1, approved_at = ?2 WHERE id = ?3",
            params![status.as_str(), approved_at, request_id],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn list_pending_requests(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT id, action, target, metadata_json, risk, status, reason,
                        policy_id, attempts, created_at, expires_at, approved_at
                 FROM approval_requests
                 WHERE status = 'pending'
                 ORDER BY created_at DESC
                 LIMIT ?1",
            )
            .map_err(backend)?;
        let rows = statement
            .query_map(params![PENDING_LIST_LIMIT as i64], raw_request_from_row)
            .map_err(backend)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw.map_err(backend)?.into_request()?);
        }
        Ok(out)
    }

    fn append_audit(&self, event: &AuditEvent) -> Result<AuditEntry, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(backend)?;

        let prev_hash: Option<String> = tx
            .query_row(
                "SELECT entry_hash FROM audit_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        let prev_hash = prev_hash.unwrap_or_default();

        let ts = now_iso();
        let entry_hash = hash_event(&prev_hash, &ts, event);
        let details_json = serde_json::to_string(&event.details)
            .map_err(|error| StoreError::Backend(error.to_string()))?;

        tx.execute(
            "INSERT INTO audit_log
             (ts, event_type, request_id, action, target, outcome, details_json,
              prev_hash, entry_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                ts,
                event.event_type,
                event.request_id,
                event.action,
                event.target,
                event.outcome,
                details_json,
                prev_hash,
                entry_hash,
            ],
        )
        .map_err(backend)?;
        let seq = tx.last_insert_rowid() as u64;
        tx.commit().map_err(backend)?;

        Ok(AuditEntry {
            seq,
            ts,
            event_type: event.event_type.clone(),
            request_id: event.request_id.clone(),
            action: event.action.clone(),
            target: event.target.clone(),
            outcome: event.outcome.clone(),
            details: event.details.clone(),
            prev_hash,
            entry_hash,
        })
    }

    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let limit = clamp_audit_limit(limit);
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT id, ts, event_type, request_id, action, target, outcome,
                        details_json, prev_hash, entry_hash
                 FROM audit_log ORDER BY id DESC LIMIT ?1",
            )
            .map_err(backend)?;
        let rows = statement
            .query_map(params![limit as i64], raw_entry_from_row)
            .map_err(backend)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw.map_err(backend)?.into_entry()?);
        }
        Ok(out)
    }
}

fn backend(error: rusqlite::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Straight column capture; JSON and enum decoding happen outside the
/// rusqlite closure so failures surface as [`StoreError::Corrupt`] rather
/// than generic SQL errors.
struct RawRequest {
    id: String,
    action: String,
    target: String,
    metadata_json: String,
    risk: String,
    status: String,
    reason: String,
    policy_id: String,
    attempts: u32,
    created_at: String,
    expires_at: String,
    approved_at: Option<String>,
}

fn raw_request_from_row(row: &Row<'_>) -> rusqlite::Result<RawRequest> {
    Ok(RawRequest {
        id: row.get(0)?,
        action: row.get(1)?,
        target: row.get(2)?,
        metadata_json: row.get(3)?,
        risk: row.get(4)?,
        status: row.get(5)?,
        reason: row.get(6)?,
        policy_id: row.get(7)?,
        attempts: row.get(8)?,
        created_at: row.get(9)?,
        expires_at: row.get(10)?,
        approved_at: row.get(11)?,
    })
}

impl RawRequest {
    fn into_request(self) -> Result<ApprovalRequest, StoreError> {
        let status = RequestStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown request status '{}'", self.status))
        })?;
        let metadata = serde_json::from_str(&self.metadata_json).map_err(|error| {
            StoreError::Corrupt(format!("metadata for request {}: {error}", self.id))
        })?;
        Ok(ApprovalRequest {
            id: self.id,
            action: self.action,
            target: self.target,
            metadata,
            risk: self.risk,
            status,
            reason: self.reason,
            policy_id: self.policy_id,
            attempts: self.attempts,
            created_at: self.created_at,
            expires_at: self.expires_at,
            approved_at: self.approved_at,
        })
    }
}

struct RawEntry {
    seq: u64,
    ts: String,
    event_type: String,
    request_id: Option<String>,
    action: Option<String>,
    target: Option<String>,
    outcome: String,
    details_json: String,
    prev_hash: String,
    entry_hash: String,
}

fn raw_entry_from_row(row: &Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        seq: row.get::<_, i64>(0)? as u64,
        ts: row.get(1)?,
        event_type: row.get(2)?,
        request_id: row.get(3)?,
        action: row.get(4)?,
        target: row.get(5)?,
        outcome: row.get(6)?,
        details_json: row.get(7)?,
        prev_hash: row.get(8)?,
        entry_hash: row.get(9)?,
    })
}

impl RawEntry {
    fn into_entry(self) -> Result<AuditEntry, StoreError> {
        let details = serde_json::from_str(&self.details_json).map_err(|error| {
            StoreError::Corrupt(format!("details for audit entry {}: {error}", self.seq))
        })?;
        Ok(AuditEntry {
            seq: self.seq,
            ts: self.ts,
            event_type: self.event_type,
            request_id: self.request_id,
            action: self.action,
            target: self.target,
            outcome: self.outcome,
            details,
            prev_hash: self.prev_hash,
            entry_hash: self.entry_hash,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glove_core::audit::verify_chain;
    use glove_core::types::Metadata;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("in-memory database")
    }

    fn sample_metadata() -> Metadata {
        match json!({"session": "b41c9f", "depth": 2}) {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }

    fn create(store: &SqliteStore, id: &str, metadata: &Metadata) {
        store
            .create_request(NewApprovalRequest {
                id,
                action: "fs.write",
                target: "/etc/hosts",
                metadata,
                risk: "high",
                reason: "Rule-based policy applied.",
                policy_id: "r-write",
                expires_at: "2099-01-01T00:00:00+00:00",
            })
            .expect("create request");
    }

    #[test]
    fn test_settings_upsert_and_missing_read() {
        let store = store();
        assert_eq!(store.get_setting("absent").unwrap(), None);
        store.set_setting("pin_salt", "one").unwrap();
        store.set_setting("pin_salt", "two").unwrap();
        assert_eq!(store.get_setting("pin_salt").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_request_round_trip_preserves_metadata() {
        let store = store();
        let metadata = sample_metadata();
        create(&store, "req-1", &metadata);

        let request = store.get_request("req-1").unwrap().expect("row");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.metadata, metadata);
        assert_eq!(request.attempts, 0);
        assert!(request.approved_at.is_none());
        assert!(!request.created_at.is_empty());
    }

    #[test]
    fn test_status_update_stamps_approved_at_only_for_approved() {
        let store = store();
        create(&store, "req-1", &Metadata::new());

        store
            .set_request_status("req-1", RequestStatus::Approved)
            .unwrap();
        assert!(store
            .get_request("req-1")
            .unwrap()
            .unwrap()
            .approved_at
            .is_some());

        store
            .set_request_status("req-1", RequestStatus::Denied)
            .unwrap();
        assert!(store
            .get_request("req-1")
            .unwrap()
            .unwrap()
            .approved_at
            .is_none());
    }

    #[test]
    fn test_increment_attempts_returns_post_increment_value() {
        let store = store();
        create(&store, "req-1", &Metadata::new());
        for expected in 1..=4u32 {
            assert_eq!(store.increment_attempts("req-1").unwrap(), expected);
        }
        assert_eq!(store.increment_attempts("ghost").unwrap(), 0);
    }

    #[test]
    fn test_pending_list_filters_and_orders() {
        let store = store();
        for index in 0..4 {
            create(&store, &format!("req-{index}"), &Metadata::new());
        }
        store
            .set_request_status("req-2", RequestStatus::Expired)
            .unwrap();

        let pending = store.list_pending_requests().unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|r| r.id != "req-2"));
        for window in pending.windows(2) {
            assert!(window[0].created_at >= window[1].created_at);
        }
    }

    #[test]
    fn test_audit_chain_survives_reopen_and_verifies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("glove.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            for index in 0..3 {
                store
                    .append_audit(
                        &AuditEvent::new("agent_request", "allow")
                            .with_details(json!({"index": index})),
                    )
                    .unwrap();
            }
        }

        // Reopen: the chain continues from the persisted tip.
        let store = SqliteStore::open(&path).unwrap();
        store
            .append_audit(&AuditEvent::new("pin_setup", "success"))
            .unwrap();

        let mut entries = store.recent_audit(500).unwrap();
        entries.reverse();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].prev_hash, "");
        assert_eq!(entries[3].prev_hash, entries[2].entry_hash);
        verify_chain(&entries).unwrap();
    }

    #[test]
    fn test_hand_tampered_row_breaks_verification() {
        let store = store();
        for index in 0..5 {
            store
                .append_audit(
                    &AuditEvent::new("agent_request", "allow")
                        .with_details(json!({"index": index})),
                )
                .unwrap();
        }

        // Reach under the store and edit entry 3's details in place.
        {
            let conn = store.conn().unwrap();
            conn.execute(
                "UPDATE audit_log SET details_json = '{\"index\":99}' WHERE id = 3",
                [],
            )
            .unwrap();
        }

        let mut entries = store.recent_audit(500).unwrap();
        entries.reverse();
        let violation = verify_chain(&entries).unwrap_err();
        assert_eq!(violation.seq, 3);
    }

    #[test]
    fn test_concurrent_increments_sum_exactly() {
        let store = std::sync::Arc::new(store());
        create(&store, "req-1", &Metadata::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = std::sync::Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..5 {
                        store.increment_attempts("req-1").unwrap();
                    }
                });
            }
        });

        let request = store.get_request("req-1").unwrap().unwrap();
        assert_eq!(request.attempts, 40);
    }

    #[test]
    fn test_concurrent_appends_never_fork_the_chain() {
        let store = std::sync::Arc::new(store());

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = std::sync::Arc::clone(&store);
                scope.spawn(move || {
                    for index in 0..10 {
                        store
                            .append_audit(
                                &AuditEvent::new("agent_request", "allow")
                                    .with_details(json!({"worker": worker, "index": index})),
                            )
                            .unwrap();
                    }
                });
            }
        });

        let mut entries = store.recent_audit(500).unwrap();
        entries.reverse();
        assert_eq!(entries.len(), 40);
        verify_chain(&entries).unwrap();
    }

    #[test]
    fn test_recent_audit_clamps_and_orders_descending() {
        let store = store();
        for _ in 0..6 {
            store
                .append_audit(&AuditEvent::new("agent_request", "allow"))
                .unwrap();
        }
        let entries = store.recent_audit(0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].seq, 6);

        let entries = store.recent_audit(3).unwrap();
        let seqs: Vec<u64> = entries.iter().map(|entry| entry.seq).collect();
        assert_eq!(seqs, vec![6, 5, 4]);
    }
}
