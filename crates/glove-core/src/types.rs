// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Shared data types used across all shell sub-systems.
//!
//! All types implement [`Clone`], [`Debug`], [`serde::Serialize`], and
//! [`serde::Deserialize`] so they can be serialised to JSON, stored, and
//! returned over the HTTP surface without additional conversion steps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form request metadata, preserved verbatim end to end.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// The three possible outcomes of evaluating an agent action.
///
/// `RequirePin` is the human-in-the-loop branch: the action is parked as a
/// pending [`ApprovalRequest`] until a human confirms it with the operator
/// PIN inside the expiry window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The action may proceed immediately.
    Allow,
    /// The action is refused; there is no appeal path.
    Deny,
    /// The action needs a human PIN confirmation before it may proceed.
    RequirePin,
}

impl Decision {
    /// Wire-format name (`allow` / `deny` / `require_pin`).
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow      => "allow",
            Decision::Deny       => "deny",
            Decision::RequirePin => "require_pin",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict produced by the policy engine (or the keyword override) for a
/// single `(action, target)` evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// The decision branch to take.
    pub decision: Decision,
    /// Risk label, canonicalised to lowercase.  `high` always maps to
    /// `RequirePin`; any other label rides along with an `Allow`.
    pub risk: String,
    /// Human-readable explanation surfaced to the agent and the audit log.
    pub reason: String,
    /// Provenance of the decision (rule id, `default-policy`,
    /// `policy-blocked-target`, or `policy-risk-keyword`).
    pub policy_id: String,
}

// ---------------------------------------------------------------------------
// Approval requests
// ---------------------------------------------------------------------------

/// Lifecycle status of an [`ApprovalRequest`].
///
/// Requests are created as `Pending` and transition exactly once to a
/// terminal status.  Terminal states are final: no call path moves a request
/// back to `Pending` or between terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Waiting for a human PIN inside the expiry window.
    Pending,
    /// A human confirmed the action with the correct PIN.
    Approved,
    /// Refused, either by a human or by the attempt lock-out.
    Denied,
    /// The expiry window elapsed before a decision was made.
    Expired,
}

impl RequestStatus {
    /// Wire-format name (`pending` / `approved` / `denied` / `expired`).
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending  => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied   => "denied",
            RequestStatus::Expired  => "expired",
        }
    }

    /// Parse a wire-format status name.  Returns `None` for unknown labels.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending"  => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "denied"   => Some(RequestStatus::Denied),
            "expired"  => Some(RequestStatus::Expired),
            _ => None,
        }
    }

    /// Whether this status is final.
    pub fn is_terminal(self) -> bool {
        self != RequestStatus::Pending
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted record of a high-risk action awaiting (or having received)
/// human confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// URL-safe random identifier (≥18 bytes of entropy).
    pub id: String,
    /// The proposed action name (1–200 chars).
    pub action: String,
    /// The target the action operates on (1–500 chars).
    pub target: String,
    /// Free-form metadata supplied by the agent, preserved verbatim.
    pub metadata: Metadata,
    /// Risk label at creation time (always `high` for persisted requests).
    pub risk: String,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Explanation attached by the deciding policy.
    pub reason: String,
    /// Provenance of the escalation decision.
    pub policy_id: String,
    /// Failed PIN attempts so far.  Monotone non-decreasing.
    pub attempts: u32,
    /// Creation timestamp (ISO-8601 UTC).
    pub created_at: String,
    /// Absolute expiry timestamp (ISO-8601 UTC).
    pub expires_at: String,
    /// Approval timestamp; set iff `status` is `Approved`.
    pub approved_at: Option<String>,
}

impl ApprovalRequest {
    /// Whether the expiry window has elapsed at `now`.
    ///
    /// An unparseable `expires_at` is treated as not yet expired so that a
    /// corrupt row cannot silently swallow a pending approval.
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match parse_iso(&self.expires_at) {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// One immutable entry of the hash-chained audit log.
///
/// `entry_hash` covers every field of the entry plus the previous entry's
/// hash, so modifying any stored entry breaks verification at that entry or
/// later.  Entries are append-only; no update or delete operation exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotone 1-based sequence number.
    pub seq: u64,
    /// Append timestamp (ISO-8601 UTC).
    pub ts: String,
    /// Event class, e.g. `agent_request`, `approve_pin`, `notify`.
    pub event_type: String,
    /// Related approval request, when one exists.
    pub request_id: Option<String>,
    /// Action under evaluation, when applicable.
    pub action: Option<String>,
    /// Target under evaluation, when applicable.
    pub target: Option<String>,
    /// Outcome label, e.g. `allow`, `deny`, `approved`, `locked`, `failed`.
    pub outcome: String,
    /// Structured event details, hashed in canonical form.
    pub details: Metadata,
    /// `entry_hash` of the preceding entry; empty string for entry 1.
    pub prev_hash: String,
    /// SHA-256 hex digest chaining this entry to its predecessor.
    pub entry_hash: String,
}

/// The caller-supplied portion of an audit entry.
///
/// The storage layer stamps `seq`, `ts`, `prev_hash`, and `entry_hash` at
/// append time, inside the same critical section as the insert.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    pub outcome: String,
    pub details: Metadata,
    pub request_id: Option<String>,
    pub action: Option<String>,
    pub target: Option<String>,
}

impl AuditEvent {
    /// Start a new event with empty details and no request context.
    pub fn new(event_type: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            outcome: outcome.into(),
            details: Metadata::new(),
            request_id: None,
            action: None,
            target: None,
        }
    }

    /// Attach structured details.  Non-object values are ignored.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = details {
            self.details = map;
        }
        self
    }

    /// Attach the related approval request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach the action / target pair under evaluation.
    pub fn with_action_target(
        mut self,
        action: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.action = Some(action.into());
        self.target = Some(target.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Shell results
// ---------------------------------------------------------------------------

/// Pending-approval handle returned when a decision escalates to a PIN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    /// Identifier the human will confirm against.
    pub request_id: String,
    /// Absolute expiry of the approval window (ISO-8601 UTC).
    pub expires_at: String,
    /// Deep link into the approval UI, ending in `?request_id=<id>`.
    pub ui_url: String,
}

/// Full result of a shell decision: the policy verdict plus, for
/// `require_pin`, the pending-approval handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub risk: String,
    pub reason: String,
    pub policy_id: String,
    /// Present iff `decision` is `RequirePin`.
    pub pending: Option<PendingApproval>,
}

/// Returned on a successful PIN approval.
///
/// The token is minted fresh, never persisted, and not re-issuable; only its
/// last 8 characters enter the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalGrant {
    pub request_id: String,
    pub approval_token: String,
}

/// Point-in-time view of an approval request, as returned by status polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub request_id: String,
    pub status: RequestStatus,
    pub action: String,
    pub target: String,
    pub expires_at: String,
    pub approved_at: Option<String>,
}

/// Parsed inbound reply command (`PIN <request_id> <pin>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyCommand {
    pub request_id: String,
    pub pin: String,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Current UTC time as an ISO-8601 string with microsecond precision and an
/// explicit `+00:00` offset.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

/// Parse an ISO-8601 timestamp produced by [`now_iso`] (or any RFC 3339
/// string) back into a UTC instant.
pub fn parse_iso(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&chrono::Utc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
