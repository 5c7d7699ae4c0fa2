// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Approval shell: the top-level composition of policy, keyword triage,
//! secret primitives, and storage.
//!
//! [`ApprovalShell`] owns a [`Store`] and a [`PolicyEngine`] and exposes the
//! full decision / approval lifecycle:
//!
//! ```text
//! ApprovalShell<S: Store>
//!   ├── decide()          — keyword triage → policy → allow / deny / pend
//!   ├── approve()         — PIN check, attempt lock-out, token minting
//!   ├── request_status()  — snapshot with lazy expiry
//!   ├── parse_reply()     — "PIN <request_id> <pin>" inbound parser
//!   └── setup_pin() / risk keyword configuration
//! ```
//!
//! ## Evaluation order in `decide`
//!
//! 1. **Keyword triage** — any configured risk keyword found in the request
//!    haystack escalates to `require_pin` before policy runs.
//! 2. **Policy engine** — blocked targets, then longest-prefix rules.
//! 3. **Audit** — every decision is appended, allow and deny included.
//! 4. **Pend** — `require_pin` mints a request id, persists a pending
//!    record, and hands back the expiry and UI deep link.
//!
//! Requests transition `pending → {approved, denied, expired}` exactly once;
//! terminal states are final.  Expiry is lazy: any read of a pending record
//! past its `expires_at` flips it to `expired` before returning.

use chrono::{Duration, Utc};
use serde_json::json;
use url::Url;

use crate::config::ShellConfig;
use crate::keywords::{match_keyword, normalize_keywords};
use crate::policy::PolicyEngine;
use crate::secrets::{
    hash_pin, new_approval_token, new_request_id, verify_pin, PBKDF2_ITERATIONS,
};
use crate::storage::{settings, NewApprovalRequest, Store, StoreError};
use crate::types::{
    ApprovalGrant, ApprovalRequest, AuditEntry, AuditEvent, Decision, DecisionOutcome, Metadata,
    PendingApproval, PolicyDecision, ReplyCommand, RequestSnapshot, RequestStatus,
};

/// Errors raised by the approval flows.
///
/// The `Display` form of each lifecycle variant is the machine-readable
/// error kind surfaced in HTTP `detail` fields.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("request_not_found")]
    RequestNotFound,
    /// The request already reached a terminal status.
    #[error("request_{}", .0.as_str())]
    RequestNotPending(RequestStatus),
    #[error("request_expired")]
    RequestExpired,
    #[error("pin_not_configured")]
    PinNotConfigured,
    #[error("invalid_pin")]
    InvalidPin,
    #[error("invalid_format")]
    InvalidReplyFormat,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Composes policy evaluation and the approval lifecycle over a [`Store`].
///
/// The shell is generic over `S: Store` so it runs identically against the
/// in-memory store (tests, examples) and the SQLite backend (production).
///
/// # Examples
///
/// ```rust
/// use glove_core::config::ShellConfig;
/// use glove_core::policy::{PolicyDocument, PolicyEngine};
/// use glove_core::shell::ApprovalShell;
/// use glove_core::storage::InMemoryStore;
/// use glove_core::types::{Decision, Metadata};
///
/// let policy = PolicyEngine::new(PolicyDocument {
///     default_risk: "low".into(),
///     ..PolicyDocument::default()
/// });
/// let shell = ApprovalShell::new(ShellConfig::default(), policy, InMemoryStore::new());
///
/// let outcome = shell.decide("read", "notes", &Metadata::new()).unwrap();
/// assert_eq!(outcome.decision, Decision::Allow);
/// assert_eq!(outcome.policy_id, "default-policy");
/// ```
pub struct ApprovalShell<S: Store> {
    config: ShellConfig,
    policy: PolicyEngine,
    store: S,
}

impl<S: Store> ApprovalShell<S> {
    /// Construct a new [`ApprovalShell`].
    pub fn new(config: ShellConfig, policy: PolicyEngine, store: S) -> Self {
        Self {
            config,
            policy,
            store,
        }
    }

    /// Borrow the underlying storage.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Borrow the shell configuration.
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // PIN configuration
    // ------------------------------------------------------------------

    /// Whether an operator PIN has been configured.
    pub fn pin_configured(&self) -> Result<bool, StoreError> {
        Ok(self.store.get_setting(settings::PIN_SALT)?.is_some()
            && self.store.get_setting(settings::PIN_HASH)?.is_some())
    }

    /// Hash and store a new operator PIN, overwriting any previous one.
    ///
    /// There is no old-PIN proof: the admin bearer key is the capability
    /// that gates this call.
    pub fn setup_pin(&self, pin: &str) -> Result<(), ShellError> {
        let hashed = hash_pin(pin);
        self.store.set_setting(settings::PIN_SALT, &hashed.salt_b64)?;
        self.store.set_setting(settings::PIN_HASH, &hashed.digest_b64)?;
        self.store
            .set_setting(settings::PIN_ITERATIONS, &hashed.iterations.to_string())?;
        self.store.append_audit(
            &AuditEvent::new("pin_setup", "success").with_details(json!({"source": "admin"})),
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Risk keywords
    // ------------------------------------------------------------------

    /// The configured risk keywords, normalised.
    pub fn risk_keywords(&self) -> Result<Vec<String>, StoreError> {
        let Some(raw) = self.store.get_setting(settings::RISK_KEYWORDS)? else {
            return Ok(Vec::new());
        };
        Ok(normalize_keywords(raw.split(',')))
    }

    /// Normalise and persist a new keyword list; returns the stored form.
    pub fn set_risk_keywords<I>(&self, raw: I) -> Result<Vec<String>, ShellError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keywords = normalize_keywords(raw);
        self.store
            .set_setting(settings::RISK_KEYWORDS, &keywords.join(","))?;
        self.store.append_audit(
            &AuditEvent::new("risk_keywords_config", "success")
                .with_details(json!({"count": keywords.len(), "keywords": keywords})),
        )?;
        Ok(keywords)
    }

    // ------------------------------------------------------------------
    // Agent decision flow
    // ------------------------------------------------------------------

    /// Evaluate an agent action and, for `require_pin`, persist the pending
    /// approval request.
    ///
    /// Every decision is audited.  Notification of the human is the
    /// caller's concern: it must never block or fail this path, so it lives
    /// outside the shell.
    pub fn decide(
        &self,
        action: &str,
        target: &str,
        metadata: &Metadata,
    ) -> Result<DecisionOutcome, ShellError> {
        let keywords = self.risk_keywords()?;
        let verdict = match match_keyword(&keywords, action, target, metadata) {
            Some(keyword) => PolicyDecision {
                decision: Decision::RequirePin,
                risk: "high".into(),
                reason: format!("Risk keyword matched: '{keyword}'"),
                policy_id: "policy-risk-keyword".into(),
            },
            None => self.policy.evaluate(action, target),
        };

        if verdict.decision != Decision::RequirePin {
            self.store.append_audit(
                &AuditEvent::new("agent_request", verdict.decision.as_str())
                    .with_details(
                        json!({"reason": verdict.reason, "policy_id": verdict.policy_id}),
                    )
                    .with_action_target(action, target),
            )?;
            return Ok(DecisionOutcome {
                decision: verdict.decision,
                risk: verdict.risk,
                reason: verdict.reason,
                policy_id: verdict.policy_id,
                pending: None,
            });
        }

        let request_id = new_request_id();
        let expires_at = (Utc::now()
            + Duration::seconds(self.config.request_ttl_seconds as i64))
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, false);

        self.store.create_request(NewApprovalRequest {
            id: &request_id,
            action,
            target,
            metadata,
            risk: &verdict.risk,
            reason: &verdict.reason,
            policy_id: &verdict.policy_id,
            expires_at: &expires_at,
        })?;
        self.store.append_audit(
            &AuditEvent::new("agent_request", "require_pin")
                .with_details(json!({"reason": verdict.reason, "policy_id": verdict.policy_id}))
                .with_request_id(&request_id)
                .with_action_target(action, target),
        )?;

        let ui_url = self.approval_ui_url(&request_id, metadata);
        Ok(DecisionOutcome {
            decision: Decision::RequirePin,
            risk: verdict.risk,
            reason: verdict.reason,
            policy_id: verdict.policy_id,
            pending: Some(PendingApproval {
                request_id,
                expires_at,
                ui_url,
            }),
        })
    }

    /// Deep link for the approval UI.
    ///
    /// The agent may supply `metadata.ui_base_url`; it is honoured only when
    /// it parses as an `http(s)` URL with a non-empty host, which bounds the
    /// open-redirect surface of an attacker-controlled field.
    fn approval_ui_url(&self, request_id: &str, metadata: &Metadata) -> String {
        let base = metadata
            .get("ui_base_url")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .filter(|raw| {
                Url::parse(raw)
                    .map(|url| {
                        matches!(url.scheme(), "http" | "https")
                            && url.host_str().is_some_and(|host| !host.is_empty())
                    })
                    .unwrap_or(false)
            })
            .unwrap_or(self.config.public_url.as_str());
        format!("{}/?request_id={}", base.trim_end_matches('/'), request_id)
    }

    // ------------------------------------------------------------------
    // Approval flow
    // ------------------------------------------------------------------

    /// Confirm a pending request with the operator PIN.
    ///
    /// Failure paths, in order: unknown id, terminal status, expiry (the
    /// record is flipped to `expired` on the spot), missing PIN
    /// configuration, wrong PIN (counted; the attempt that reaches
    /// `max_pin_attempts` denies the request for good and audits outcome
    /// `locked`).  Success flips the request to `approved` and mints a
    /// fresh one-shot token; only its last 8 characters enter the audit log.
    pub fn approve(&self, request_id: &str, pin: &str) -> Result<ApprovalGrant, ShellError> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or(ShellError::RequestNotFound)?;
        if request.status.is_terminal() {
            return Err(ShellError::RequestNotPending(request.status));
        }
        if request.is_expired_at(Utc::now()) {
            self.store
                .set_request_status(request_id, RequestStatus::Expired)?;
            self.store.append_audit(
                &AuditEvent::new("approve_pin", "expired")
                    .with_details(json!({"reason": "request_expired"}))
                    .with_request_id(request_id),
            )?;
            return Err(ShellError::RequestExpired);
        }

        let salt_b64 = self.store.get_setting(settings::PIN_SALT)?;
        let digest_b64 = self.store.get_setting(settings::PIN_HASH)?;
        let (Some(salt_b64), Some(digest_b64)) = (salt_b64, digest_b64) else {
            return Err(ShellError::PinNotConfigured);
        };
        let iterations = self
            .store
            .get_setting(settings::PIN_ITERATIONS)?
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(PBKDF2_ITERATIONS);

        if !verify_pin(pin, &salt_b64, &digest_b64, iterations) {
            return Err(self.record_failed_attempt(&request)?);
        }

        self.store
            .set_request_status(request_id, RequestStatus::Approved)?;
        let approval_token = new_approval_token();
        let token_tail = &approval_token[approval_token.len() - 8..];
        self.store.append_audit(
            &AuditEvent::new("approve_pin", "approved")
                .with_details(json!({"approval_token_tail": token_tail}))
                .with_request_id(request_id)
                .with_action_target(&request.action, &request.target),
        )?;
        Ok(ApprovalGrant {
            request_id: request_id.into(),
            approval_token,
        })
    }

    /// Count a failed attempt, applying the lock-out when the configured
    /// ceiling is reached.  Always yields `InvalidPin` for the caller.
    fn record_failed_attempt(&self, request: &ApprovalRequest) -> Result<ShellError, ShellError> {
        let attempts = self.store.increment_attempts(&request.id)?;
        let outcome = if attempts >= self.config.max_pin_attempts {
            self.store
                .set_request_status(&request.id, RequestStatus::Denied)?;
            "locked"
        } else {
            "failed"
        };
        self.store.append_audit(
            &AuditEvent::new("approve_pin", outcome)
                .with_details(
                    json!({"attempts": attempts, "max_attempts": self.config.max_pin_attempts}),
                )
                .with_request_id(&request.id)
                .with_action_target(&request.action, &request.target),
        )?;
        Ok(ShellError::InvalidPin)
    }

    // ------------------------------------------------------------------
    // Status reads
    // ------------------------------------------------------------------

    /// Snapshot a request, lazily expiring it when the window has passed.
    pub fn request_status(&self, request_id: &str) -> Result<RequestSnapshot, ShellError> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or(ShellError::RequestNotFound)?;

        let mut status = request.status;
        if status == RequestStatus::Pending && request.is_expired_at(Utc::now()) {
            self.store
                .set_request_status(request_id, RequestStatus::Expired)?;
            status = RequestStatus::Expired;
        }

        Ok(RequestSnapshot {
            request_id: request.id,
            status,
            action: request.action,
            target: request.target,
            expires_at: request.expires_at,
            approved_at: request.approved_at,
        })
    }

    /// The most recent pending requests, newest first.
    pub fn pending_requests(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        self.store.list_pending_requests()
    }

    /// The most recent audit entries, newest first (clamped by the store).
    pub fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        self.store.recent_audit(limit)
    }

    /// Append a caller-composed audit event (notify failures, extension
    /// management, and other server-side happenings).
    pub fn audit(&self, event: &AuditEvent) -> Result<AuditEntry, StoreError> {
        self.store.append_audit(event)
    }

    // ------------------------------------------------------------------
    // Inbound replies
    // ------------------------------------------------------------------

    /// Parse an inbound reply body of the exact form `PIN <request_id> <pin>`
    /// (case-insensitive on `PIN`, any whitespace separation).
    pub fn parse_reply(body: &str) -> Result<ReplyCommand, ShellError> {
        let tokens: Vec<&str> = body.split_whitespace().collect();
        let [keyword, request_id, pin] = tokens.as_slice() else {
            return Err(ShellError::InvalidReplyFormat);
        };
        if !keyword.eq_ignore_ascii_case("PIN") {
            return Err(ShellError::InvalidReplyFormat);
        }
        Ok(ReplyCommand {
            request_id: (*request_id).into(),
            pin: (*pin).into(),
        })
    }

    /// Parse an inbound reply and run the approval flow.
    pub fn approve_from_reply(&self, body: &str) -> Result<ApprovalGrant, ShellError> {
        let command = Self::parse_reply(body)?;
        self.approve(&command.request_id, &command.pin)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyDocument, PolicyRule};
    use crate::storage::InMemoryStore;
    use serde_json::json;

    fn high_risk_policy() -> PolicyEngine {
        PolicyEngine::new(PolicyDocument {
            default_risk: "low".into(),
            blocked_targets: vec!["/secrets".into()],
            rules: vec![PolicyRule {
                id: Some("r-write".into()),
                action_prefix: "fs.write".into(),
                risk: Some("high".into()),
                ..PolicyRule::default()
            }],
        })
    }

    fn shell_with(config: ShellConfig) -> ApprovalShell<InMemoryStore> {
        ApprovalShell::new(config, high_risk_policy(), InMemoryStore::new())
    }

    fn shell() -> ApprovalShell<InMemoryStore> {
        shell_with(ShellConfig::default())
    }

    fn metadata(value: serde_json::Value) -> Metadata {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }

    #[test]
    fn test_allow_fast_path_audits_once() {
        let shell = shell();
        let outcome = shell.decide("read", "notes", &Metadata::new()).unwrap();
        assert_eq!(outcome.decision, Decision::Allow);
        assert_eq!(outcome.risk, "low");
        assert_eq!(outcome.policy_id, "default-policy");
        assert!(outcome.pending.is_none());

        let audit = shell.recent_audit(10).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].outcome, "allow");
        assert_eq!(audit[0].action.as_deref(), Some("read"));
    }

    #[test]
    fn test_blocked_target_denies() {
        let shell = shell();
        let outcome = shell
            .decide("fs.read", "/app/Secrets/db", &Metadata::new())
            .unwrap();
        assert_eq!(outcome.decision, Decision::Deny);
        assert_eq!(outcome.policy_id, "policy-blocked-target");
        assert_eq!(shell.recent_audit(10).unwrap()[0].outcome, "deny");
    }

    #[test]
    fn test_require_pin_persists_pending_record() {
        let shell = shell();
        let outcome = shell
            .decide("fs.write", "/etc/hosts", &Metadata::new())
            .unwrap();
        let pending = outcome.pending.expect("pending handle");
        assert!(pending.ui_url.ends_with(&format!("?request_id={}", pending.request_id)));

        let request = shell
            .store()
            .get_request(&pending.request_id)
            .unwrap()
            .expect("persisted request");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.risk, "high");
        assert_eq!(shell.pending_requests().unwrap().len(), 1);
    }

    #[test]
    fn test_keyword_override_wins_over_policy() {
        let shell = shell();
        shell.set_risk_keywords(["notes"]).unwrap();
        // Policy alone would allow this read; the keyword escalates it.
        let outcome = shell.decide("read", "notes", &Metadata::new()).unwrap();
        assert_eq!(outcome.decision, Decision::RequirePin);
        assert_eq!(outcome.policy_id, "policy-risk-keyword");
        assert_eq!(outcome.reason, "Risk keyword matched: 'notes'");
    }

    #[test]
    fn test_keyword_matches_inside_metadata() {
        let shell = shell();
        shell.set_risk_keywords(["prod-db"]).unwrap();
        let md = metadata(json!({"cluster": "PROD-DB-1"}));
        let outcome = shell.decide("db.query", "analytics", &md).unwrap();
        assert_eq!(outcome.decision, Decision::RequirePin);
    }

    #[test]
    fn test_ui_url_metadata_override() {
        let shell = shell();
        let md = metadata(json!({"ui_base_url": "https://glove.example.com/app/"}));
        let outcome = shell.decide("fs.write", "/etc/hosts", &md).unwrap();
        let pending = outcome.pending.unwrap();
        assert!(pending
            .ui_url
            .starts_with("https://glove.example.com/app/?request_id="));
    }

    #[test]
    fn test_ui_url_rejects_non_http_schemes() {
        let shell = shell();
        for bad in ["javascript:alert(1)", "ftp://host/x", "   ", "not a url"] {
            let md = metadata(json!({"ui_base_url": bad}));
            let outcome = shell.decide("fs.write", "/etc/hosts", &md).unwrap();
            assert!(
                outcome.pending.unwrap().ui_url.starts_with("http://127.0.0.1:8088/"),
                "should fall back for {bad:?}"
            );
        }
    }

    #[test]
    fn test_approve_happy_path_and_terminal_conflict() {
        let shell = shell();
        shell.setup_pin("123456").unwrap();
        let pending = shell
            .decide("fs.write", "/etc/hosts", &Metadata::new())
            .unwrap()
            .pending
            .unwrap();

        let grant = shell.approve(&pending.request_id, "123456").unwrap();
        assert_eq!(grant.request_id, pending.request_id);
        assert!(grant.approval_token.len() >= 24);

        let request = shell
            .store()
            .get_request(&pending.request_id)
            .unwrap()
            .unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.approved_at.is_some());

        // Tokens are one-shot; re-approving a terminal request conflicts.
        let again = shell.approve(&pending.request_id, "123456");
        assert!(matches!(
            again,
            Err(ShellError::RequestNotPending(RequestStatus::Approved))
        ));

        let audit = shell.recent_audit(10).unwrap();
        assert_eq!(audit[0].outcome, "approved");
        let tail = audit[0].details["approval_token_tail"].as_str().unwrap();
        assert!(grant.approval_token.ends_with(tail));
        assert_eq!(tail.len(), 8);
    }

    #[test]
    fn test_wrong_pin_then_lockout() {
        let shell = shell_with(ShellConfig {
            max_pin_attempts: 3,
            ..ShellConfig::default()
        });
        shell.setup_pin("123456").unwrap();
        let pending = shell
            .decide("fs.write", "/etc/hosts", &Metadata::new())
            .unwrap()
            .pending
            .unwrap();

        for attempt in 1..=3u32 {
            let result = shell.approve(&pending.request_id, "000000");
            assert!(matches!(result, Err(ShellError::InvalidPin)));
            let entry = &shell.recent_audit(1).unwrap()[0];
            let expected = if attempt == 3 { "locked" } else { "failed" };
            assert_eq!(entry.outcome, expected, "attempt {attempt}");
            assert_eq!(entry.details["attempts"], json!(attempt));
        }

        let request = shell
            .store()
            .get_request(&pending.request_id)
            .unwrap()
            .unwrap();
        assert_eq!(request.status, RequestStatus::Denied);
        assert_eq!(request.attempts, 3);

        // A denied request stays denied, even with the right PIN.
        let after_lock = shell.approve(&pending.request_id, "123456");
        assert!(matches!(
            after_lock,
            Err(ShellError::RequestNotPending(RequestStatus::Denied))
        ));
    }

    #[test]
    fn test_approve_unknown_request() {
        let shell = shell();
        assert!(matches!(
            shell.approve("missing", "123456"),
            Err(ShellError::RequestNotFound)
        ));
    }

    #[test]
    fn test_approve_without_pin_configured() {
        let shell = shell();
        let pending = shell
            .decide("fs.write", "/etc/hosts", &Metadata::new())
            .unwrap()
            .pending
            .unwrap();
        assert!(matches!(
            shell.approve(&pending.request_id, "123456"),
            Err(ShellError::PinNotConfigured)
        ));
    }

    #[test]
    fn test_expired_request_flips_lazily() {
        let shell = shell();
        shell.setup_pin("123456").unwrap();
        // Backdate the expiry by writing the record directly.
        let md = Metadata::new();
        shell
            .store()
            .create_request(NewApprovalRequest {
                id: "req-old",
                action: "fs.write",
                target: "/etc/hosts",
                metadata: &md,
                risk: "high",
                reason: "r",
                policy_id: "p",
                expires_at: "2001-01-01T00:00:00+00:00",
            })
            .unwrap();

        let snapshot = shell.request_status("req-old").unwrap();
        assert_eq!(snapshot.status, RequestStatus::Expired);
        let stored = shell.store().get_request("req-old").unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Expired);

        // An expired request cannot be resurrected.
        assert!(matches!(
            shell.approve("req-old", "123456"),
            Err(ShellError::RequestNotPending(RequestStatus::Expired))
        ));
    }

    #[test]
    fn test_approve_on_expiry_boundary_audits_expired() {
        let shell = shell();
        shell.setup_pin("123456").unwrap();
        let md = Metadata::new();
        shell
            .store()
            .create_request(NewApprovalRequest {
                id: "req-late",
                action: "fs.write",
                target: "/etc/hosts",
                metadata: &md,
                risk: "high",
                reason: "r",
                policy_id: "p",
                expires_at: "2001-01-01T00:00:00+00:00",
            })
            .unwrap();

        assert!(matches!(
            shell.approve("req-late", "123456"),
            Err(ShellError::RequestExpired)
        ));
        let entry = &shell.recent_audit(1).unwrap()[0];
        assert_eq!(entry.event_type, "approve_pin");
        assert_eq!(entry.outcome, "expired");
    }

    #[test]
    fn test_parse_reply() {
        let command = ApprovalShell::<InMemoryStore>::parse_reply("pin req-1 123456").unwrap();
        assert_eq!(
            command,
            ReplyCommand {
                request_id: "req-1".into(),
                pin: "123456".into()
            }
        );
        // Extra whitespace is tolerated; the shape is not.
        assert!(ApprovalShell::<InMemoryStore>::parse_reply("  PIN   r   p  ").is_ok());
        for bad in ["PIN r", "PIN r p extra", "APPROVE r p", ""] {
            assert!(matches!(
                ApprovalShell::<InMemoryStore>::parse_reply(bad),
                Err(ShellError::InvalidReplyFormat)
            ));
        }
    }

    #[test]
    fn test_status_transitions_form_a_dag() {
        // pending → approved is final; no later call moves it anywhere else.
        let shell = shell();
        shell.setup_pin("123456").unwrap();
        let pending = shell
            .decide("fs.write", "/etc/hosts", &Metadata::new())
            .unwrap()
            .pending
            .unwrap();
        shell.approve(&pending.request_id, "123456").unwrap();

        for wrong in ["000000", "123456"] {
            assert!(shell.approve(&pending.request_id, wrong).is_err());
        }
        let status = shell.request_status(&pending.request_id).unwrap().status;
        assert_eq!(status, RequestStatus::Approved);
    }

    #[test]
    fn test_risk_keywords_round_trip() {
        let shell = shell();
        let stored = shell
            .set_risk_keywords(["  Wipe ", "DELETE", "wipe", ""])
            .unwrap();
        assert_eq!(stored, vec!["wipe".to_string(), "delete".to_string()]);
        assert_eq!(shell.risk_keywords().unwrap(), stored);
        let entry = &shell.recent_audit(1).unwrap()[0];
        assert_eq!(entry.event_type, "risk_keywords_config");
        assert_eq!(entry.details["count"], json!(2));
    }
}
