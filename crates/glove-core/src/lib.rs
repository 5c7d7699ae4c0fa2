// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # glove-core
//!
//! Decision, approval, and audit engine for Glove, a human-in-the-loop
//! authorization shell for autonomous agents: an agent proposes an action,
//! the policy engine allows, denies, or escalates it, and escalated actions
//! wait on a human PIN inside a bounded window.  Every transition lands in
//! a hash-chained audit log that makes tampering detectable.
//!
//! ## Architecture
//!
//! ```text
//! ApprovalShell<S: Store>
//!   ├── PolicyEngine   — blocked targets + longest-prefix rules
//!   ├── keywords       — operator keyword triage (pre-policy escalation)
//!   ├── secrets        — PIN KDF, id/token minting, constant-time compare
//!   ├── audit          — SHA-256 hash chain over every state transition
//!   └── Store          — settings, approval requests, append-only audit log
//! ```
//!
//! The [`trust`] module authenticates signed extension bundles against a
//! publisher trust store (Ed25519 over the ASCII-hex digest of the zip).
//!
//! ## Quick Start
//!
//! ```rust
//! use glove_core::config::ShellConfig;
//! use glove_core::policy::{PolicyDocument, PolicyEngine, PolicyRule};
//! use glove_core::shell::ApprovalShell;
//! use glove_core::storage::InMemoryStore;
//! use glove_core::types::{Decision, Metadata};
//!
//! let policy = PolicyEngine::new(PolicyDocument {
//!     default_risk: "low".into(),
//!     rules: vec![PolicyRule {
//!         id: Some("r-write".into()),
//!         action_prefix: "fs.write".into(),
//!         risk: Some("high".into()),
//!         ..PolicyRule::default()
//!     }],
//!     ..PolicyDocument::default()
//! });
//! let shell = ApprovalShell::new(ShellConfig::default(), policy, InMemoryStore::new());
//!
//! // Low-risk actions pass straight through.
//! let outcome = shell.decide("read", "notes", &Metadata::new()).unwrap();
//! assert_eq!(outcome.decision, Decision::Allow);
//!
//! // High-risk actions park a pending approval request.
//! shell.setup_pin("123456").unwrap();
//! let outcome = shell.decide("fs.write", "/etc/hosts", &Metadata::new()).unwrap();
//! let pending = outcome.pending.unwrap();
//! let grant = shell.approve(&pending.request_id, "123456").unwrap();
//! assert!(!grant.approval_token.is_empty());
//! ```

pub mod audit;
pub mod canon;
pub mod config;
pub mod keywords;
pub mod policy;
pub mod secrets;
pub mod shell;
pub mod storage;
pub mod trust;
pub mod types;

// Re-export the most commonly used items at the crate root so consumers can
// write `use glove_core::ApprovalShell;` instead of the fully qualified path.
pub use config::ShellConfig;
pub use policy::{PolicyDocument, PolicyEngine, PolicyRule};
pub use shell::{ApprovalShell, ShellError};
pub use storage::{InMemoryStore, Store, StoreError};
pub use trust::{SignatureError, TrustStore};
pub use types::{
    ApprovalGrant, ApprovalRequest, AuditEntry, AuditEvent, Decision, DecisionOutcome, Metadata,
    PendingApproval, RequestSnapshot, RequestStatus,
};
