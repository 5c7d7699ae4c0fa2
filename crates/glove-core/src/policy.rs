// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Static policy evaluation.
//!
//! [`PolicyEngine`] evaluates `(action, target)` pairs against a
//! [`PolicyDocument`] loaded once at startup:
//!
//! 1. **Blocked targets** — case-insensitive substring match, first hit
//!    denies outright.
//! 2. **Prefix rules** — the rule with the longest non-empty `action_prefix`
//!    that prefixes the action wins; ties go to the earliest rule.
//! 3. **Default risk** — applied when no rule matches.
//!
//! Risk labels map to decisions: `high` escalates to `require_pin`; any
//! other label (canonicalised to lowercase) allows and is preserved on the
//! result.  Request metadata is opaque to the engine and never consulted
//! here.  Evaluation is pure: same inputs, same output.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Decision, PolicyDecision};

// ---------------------------------------------------------------------------
// Policy document
// ---------------------------------------------------------------------------

/// One ordered rule of the policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Stable rule identifier carried into audit entries as provenance.
    #[serde(default)]
    pub id: Option<String>,
    /// Action prefix this rule matches.  Empty prefixes never match.
    #[serde(default)]
    pub action_prefix: String,
    /// Optional hard decision; only `"deny"` is meaningful.
    #[serde(default)]
    pub decision: Option<String>,
    /// Risk label applied when the rule matches.
    #[serde(default)]
    pub risk: Option<String>,
    /// Explanation surfaced to the agent and the audit log.
    #[serde(default)]
    pub reason: Option<String>,
}

/// The static policy document, loaded once at startup and never hot-reloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Risk applied when no rule matches.
    #[serde(default = "default_risk")]
    pub default_risk: String,
    /// Case-insensitive substrings that deny any matching target.
    #[serde(default)]
    pub blocked_targets: Vec<String>,
    /// Ordered prefix rules.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

fn default_risk() -> String {
    "medium".into()
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            default_risk: default_risk(),
            blocked_targets: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Errors raised while loading a policy document.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse policy JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Policy engine
// ---------------------------------------------------------------------------

/// Evaluates actions against a fixed [`PolicyDocument`].
///
/// # Examples
///
/// ```rust
/// use glove_core::policy::{PolicyDocument, PolicyEngine, PolicyRule};
/// use glove_core::types::Decision;
///
/// let engine = PolicyEngine::new(PolicyDocument {
///     default_risk: "low".into(),
///     blocked_targets: vec!["/secrets".into()],
///     rules: vec![PolicyRule {
///         id: Some("r-write".into()),
///         action_prefix: "fs.write".into(),
///         risk: Some("high".into()),
///         ..PolicyRule::default()
///     }],
/// });
///
/// let verdict = engine.evaluate("fs.write", "/etc/hosts");
/// assert_eq!(verdict.decision, Decision::RequirePin);
///
/// let verdict = engine.evaluate("fs.read", "/app/Secrets/db");
/// assert_eq!(verdict.decision, Decision::Deny);
/// assert_eq!(verdict.policy_id, "policy-blocked-target");
/// ```
pub struct PolicyEngine {
    document: PolicyDocument,
}

impl PolicyEngine {
    /// Construct an engine over an in-memory document.
    pub fn new(document: PolicyDocument) -> Self {
        Self { document }
    }

    /// Load the policy document from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let raw = fs::read_to_string(path).map_err(|source| PolicyError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        let document: PolicyDocument = serde_json::from_str(&raw)?;
        Ok(Self::new(document))
    }

    /// Borrow the underlying document.
    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    /// Evaluate an `(action, target)` pair.
    pub fn evaluate(&self, action: &str, target: &str) -> PolicyDecision {
        let target_lower = target.to_lowercase();
        for blocked in &self.document.blocked_targets {
            if !blocked.is_empty() && target_lower.contains(&blocked.to_lowercase()) {
                return PolicyDecision {
                    decision: Decision::Deny,
                    risk: "high".into(),
                    reason: format!("Target is blocked by policy: {blocked}"),
                    policy_id: "policy-blocked-target".into(),
                };
            }
        }

        let Some(rule) = self.best_rule(action) else {
            return risk_to_decision(
                &self.document.default_risk,
                "default-policy",
                "Default policy applied.",
            );
        };

        let policy_id = rule.id.as_deref().unwrap_or("policy-unnamed");

        if rule.decision.as_deref() == Some("deny") {
            return PolicyDecision {
                decision: Decision::Deny,
                risk: rule.risk.clone().unwrap_or_else(|| "high".into()),
                reason: rule
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Denied by policy rule.".into()),
                policy_id: policy_id.into(),
            };
        }

        let risk = rule
            .risk
            .as_deref()
            .unwrap_or(&self.document.default_risk);
        let reason = rule
            .reason
            .as_deref()
            .unwrap_or("Rule-based policy applied.");
        risk_to_decision(risk, policy_id, reason)
    }

    /// The rule with the longest non-empty `action_prefix` prefixing
    /// `action`.  Ties break to the first occurrence.
    fn best_rule(&self, action: &str) -> Option<&PolicyRule> {
        let mut best: Option<&PolicyRule> = None;
        let mut best_len = 0;
        for rule in &self.document.rules {
            let prefix = &rule.action_prefix;
            if !prefix.is_empty() && action.starts_with(prefix.as_str()) && prefix.len() > best_len
            {
                best = Some(rule);
                best_len = prefix.len();
            }
        }
        best
    }
}

/// Map a risk label to a decision.  `high` escalates; everything else allows
/// with the lowercased label preserved.
fn risk_to_decision(risk: &str, policy_id: &str, reason: &str) -> PolicyDecision {
    let normalized = risk.to_lowercase();
    if normalized == "high" {
        PolicyDecision {
            decision: Decision::RequirePin,
            risk: "high".into(),
            reason: reason.into(),
            policy_id: policy_id.into(),
        }
    } else {
        PolicyDecision {
            decision: Decision::Allow,
            risk: normalized,
            reason: reason.into(),
            policy_id: policy_id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
