// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # Basic Approval Shell Example
//!
//! Demonstrates the full decision / approval lifecycle using the in-memory
//! storage backend.  Run with:
//!
//! ```bash
//! cargo run --example basic
//! ```

use glove_core::audit::verify_chain;
use glove_core::config::ShellConfig;
use glove_core::policy::{PolicyDocument, PolicyEngine, PolicyRule};
use glove_core::shell::ApprovalShell;
use glove_core::storage::InMemoryStore;
use glove_core::types::Metadata;

fn main() {
    println!("Glove — Basic Example\n");

    // -----------------------------------------------------------------------
    // 1. Construct the shell
    // -----------------------------------------------------------------------
    let policy = PolicyEngine::new(PolicyDocument {
        default_risk: "low".into(),
        blocked_targets: vec!["/secrets".into()],
        rules: vec![PolicyRule {
            id: Some("r-write".into()),
            action_prefix: "fs.write".into(),
            risk: Some("high".into()),
            ..PolicyRule::default()
        }],
    });
    let shell = ApprovalShell::new(ShellConfig::default(), policy, InMemoryStore::new());

    // -----------------------------------------------------------------------
    // 2. Configure the operator PIN and a risk keyword
    // -----------------------------------------------------------------------
    shell.setup_pin("123456").expect("setup pin");
    shell.set_risk_keywords(["wipe"]).expect("set keywords");
    println!("PIN configured; risk keyword 'wipe' active\n");

    // -----------------------------------------------------------------------
    // 3. Evaluate actions
    // -----------------------------------------------------------------------
    let empty = Metadata::new();

    // Action A — allowed by the default policy.
    let outcome = shell.decide("read", "notes", &empty).expect("decide");
    println!("read notes            → {} ({})", outcome.decision, outcome.policy_id);

    // Action B — denied by a blocked target.
    let outcome = shell
        .decide("fs.read", "/app/secrets/db", &empty)
        .expect("decide");
    println!("fs.read /app/secrets  → {} ({})", outcome.decision, outcome.policy_id);

    // Action C — escalated by the prefix rule; wait for a human PIN.
    let outcome = shell
        .decide("fs.write", "/etc/hosts", &empty)
        .expect("decide");
    let pending = outcome.pending.expect("pending approval");
    println!(
        "fs.write /etc/hosts   → {} (request {}, expires {})",
        outcome.decision, pending.request_id, pending.expires_at
    );
    println!("  approve at: {}", pending.ui_url);

    // -----------------------------------------------------------------------
    // 4. The human confirms with the PIN
    // -----------------------------------------------------------------------
    let grant = shell
        .approve(&pending.request_id, "123456")
        .expect("approve");
    println!(
        "  approved — token tail …{}\n",
        &grant.approval_token[grant.approval_token.len() - 8..]
    );

    // -----------------------------------------------------------------------
    // 5. Verify the audit chain end to end
    // -----------------------------------------------------------------------
    let mut entries = shell.recent_audit(500).expect("audit");
    entries.reverse();
    verify_chain(&entries).expect("chain intact");
    println!("audit chain verified: {} entries, no tampering", entries.len());
}
