// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! `gloved` — the Glove authorization shell daemon.
//!
//! Loads configuration from `GLOVE_*` environment variables, opens the
//! SQLite store, loads the policy document, resolves the bearer keys, and
//! serves the HTTP API.

use std::path::Path;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use glove_core::config::ShellConfig;
use glove_core::policy::PolicyEngine;
use glove_core::shell::ApprovalShell;
use glove_server::config::Settings;
use glove_server::http::{router, AppState};
use glove_server::keys::BearerKeys;
use glove_store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load().context("loading GLOVE_* configuration")?;

    let store = SqliteStore::open(&settings.db_path)
        .with_context(|| format!("opening database at {}", settings.db_path))?;
    let keys = BearerKeys::bootstrap(&store).context("bootstrapping bearer keys")?;

    let policy = PolicyEngine::load(Path::new(&settings.policy_path))
        .with_context(|| format!("loading policy from {}", settings.policy_path))?;
    let shell = ApprovalShell::new(
        ShellConfig {
            request_ttl_seconds: settings.request_ttl_seconds,
            max_pin_attempts: settings.max_pin_attempts,
            public_url: settings.public_url.clone(),
        },
        policy,
        store,
    );

    // Contract line: only the 8-char key tails ever reach stdout.
    println!(
        "{}",
        serde_json::json!({
            "event": "glove_startup",
            "admin_key_tail": keys.admin_key_tail(),
            "agent_key_tail": keys.agent_key_tail(),
            "pin_configured": shell.pin_configured()?,
        })
    );

    let bind_addr = (settings.host.clone(), settings.port);
    let state = AppState::new(shell, settings, keys);
    let listener = tokio::net::TcpListener::bind(bind_addr.clone())
        .await
        .with_context(|| format!("binding {}:{}", bind_addr.0, bind_addr.1))?;
    info!(host = %bind_addr.0, port = bind_addr.1, "glove listening");

    axum::serve(listener, router(state))
        .await
        .context("serving HTTP")?;
    Ok(())
}
