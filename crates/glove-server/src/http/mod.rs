// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! HTTP surface.
//!
//! JSON in, JSON out, bearer-header auth (`X-Glove-Agent-Key` /
//! `X-Glove-Admin-Key`, compared constant-time).  Handlers are CPU-light
//! and never suspend for application-level waits; the only suspension
//! points are database I/O, outbound HTTP, SMTP, subprocess waits, and
//! local file I/O.

pub mod admin;
pub mod agent;
pub mod error;

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::Settings;
use crate::extensions::Installer;
use crate::keys::BearerKeys;
use crate::notifier::Notifier;
use self::error::ApiError;
use glove_core::shell::ApprovalShell;
use glove_store::SqliteStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub shell: Arc<ApprovalShell<SqliteStore>>,
    pub notifier: Arc<Notifier>,
    pub installer: Arc<Installer>,
    pub settings: Arc<Settings>,
    pub keys: Arc<BearerKeys>,
    /// Client for extension downloads (install-by-url).
    pub downloads: reqwest::Client,
}

impl AppState {
    pub fn new(
        shell: ApprovalShell<SqliteStore>,
        settings: Settings,
        keys: BearerKeys,
    ) -> Self {
        Self {
            shell: Arc::new(shell),
            notifier: Arc::new(Notifier::new(settings.clone())),
            installer: Arc::new(Installer::from_settings(&settings)),
            settings: Arc::new(settings),
            keys: Arc::new(keys),
            downloads: reqwest::Client::new(),
        }
    }
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/admin/bootstrap", get(admin::bootstrap))
        .route("/api/v1/admin/setup-pin", post(admin::setup_pin))
        .route("/api/v1/admin/requests/pending", get(admin::list_pending))
        .route("/api/v1/admin/audit/recent", get(admin::recent_audit))
        .route("/api/v1/admin/risk-keywords", get(admin::get_risk_keywords))
        .route(
            "/api/v1/admin/risk-keywords/config",
            post(admin::set_risk_keywords),
        )
        .route("/api/v1/admin/extensions", get(admin::list_extensions))
        .route(
            "/api/v1/admin/extensions/config",
            post(admin::set_extensions),
        )
        .route("/api/v1/admin/extensions/test", post(admin::test_extension))
        .route(
            "/api/v1/admin/extensions/install-url",
            post(admin::install_extension_url),
        )
        .route(
            "/api/v1/admin/extensions/install-upload",
            post(admin::install_extension_upload),
        )
        .route("/api/v1/admin/approve-pin", post(admin::approve_pin))
        .route("/api/v1/admin/message-reply", post(admin::message_reply))
        .route("/api/v1/inbound/reply", post(admin::inbound_reply))
        .route("/api/v1/agent/request", post(agent::agent_request))
        .route("/api/v1/agent/request-status", get(agent::request_status))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Auth guards
// ---------------------------------------------------------------------------

pub(crate) fn require_agent(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let presented = headers
        .get("x-glove-agent-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if presented.is_empty() || !state.keys.agent_key_matches(presented) {
        return Err(ApiError::unauthorized("invalid_agent_key"));
    }
    Ok(())
}

pub(crate) fn require_admin(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let presented = headers
        .get("x-glove-admin-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if presented.is_empty() || !state.keys.admin_key_matches(presented) {
        return Err(ApiError::unauthorized("invalid_admin_key"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Unauthenticated liveness probe.  Exposes only the 8-char key tails.
async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({
        "status": "ok",
        "pin_configured": state.shell.pin_configured()?,
        "notifier": state.settings.notifier_provider,
        "agent_key_tail": state.keys.agent_key_tail(),
        "admin_key_tail": state.keys.admin_key_tail(),
    })))
}
