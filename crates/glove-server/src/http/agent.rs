// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Agent-facing endpoints: the primary decision call and the status poll.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::error::ApiError;
use super::{require_agent, AppState};
use crate::notifier::NotifyOptions;
use glove_core::storage::{settings, Store};
use glove_core::types::{AuditEvent, Metadata, PendingApproval, RequestSnapshot};

#[derive(Debug, Deserialize)]
pub struct AgentRequestIn {
    pub action: String,
    pub target: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub struct AgentDecisionOut {
    pub decision: String,
    pub reason: String,
    pub policy_id: String,
    pub risk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_url: Option<String>,
}

/// `POST /api/v1/agent/request` — evaluate an action.
///
/// On `require_pin` the human is notified after the pending record and
/// audit entry are durable.  Notifier failures are swallowed into an audit
/// `notify`/`failed` entry; they never poison the agent response.
pub async fn agent_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AgentRequestIn>,
) -> Result<Json<AgentDecisionOut>, ApiError> {
    require_agent(&headers, &state)?;
    if payload.action.is_empty() || payload.action.chars().count() > 200 {
        return Err(ApiError::bad_request("invalid_action"));
    }
    if payload.target.is_empty() || payload.target.chars().count() > 500 {
        return Err(ApiError::bad_request("invalid_target"));
    }

    let outcome = state
        .shell
        .decide(&payload.action, &payload.target, &payload.metadata)?;

    if let Some(pending) = &outcome.pending {
        notify_pending(&state, &payload, pending).await;
    }

    let pending = outcome.pending;
    Ok(Json(AgentDecisionOut {
        decision: outcome.decision.as_str().into(),
        reason: outcome.reason,
        policy_id: outcome.policy_id,
        risk: outcome.risk,
        request_id: pending.as_ref().map(|p| p.request_id.clone()),
        expires_at: pending.as_ref().map(|p| p.expires_at.clone()),
        ui_url: pending.map(|p| p.ui_url),
    }))
}

/// Notify the human about a pending approval.  Every provider is
/// individually time-bounded, so this await cannot hang the response.
async fn notify_pending(state: &AppState, payload: &AgentRequestIn, pending: &PendingApproval) {
    let message = format!(
        "Glove approval needed.\nRequest: {}\nAction: {}\nTarget: {}\nApprove in Glove UI: {}\n",
        pending.request_id, payload.action, payload.target, pending.ui_url
    );
    let mut notify_payload = Metadata::new();
    notify_payload.insert(
        "request_id".into(),
        serde_json::Value::String(pending.request_id.clone()),
    );
    let options = NotifyOptions {
        clawhub_extensions: Some(enabled_extensions(state)),
    };

    if let Err(error) = state
        .notifier
        .send("Glove PIN Required", &message, &notify_payload, &options)
        .await
    {
        let audit_result = state.shell.audit(
            &AuditEvent::new("notify", "failed")
                .with_details(json!({"error": error.to_string()}))
                .with_request_id(&pending.request_id)
                .with_action_target(&payload.action, &payload.target),
        );
        if let Err(audit_error) = audit_result {
            warn!(request_id = %pending.request_id, error = %audit_error,
                "failed to audit notifier failure");
        }
    }
}

/// Enabled ClawHub extension ids: the settings row when present, else the
/// environment list.
pub(crate) fn enabled_extensions(state: &AppState) -> Vec<String> {
    let raw = state
        .shell
        .store()
        .get_setting(settings::ENABLED_EXTENSIONS)
        .ok()
        .flatten()
        .filter(|stored| !stored.is_empty())
        .unwrap_or_else(|| state.settings.clawhub_extensions.clone());
    raw.split(',')
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub request_id: String,
}

/// `GET /api/v1/agent/request-status` — poll a request, lazily expiring it.
pub async fn request_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<RequestSnapshot>, ApiError> {
    require_agent(&headers, &state)?;
    Ok(Json(state.shell.request_status(&query.request_id)?))
}
