// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Admin surface: bootstrap, PIN setup, pending list, audit feed, risk
//! keywords, extension management, and the approval endpoints.
//!
//! Everything here is gated by the admin bearer key except the inbound
//! reply relay, which authenticates with a URL-query token instead.

use std::time::Duration;

use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::agent::enabled_extensions;
use super::error::ApiError;
use super::{require_admin, AppState};
use glove_core::secrets::constant_time_eq;
use glove_core::storage::{settings, Store};
use glove_core::types::{ApprovalGrant, AuditEvent};

/// Timeout for install-by-url downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Bootstrap and PIN
// ---------------------------------------------------------------------------

/// `GET /api/v1/admin/bootstrap`
pub async fn bootstrap(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    Ok(Json(json!({"pin_configured": state.shell.pin_configured()?})))
}

#[derive(Debug, Deserialize)]
pub struct SetupPinIn {
    pub pin: String,
}

/// `POST /api/v1/admin/setup-pin` — write-only; overwrites any prior PIN.
/// The admin key is the capability, so no old-PIN proof is required.
pub async fn setup_pin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SetupPinIn>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let length = payload.pin.chars().count();
    if !(4..=32).contains(&length) {
        return Err(ApiError::bad_request("invalid_pin_length"));
    }
    state.shell.setup_pin(&payload.pin)?;
    Ok(Json(json!({"status": "ok"})))
}

// ---------------------------------------------------------------------------
// Pending requests and audit feed
// ---------------------------------------------------------------------------

/// `GET /api/v1/admin/requests/pending`
pub async fn list_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    Ok(Json(json!({"items": state.shell.pending_requests()?})))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: usize,
}

fn default_audit_limit() -> usize {
    100
}

/// `GET /api/v1/admin/audit/recent` — newest first, limit clamped to 500.
pub async fn recent_audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    Ok(Json(json!({"items": state.shell.recent_audit(query.limit)?})))
}

// ---------------------------------------------------------------------------
// Risk keywords
// ---------------------------------------------------------------------------

/// `GET /api/v1/admin/risk-keywords`
pub async fn get_risk_keywords(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    Ok(Json(json!({"keywords": state.shell.risk_keywords()?})))
}

#[derive(Debug, Deserialize)]
pub struct RiskKeywordsIn {
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// `POST /api/v1/admin/risk-keywords/config`
pub async fn set_risk_keywords(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RiskKeywordsIn>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let keywords = state.shell.set_risk_keywords(payload.keywords)?;
    Ok(Json(json!({"status": "ok", "keywords": keywords})))
}

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

/// `GET /api/v1/admin/extensions`
pub async fn list_extensions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let installed = state.notifier.discover_extensions();
    let enabled: Vec<String> = enabled_extensions(&state)
        .into_iter()
        .filter(|id| installed.contains(id))
        .collect();
    Ok(Json(json!({
        "extensions_dir": state.settings.clawhub_extensions_dir,
        "installed": installed,
        "enabled": enabled,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ExtensionConfigIn {
    #[serde(default)]
    pub enabled_ids: Vec<String>,
}

/// `POST /api/v1/admin/extensions/config` — only installed ids are kept.
pub async fn set_extensions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ExtensionConfigIn>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let installed = state.notifier.discover_extensions();
    let enabled: Vec<String> = payload
        .enabled_ids
        .into_iter()
        .filter(|id| installed.contains(id))
        .collect();
    state
        .shell
        .store()
        .set_setting(settings::ENABLED_EXTENSIONS, &enabled.join(","))?;
    state.shell.audit(
        &AuditEvent::new("extensions_config", "success")
            .with_details(json!({"enabled": enabled})),
    )?;
    Ok(Json(json!({"status": "ok", "enabled": enabled})))
}

#[derive(Debug, Deserialize)]
pub struct ExtensionTestIn {
    pub extension_id: String,
}

/// `POST /api/v1/admin/extensions/test` — synthetic `notify_test` envelope.
pub async fn test_extension(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ExtensionTestIn>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let installed = state.notifier.discover_extensions();
    if !installed.contains(&payload.extension_id) {
        return Err(ApiError::not_found("extension_not_found"));
    }
    match state.notifier.test_extension(&payload.extension_id).await {
        Ok(()) => {
            state.shell.audit(
                &AuditEvent::new("extensions_test", "success")
                    .with_details(json!({"extension_id": payload.extension_id})),
            )?;
            Ok(Json(
                json!({"status": "ok", "extension_id": payload.extension_id}),
            ))
        }
        Err(error) => {
            state.shell.audit(
                &AuditEvent::new("extensions_test", "failed").with_details(
                    json!({"extension_id": payload.extension_id, "error": error.to_string()}),
                ),
            )?;
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("extension_test_failed: {error}"),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtensionInstallUrlIn {
    pub url: String,
    pub key_id: String,
    pub signature_b64: String,
    #[serde(default)]
    pub replace_existing: bool,
}

/// `POST /api/v1/admin/extensions/install-url` — download then install.
pub async fn install_extension_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ExtensionInstallUrlIn>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;

    let zip_bytes = state
        .downloads
        .get(&payload.url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|error| ApiError::bad_request(format!("download_failed: {error}")))?
        .bytes()
        .await
        .map_err(|error| ApiError::bad_request(format!("download_failed: {error}")))?;

    let extension_id = state.installer.install_from_zip(
        &zip_bytes,
        payload.replace_existing,
        Some(&payload.key_id),
        Some(&payload.signature_b64),
    )?;
    state.shell.audit(
        &AuditEvent::new("extensions_install", "success").with_details(json!({
            "source": "url",
            "url": payload.url,
            "extension_id": extension_id,
            "key_id": payload.key_id,
        })),
    )?;
    Ok(Json(json!({"status": "ok", "extension_id": extension_id})))
}

/// `POST /api/v1/admin/extensions/install-upload` — multipart install.
///
/// Fields: `file` (the zip), `key_id`, `signature_b64`, and optional
/// `replace_existing`.
pub async fn install_extension_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;

    let mut zip_bytes: Option<Vec<u8>> = None;
    let mut filename = String::new();
    let mut key_id: Option<String> = None;
    let mut signature_b64: Option<String> = None;
    let mut replace_existing = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::bad_request(format!("invalid_multipart: {error}")))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|error| ApiError::bad_request(format!("invalid_multipart: {error}")))?;
                zip_bytes = Some(bytes.to_vec());
            }
            "key_id" => key_id = Some(read_text_field(field).await?),
            "signature_b64" => signature_b64 = Some(read_text_field(field).await?),
            "replace_existing" => {
                let raw = read_text_field(field).await?;
                replace_existing =
                    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on");
            }
            _ => {}
        }
    }

    let Some(zip_bytes) = zip_bytes else {
        return Err(ApiError::bad_request("file_must_be_zip"));
    };
    if !filename.to_lowercase().ends_with(".zip") {
        return Err(ApiError::bad_request("file_must_be_zip"));
    }

    let extension_id = state.installer.install_from_zip(
        &zip_bytes,
        replace_existing,
        key_id.as_deref(),
        signature_b64.as_deref(),
    )?;
    state.shell.audit(
        &AuditEvent::new("extensions_install", "success").with_details(json!({
            "source": "upload",
            "filename": filename,
            "extension_id": extension_id,
            "key_id": key_id,
        })),
    )?;
    Ok(Json(json!({"status": "ok", "extension_id": extension_id})))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|error| ApiError::bad_request(format!("invalid_multipart: {error}")))
}

// ---------------------------------------------------------------------------
// Approval
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ApprovePinIn {
    pub request_id: String,
    pub pin: String,
}

/// `POST /api/v1/admin/approve-pin`
pub async fn approve_pin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ApprovePinIn>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let grant = state.shell.approve(&payload.request_id, &payload.pin)?;
    Ok(Json(grant_response(grant)))
}

#[derive(Debug, Deserialize)]
pub struct MessageReplyIn {
    pub body: String,
}

/// `POST /api/v1/admin/message-reply` — body `PIN <request_id> <pin>`.
pub async fn message_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MessageReplyIn>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    if payload.body.chars().count() > 300 {
        return Err(ApiError::bad_request("invalid_format"));
    }
    let grant = state.shell.approve_from_reply(&payload.body)?;
    Ok(Json(grant_response(grant)))
}

#[derive(Debug, Deserialize)]
pub struct InboundQuery {
    #[serde(default)]
    pub token: String,
}

/// `POST /api/v1/inbound/reply?token=…` — form-encoded relay for external
/// messaging providers.  Accepts the body under `body` or `Body`.
///
/// An empty configured inbound token disables the endpoint entirely.
pub async fn inbound_reply(
    State(state): State<AppState>,
    Query(query): Query<InboundQuery>,
    Form(form): Form<std::collections::HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let configured = &state.settings.inbound_token;
    if configured.is_empty() || !constant_time_eq(&query.token, configured) {
        return Err(ApiError::unauthorized("invalid_inbound_token"));
    }

    let raw = form
        .get("body")
        .or_else(|| form.get("Body"))
        .map(|value| value.trim())
        .unwrap_or("");
    if raw.is_empty() {
        return Err(ApiError::bad_request("missing_message_body"));
    }

    let grant = state.shell.approve_from_reply(raw)?;
    Ok(Json(grant_response(grant)))
}

fn grant_response(grant: ApprovalGrant) -> Value {
    json!({
        "status": "approved",
        "approval_token": grant.approval_token,
        "request_id": grant.request_id,
    })
}
