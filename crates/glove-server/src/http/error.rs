// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! HTTP error mapping.
//!
//! Every error leaves the API as `{"detail": "<kind>"}` or
//! `{"detail": "<kind>: <info>"}` with the status codes of the approval
//! flow contract: validation 400, bad credentials 401, unknown ids 404,
//! lifecycle conflicts 409.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::extensions::InstallError;
use glove_core::shell::ShellError;
use glove_core::storage::StoreError;

/// A classified API error carrying its HTTP status and `detail` string.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"detail": self.detail}))).into_response()
    }
}

impl From<ShellError> for ApiError {
    fn from(error: ShellError) -> Self {
        let status = match &error {
            ShellError::RequestNotFound => StatusCode::NOT_FOUND,
            ShellError::RequestNotPending(_)
            | ShellError::RequestExpired
            | ShellError::PinNotConfigured => StatusCode::CONFLICT,
            ShellError::InvalidPin => StatusCode::UNAUTHORIZED,
            ShellError::InvalidReplyFormat => StatusCode::BAD_REQUEST,
            ShellError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        Self::internal(error.to_string())
    }
}

impl From<InstallError> for ApiError {
    fn from(error: InstallError) -> Self {
        let status = match &error {
            InstallError::ExtensionExists => StatusCode::CONFLICT,
            InstallError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, error.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
