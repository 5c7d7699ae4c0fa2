// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Shell-level configuration.
//!
//! [`ShellConfig`] is the single entry point for tuning the approval shell
//! at construction time.  All fields have sensible defaults so that
//! `ShellConfig::default()` is always a valid starting point.

use serde::{Deserialize, Serialize};

/// Top-level configuration for [`ApprovalShell`](crate::shell::ApprovalShell).
///
/// # Examples
///
/// ```rust
/// use glove_core::config::ShellConfig;
///
/// let config = ShellConfig {
///     max_pin_attempts: 3,
///     ..ShellConfig::default()
/// };
/// assert_eq!(config.request_ttl_seconds, 300);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Lifetime of a pending approval request in seconds.  Defaults to 300.
    pub request_ttl_seconds: u64,

    /// Failed PIN attempts after which a pending request is denied and
    /// audited with outcome `locked`.  Defaults to 5.
    pub max_pin_attempts: u32,

    /// Base URL of the approval UI, used for deep links when the request
    /// metadata does not carry a valid `ui_base_url` override.
    pub public_url: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            request_ttl_seconds: 300,
            max_pin_attempts: 5,
            public_url: "http://127.0.0.1:8088".into(),
        }
    }
}
