// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Server configuration from `GLOVE_`-prefixed environment variables.
//!
//! Unset variables fall back to their defaults; type conversion errors are
//! reported as [`ConfigError::ParseField`] rather than silently defaulted.
//!
//! | Variable                             | Type   | Default                      |
//! |--------------------------------------|--------|------------------------------|
//! | `GLOVE_HOST`                         | string | `0.0.0.0`                    |
//! | `GLOVE_PORT`                         | u16    | `8088`                       |
//! | `GLOVE_DB_PATH`                      | string | `./glove.db`                 |
//! | `GLOVE_POLICY_PATH`                  | string | `./policy.json`              |
//! | `GLOVE_REQUEST_TTL_SECONDS`          | u64    | `300`                        |
//! | `GLOVE_MAX_PIN_ATTEMPTS`             | u32    | `5`                          |
//! | `GLOVE_INBOUND_TOKEN`                | string | empty (inbound disabled)     |
//! | `GLOVE_NOTIFIER_PROVIDER`            | string | `console`                    |
//! | `GLOVE_NOTIFIER_PROVIDERS`           | csv    | empty                        |
//! | `GLOVE_PUBLIC_URL`                   | string | `http://127.0.0.1:8088`      |
//! | `GLOVE_WEBHOOK_URL`                  | string | empty                        |
//! | `GLOVE_SMTP_HOST/PORT/USERNAME/...`  | mixed  | empty / `587` / TLS on       |
//! | `GLOVE_NOTIFY_TO`                    | string | empty                        |
//! | `GLOVE_TWILIO_*`                     | string | empty                        |
//! | `GLOVE_CLAWHUB_EXTENSIONS_DIR`       | string | `./extensions`               |
//! | `GLOVE_CLAWHUB_EXTENSIONS`           | csv    | empty                        |
//! | `GLOVE_CLAWHUB_TIMEOUT_SECONDS`      | u64    | `10`                         |
//! | `GLOVE_CLAWHUB_TRUST_STORE_PATH`     | string | `./trusted_publishers.json`  |
//! | `GLOVE_REQUIRE_EXTENSION_SIGNATURES` | bool   | `true`                       |
//!
//! `GLOVE_AGENT_KEY` / `GLOVE_ADMIN_KEY` are read separately during key
//! bootstrap (see [`crate::keys`]) because their fallback is a settings row,
//! not a constant.

use std::fmt;

/// Runtime settings for the server, notifier, and extension installer.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub policy_path: String,
    pub request_ttl_seconds: u64,
    pub max_pin_attempts: u32,
    pub inbound_token: String,
    pub notifier_provider: String,
    pub notifier_providers: String,
    pub public_url: String,
    pub webhook_url: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub smtp_from: String,
    pub notify_to: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from: String,
    pub twilio_to: String,
    pub clawhub_extensions_dir: String,
    pub clawhub_extensions: String,
    pub clawhub_timeout_seconds: u64,
    pub clawhub_trust_store_path: String,
    pub require_extension_signatures: bool,
}

impl Settings {
    /// Load settings from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: read_env_string("GLOVE_HOST", "0.0.0.0"),
            port: read_env_u16("GLOVE_PORT", 8088)?,
            db_path: read_env_string("GLOVE_DB_PATH", "./glove.db"),
            policy_path: read_env_string("GLOVE_POLICY_PATH", "./policy.json"),
            request_ttl_seconds: read_env_u64("GLOVE_REQUEST_TTL_SECONDS", 300)?,
            max_pin_attempts: read_env_u32("GLOVE_MAX_PIN_ATTEMPTS", 5)?,
            inbound_token: read_env_string("GLOVE_INBOUND_TOKEN", ""),
            notifier_provider: read_env_string("GLOVE_NOTIFIER_PROVIDER", "console")
                .to_lowercase(),
            notifier_providers: read_env_string("GLOVE_NOTIFIER_PROVIDERS", "").to_lowercase(),
            public_url: read_env_string("GLOVE_PUBLIC_URL", "http://127.0.0.1:8088"),
            webhook_url: read_env_string("GLOVE_WEBHOOK_URL", ""),
            smtp_host: read_env_string("GLOVE_SMTP_HOST", ""),
            smtp_port: read_env_u16("GLOVE_SMTP_PORT", 587)?,
            smtp_username: read_env_string("GLOVE_SMTP_USERNAME", ""),
            smtp_password: read_env_string("GLOVE_SMTP_PASSWORD", ""),
            smtp_use_tls: read_env_bool("GLOVE_SMTP_USE_TLS", true)?,
            smtp_from: read_env_string("GLOVE_SMTP_FROM", ""),
            notify_to: read_env_string("GLOVE_NOTIFY_TO", ""),
            twilio_account_sid: read_env_string("GLOVE_TWILIO_ACCOUNT_SID", ""),
            twilio_auth_token: read_env_string("GLOVE_TWILIO_AUTH_TOKEN", ""),
            twilio_from: read_env_string("GLOVE_TWILIO_FROM", ""),
            twilio_to: read_env_string("GLOVE_TWILIO_TO", ""),
            clawhub_extensions_dir: read_env_string("GLOVE_CLAWHUB_EXTENSIONS_DIR", "./extensions"),
            clawhub_extensions: read_env_string("GLOVE_CLAWHUB_EXTENSIONS", ""),
            clawhub_timeout_seconds: read_env_u64("GLOVE_CLAWHUB_TIMEOUT_SECONDS", 10)?,
            clawhub_trust_store_path: read_env_string(
                "GLOVE_CLAWHUB_TRUST_STORE_PATH",
                "./trusted_publishers.json",
            ),
            require_extension_signatures: read_env_bool("GLOVE_REQUIRE_EXTENSION_SIGNATURES", true)?,
        })
    }

    /// Defaults with no environment consultation.  Intended for tests.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            db_path: ":memory:".into(),
            policy_path: "./policy.json".into(),
            request_ttl_seconds: 300,
            max_pin_attempts: 5,
            inbound_token: String::new(),
            notifier_provider: "console".into(),
            notifier_providers: String::new(),
            public_url: "http://127.0.0.1:8088".into(),
            webhook_url: String::new(),
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_use_tls: true,
            smtp_from: String::new(),
            notify_to: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_from: String::new(),
            twilio_to: String::new(),
            clawhub_extensions_dir: "./extensions".into(),
            clawhub_extensions: String::new(),
            clawhub_timeout_seconds: 10,
            clawhub_trust_store_path: "./trusted_publishers.json".into(),
            require_extension_signatures: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors that can occur while loading server configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A variable could not be parsed to its expected type.
    ParseField {
        field: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseField { field, value, reason } => {
                write!(f, "Field \"{field}\": cannot parse \"{value}\": {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn read_env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                default.into()
            } else {
                trimmed.into()
            }
        }
        Err(_) => default.into(),
    }
}

fn read_env_u16(key: &str, default: u16) -> Result<u16, ConfigError> {
    read_env_parsed(key, default)
}

fn read_env_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    read_env_parsed(key, default)
}

fn read_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    read_env_parsed(key, default)
}

fn read_env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|source| ConfigError::ParseField {
                field: key.into(),
                value,
                reason: source.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

fn read_env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ConfigError::ParseField {
                field: key.into(),
                value: other.into(),
                reason: "expected one of: true/false, 1/0, yes/no, on/off".into(),
            }),
        },
        Err(_) => Ok(default),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
