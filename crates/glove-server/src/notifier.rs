// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Notifier fan-out.
//!
//! The notifier delivers approval prompts to the human through one or more
//! providers: `console`, `webhook`, `smtp`, `twilio`, and `clawhub`
//! (sandboxed subprocess extensions).  Every configured provider is
//! attempted on each send; per-provider failures are collected and an
//! aggregate error is raised **only when every provider failed**.  A single
//! success suppresses the aggregate, so one broken channel never hides a
//! delivered notification.
//!
//! ClawHub extensions are external processes, never in-process plugins.
//! They are spawned without a shell, receive a JSON envelope on stdin, run
//! with their manifest directory as working directory, and are killed at
//! the configured wall-clock timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::Settings;
use glove_core::types::Metadata;

/// Timeout for webhook and Twilio requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for SMTP delivery.
const SMTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Extension manifest file name.
pub const MANIFEST_NAME: &str = "glove-extension.json";

/// Notifier failures.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// One provider failed; carried inside the aggregate.
    #[error("{0}")]
    Provider(String),
    /// Every configured provider failed.
    #[error("all notifier providers failed: {0}")]
    AllProvidersFailed(String),
}

/// Per-send options supplied by the caller.
#[derive(Debug, Default, Clone)]
pub struct NotifyOptions {
    /// Enabled ClawHub extension ids; overrides the environment list.
    pub clawhub_extensions: Option<Vec<String>>,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    subject: &'a str,
    message: &'a str,
    payload: &'a Metadata,
}

/// Multi-provider notification dispatcher.
pub struct Notifier {
    settings: Settings,
    http: reqwest::Client,
}

impl Notifier {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    /// Fan a notification out to every configured provider.
    pub async fn send(
        &self,
        subject: &str,
        message: &str,
        payload: &Metadata,
        options: &NotifyOptions,
    ) -> Result<(), NotifyError> {
        let providers = self.providers();
        let mut errors: Vec<String> = Vec::new();

        for provider in &providers {
            let result = match provider.as_str() {
                "webhook" => self.send_webhook(subject, message, payload).await,
                "smtp" => self.send_smtp(subject, message).await,
                "twilio" => self.send_twilio(message).await,
                "clawhub" => self.send_clawhub(subject, message, payload, options).await,
                // Unknown names degrade to the console provider.
                _ => self.send_console(subject, message, payload),
            };
            if let Err(error) = result {
                errors.push(format!("{provider}: {error}"));
            }
        }

        if !errors.is_empty() && errors.len() == providers.len() {
            return Err(NotifyError::AllProvidersFailed(errors.join("; ")));
        }
        Ok(())
    }

    /// The active provider list: the explicit CSV when set, else the single
    /// default.  An empty list degrades to `console`.
    fn providers(&self) -> Vec<String> {
        if !self.settings.notifier_providers.is_empty() {
            let providers: Vec<String> = self
                .settings
                .notifier_providers
                .split(',')
                .map(|name| name.trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect();
            if !providers.is_empty() {
                return providers;
            }
            return vec!["console".into()];
        }
        if self.settings.notifier_provider.is_empty() {
            return vec!["console".into()];
        }
        vec![self.settings.notifier_provider.clone()]
    }

    // ------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------

    fn send_console(
        &self,
        subject: &str,
        message: &str,
        payload: &Metadata,
    ) -> Result<(), NotifyError> {
        println!(
            "[GLOVE][NOTIFY] {} {} {}",
            subject,
            message,
            Value::Object(payload.clone())
        );
        Ok(())
    }

    async fn send_webhook(
        &self,
        subject: &str,
        message: &str,
        payload: &Metadata,
    ) -> Result<(), NotifyError> {
        if self.settings.webhook_url.is_empty() {
            return Err(NotifyError::Provider(
                "GLOVE_WEBHOOK_URL is required for webhook notifier.".into(),
            ));
        }
        self.http
            .post(&self.settings.webhook_url)
            .timeout(HTTP_TIMEOUT)
            .json(&WebhookBody {
                subject,
                message,
                payload,
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| NotifyError::Provider(error.to_string()))?;
        Ok(())
    }

    async fn send_smtp(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        let settings = &self.settings;
        if settings.smtp_host.is_empty()
            || settings.smtp_from.is_empty()
            || settings.notify_to.is_empty()
        {
            return Err(NotifyError::Provider(
                "SMTP notifier requires host/from/to settings.".into(),
            ));
        }

        let email = Message::builder()
            .from(parse_mailbox(&settings.smtp_from)?)
            .to(parse_mailbox(&settings.notify_to)?)
            .subject(subject)
            .body(message.to_string())
            .map_err(|error| NotifyError::Provider(error.to_string()))?;

        let builder = if settings.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
                .map_err(|error| NotifyError::Provider(error.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host)
        };
        let mut builder = builder.port(settings.smtp_port).timeout(Some(SMTP_TIMEOUT));
        if !settings.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.smtp_username.clone(),
                settings.smtp_password.clone(),
            ));
        }

        builder
            .build()
            .send(email)
            .await
            .map_err(|error| NotifyError::Provider(error.to_string()))?;
        Ok(())
    }

    async fn send_twilio(&self, message: &str) -> Result<(), NotifyError> {
        let settings = &self.settings;
        if settings.twilio_account_sid.is_empty()
            || settings.twilio_auth_token.is_empty()
            || settings.twilio_from.is_empty()
            || settings.twilio_to.is_empty()
        {
            return Err(NotifyError::Provider(
                "Twilio notifier requires account sid/auth token/from/to.".into(),
            ));
        }

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            settings.twilio_account_sid
        );
        let form = [
            ("From", settings.twilio_from.as_str()),
            ("To", settings.twilio_to.as_str()),
            ("Body", message),
        ];
        self.http
            .post(&url)
            .timeout(HTTP_TIMEOUT)
            .basic_auth(
                &settings.twilio_account_sid,
                Some(&settings.twilio_auth_token),
            )
            .form(&form)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| NotifyError::Provider(error.to_string()))?;
        Ok(())
    }

    async fn send_clawhub(
        &self,
        subject: &str,
        message: &str,
        payload: &Metadata,
        options: &NotifyOptions,
    ) -> Result<(), NotifyError> {
        let extension_ids = self.resolve_extension_ids(options);
        if extension_ids.is_empty() {
            return Err(NotifyError::Provider(
                "GLOVE_CLAWHUB_EXTENSIONS is empty.".into(),
            ));
        }
        let root = self.extensions_root();
        if !root.exists() {
            return Err(NotifyError::Provider(format!(
                "ClawHub extensions dir missing: {}",
                root.display()
            )));
        }

        let envelope = json!({
            "event": "notify",
            "subject": subject,
            "message": message,
            "payload": payload,
        });

        let mut failed: Vec<String> = Vec::new();
        for extension_id in &extension_ids {
            if let Err(error) = self.invoke_extension(&root, extension_id, &envelope).await {
                failed.push(format!("{extension_id}: {error}"));
            }
        }
        if !failed.is_empty() {
            return Err(NotifyError::Provider(format!(
                "ClawHub extension failures: {}",
                failed.join("; ")
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // ClawHub extensions
    // ------------------------------------------------------------------

    /// Immediate subdirectories of the extensions root that carry a
    /// manifest, sorted by id.  A missing root is simply an empty list.
    pub fn discover_extensions(&self) -> Vec<String> {
        let root = self.extensions_root();
        let Ok(children) = std::fs::read_dir(&root) else {
            return Vec::new();
        };
        let mut found: Vec<String> = children
            .flatten()
            .filter(|child| child.path().is_dir() && child.path().join(MANIFEST_NAME).exists())
            .filter_map(|child| child.file_name().into_string().ok())
            .collect();
        found.sort();
        found
    }

    /// Send a synthetic `notify_test` envelope to one extension.
    pub async fn test_extension(&self, extension_id: &str) -> Result<(), NotifyError> {
        let envelope = json!({
            "event": "notify_test",
            "subject": "Glove Extension Test",
            "message": "Test from Glove admin UI",
            "payload": {"source": "admin_test"},
        });
        self.invoke_extension(&self.extensions_root(), extension_id, &envelope)
            .await
    }

    fn extensions_root(&self) -> PathBuf {
        PathBuf::from(&self.settings.clawhub_extensions_dir)
    }

    fn resolve_extension_ids(&self, options: &NotifyOptions) -> Vec<String> {
        if let Some(override_ids) = &options.clawhub_extensions {
            return override_ids
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }
        self.settings
            .clawhub_extensions
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    }

    /// Spawn one extension process: manifest `notify.command` + `notify.args`,
    /// no shell, cwd = manifest directory, envelope on stdin, captured
    /// output, wall-clock timeout (floor 1 s).  A non-zero exit is a failure.
    async fn invoke_extension(
        &self,
        root: &Path,
        extension_id: &str,
        envelope: &Value,
    ) -> Result<(), NotifyError> {
        let manifest_path = root.join(extension_id).join(MANIFEST_NAME);
        if !manifest_path.exists() {
            return Err(NotifyError::Provider(format!(
                "missing manifest {}",
                manifest_path.display()
            )));
        }
        let raw = std::fs::read_to_string(&manifest_path)
            .map_err(|error| NotifyError::Provider(error.to_string()))?;
        let manifest: Value = serde_json::from_str(&raw)
            .map_err(|error| NotifyError::Provider(format!("invalid manifest: {error}")))?;

        let notify = manifest.get("notify").cloned().unwrap_or(json!({}));
        let command = notify
            .get("command")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if command.is_empty() {
            return Err(NotifyError::Provider("notify.command missing".into()));
        }
        let args: Vec<String> = match notify.get("args") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(arg) => arg.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(_) => {
                return Err(NotifyError::Provider("notify.args must be array".into()));
            }
        };

        let workdir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());

        let mut child = tokio::process::Command::new(command)
            .args(&args)
            .current_dir(&workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| NotifyError::Provider(format!("spawn failed: {error}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The extension may exit before reading; a broken pipe here is
            // its problem to report via exit status, not ours.
            let _ = stdin.write_all(envelope.to_string().as_bytes()).await;
            let _ = stdin.shutdown().await;
        }

        let timeout = Duration::from_secs(self.settings.clawhub_timeout_seconds.max(1));
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Err(_) => {
                // kill_on_drop reaps the abandoned process.
                return Err(NotifyError::Provider(format!(
                    "timed out after {}s",
                    timeout.as_secs()
                )));
            }
            Ok(Err(error)) => {
                return Err(NotifyError::Provider(error.to_string()));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::Provider(format!(
                "exit={} stderr={}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn parse_mailbox(raw: &str) -> Result<lettre::message::Mailbox, NotifyError> {
    raw.parse()
        .map_err(|error| NotifyError::Provider(format!("invalid mailbox '{raw}': {error}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
