// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # glove-server
//!
//! Deployable surface of the Glove authorization shell: environment
//! configuration, bearer-key bootstrap, the axum HTTP API, the multi-provider
//! notifier, and the signed-extension installer.  The decision / approval /
//! audit semantics live in `glove-core`; durability lives in `glove-store`.

pub mod config;
pub mod extensions;
pub mod http;
pub mod keys;
pub mod notifier;

pub use config::Settings;
pub use extensions::{InstallError, Installer};
pub use http::{router, AppState};
pub use keys::BearerKeys;
pub use notifier::{Notifier, NotifyError, NotifyOptions};
