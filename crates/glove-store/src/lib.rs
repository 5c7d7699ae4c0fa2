// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # glove-store
//!
//! SQLite storage backend for `glove-core`.
//!
//! This crate provides [`SqliteStore`], a single-file relational
//! implementation of the [`Store`](glove_core::Store) trait covering the
//! three durable tables of the shell: settings, approval requests, and the
//! append-only audit log.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glove_store::SqliteStore;
//! use glove_core::{ApprovalShell, PolicyEngine, PolicyDocument, ShellConfig};
//!
//! let store = SqliteStore::open("/var/lib/glove/glove.db")
//!     .expect("failed to open database");
//!
//! let policy = PolicyEngine::new(PolicyDocument::default());
//! let shell = ApprovalShell::new(ShellConfig::default(), policy, store);
//! ```

pub mod storage;

pub use storage::sqlite::SqliteStore;
