// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Signed-extension installer.
//!
//! Admission pipeline for extension zip bundles:
//!
//! 1. size cap (strict: a blob at the cap is rejected);
//! 2. publisher signature, when required by configuration;
//! 3. unpack into a fresh temp directory, refusing any member whose path
//!    would escape it (Zip-Slip defense);
//! 4. exactly one `glove-extension.json` in the tree;
//! 5. extension id = manifest's parent directory name, restricted to
//!    `[A-Za-z0-9._-]`;
//! 6. replace-or-fail against the destination, then recursive copy.
//!
//! The destination swap (remove + copy) is not transactional: a crash
//! mid-swap leaves the extension unusable but not unsafe.  Concurrent
//! installs of the same id are not supported.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

use crate::config::Settings;
use crate::notifier::MANIFEST_NAME;
use glove_core::trust::{SignatureError, TrustStore};

/// Default zip admission cap: 25 MiB.
pub const MAX_ZIP_BYTES: usize = 25 * 1024 * 1024;

/// Classified installer failures.  The `Display` form is the machine-readable
/// error kind surfaced in HTTP `detail` fields.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("zip_too_large")]
    ZipTooLarge,
    #[error("signature_required")]
    SignatureRequired,
    #[error("signature_invalid: {0}")]
    SignatureInvalid(SignatureError),
    #[error("invalid_zip_archive: {0}")]
    BadArchive(String),
    #[error("invalid_zip_paths")]
    InvalidZipPaths,
    #[error("zip_must_contain_one_extension_manifest")]
    ManifestCount,
    #[error("invalid_extension_id")]
    InvalidExtensionId,
    #[error("invalid_extension_id_chars")]
    InvalidExtensionIdChars,
    #[error("extension_exists")]
    ExtensionExists,
    #[error("install failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Installs extension bundles under the configured extensions root.
pub struct Installer {
    extensions_root: PathBuf,
    trust_store_path: PathBuf,
    require_signatures: bool,
    max_zip_bytes: usize,
}

impl Installer {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            extensions_root: PathBuf::from(&settings.clawhub_extensions_dir),
            trust_store_path: PathBuf::from(&settings.clawhub_trust_store_path),
            require_signatures: settings.require_extension_signatures,
            max_zip_bytes: MAX_ZIP_BYTES,
        }
    }

    /// Admit, verify, unpack, and install one zip bundle.  Returns the
    /// extension id.  The temp directory is removed on every exit path.
    pub fn install_from_zip(
        &self,
        zip_bytes: &[u8],
        replace_existing: bool,
        key_id: Option<&str>,
        signature_b64: Option<&str>,
    ) -> Result<String, InstallError> {
        if zip_bytes.len() >= self.max_zip_bytes {
            return Err(InstallError::ZipTooLarge);
        }

        if self.require_signatures {
            let (key_id, signature_b64) = match (key_id, signature_b64) {
                (Some(key_id), Some(signature_b64))
                    if !key_id.is_empty() && !signature_b64.is_empty() =>
                {
                    (key_id, signature_b64)
                }
                _ => return Err(InstallError::SignatureRequired),
            };
            let trust_store = TrustStore::load(&self.trust_store_path)
                .map_err(InstallError::SignatureInvalid)?;
            trust_store
                .verify_zip_signature(zip_bytes, key_id, signature_b64)
                .map_err(InstallError::SignatureInvalid)?;
        }

        fs::create_dir_all(&self.extensions_root)?;

        let staging = tempfile::Builder::new().prefix("glove-ext-").tempdir()?;
        unpack_zip(zip_bytes, staging.path())?;

        let manifests = find_manifests(staging.path())?;
        if manifests.len() != 1 {
            return Err(InstallError::ManifestCount);
        }
        let manifest_dir = manifests[0]
            .parent()
            .ok_or(InstallError::InvalidExtensionId)?;

        let extension_id = manifest_dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if extension_id.is_empty() {
            return Err(InstallError::InvalidExtensionId);
        }
        if !extension_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        {
            return Err(InstallError::InvalidExtensionIdChars);
        }

        let target_dir = self.extensions_root.join(&extension_id);
        if target_dir.exists() {
            if !replace_existing {
                return Err(InstallError::ExtensionExists);
            }
            fs::remove_dir_all(&target_dir)?;
        }
        copy_tree(manifest_dir, &target_dir)?;

        Ok(extension_id)
    }
}

/// Extract every file member under `staging`, rejecting path escapes.
/// Directory entries are skipped; parent directories are created as needed.
fn unpack_zip(zip_bytes: &[u8], staging: &Path) -> Result<(), InstallError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|error| InstallError::BadArchive(error.to_string()))?;

    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|error| InstallError::BadArchive(error.to_string()))?;
        if member.is_dir() {
            continue;
        }
        // enclosed_name refuses absolute paths and any `..` traversal.
        let relative = member
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or(InstallError::InvalidZipPaths)?;
        let destination = staging.join(&relative);
        if !destination.starts_with(staging) {
            return Err(InstallError::InvalidZipPaths);
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut contents = Vec::new();
        member.read_to_end(&mut contents)?;
        fs::write(&destination, contents)?;
    }
    Ok(())
}

/// Every `glove-extension.json` in the tree, in directory-walk order.
fn find_manifests(root: &Path) -> Result<Vec<PathBuf>, InstallError> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for child in fs::read_dir(&dir)? {
            let path = child?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().is_some_and(|name| name == MANIFEST_NAME) {
                found.push(path);
            }
        }
    }
    Ok(found)
}

fn copy_tree(source: &Path, destination: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(destination)?;
    for child in fs::read_dir(source)? {
        let child = child?;
        let from = child.path();
        let to = destination.join(child.file_name());
        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
