// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Bearer-key bootstrap.
//!
//! The agent and admin keys are process-scoped bearer secrets.  Resolution
//! order at startup: a non-empty environment variable wins; otherwise the
//! persisted settings row; otherwise a fresh 24-byte key is minted and
//! persisted so it survives restarts.  Comparison is constant-time.

use glove_core::secrets::{constant_time_eq, new_bearer_key};
use glove_core::storage::{settings, Store, StoreError};

/// The resolved process-scoped bearer secrets.
#[derive(Debug, Clone)]
pub struct BearerKeys {
    pub agent_key: String,
    pub admin_key: String,
}

impl BearerKeys {
    /// Resolve both keys against the environment and the store.
    pub fn bootstrap<S: Store>(store: &S) -> Result<Self, StoreError> {
        Ok(Self {
            agent_key: resolve(store, "GLOVE_AGENT_KEY", settings::AGENT_KEY)?,
            admin_key: resolve(store, "GLOVE_ADMIN_KEY", settings::ADMIN_KEY)?,
        })
    }

    /// Constant-time check of a presented agent key.
    pub fn agent_key_matches(&self, presented: &str) -> bool {
        constant_time_eq(presented, &self.agent_key)
    }

    /// Constant-time check of a presented admin key.
    pub fn admin_key_matches(&self, presented: &str) -> bool {
        constant_time_eq(presented, &self.admin_key)
    }

    /// Last 8 characters of the agent key, for health output and logs.
    pub fn agent_key_tail(&self) -> &str {
        tail(&self.agent_key)
    }

    /// Last 8 characters of the admin key, for health output and logs.
    pub fn admin_key_tail(&self) -> &str {
        tail(&self.admin_key)
    }
}

fn resolve<S: Store>(store: &S, env_var: &str, setting_key: &str) -> Result<String, StoreError> {
    if let Ok(value) = std::env::var(env_var) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.into());
        }
    }
    if let Some(existing) = store.get_setting(setting_key)? {
        return Ok(existing);
    }
    let minted = new_bearer_key();
    store.set_setting(setting_key, &minted)?;
    Ok(minted)
}

/// Keys are URL-safe base64, so byte slicing never splits a character.
fn tail(key: &str) -> &str {
    &key[key.len().saturating_sub(8)..]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glove_core::storage::InMemoryStore;

    #[test]
    fn test_minted_keys_persist_across_bootstraps() {
        let store = InMemoryStore::new();
        let first = BearerKeys::bootstrap(&store).unwrap();
        let second = BearerKeys::bootstrap(&store).unwrap();
        assert_eq!(first.agent_key, second.agent_key);
        assert_eq!(first.admin_key, second.admin_key);
        assert_ne!(first.agent_key, first.admin_key);
    }

    #[test]
    fn test_settings_row_is_authoritative_without_env() {
        let store = InMemoryStore::new();
        store.set_setting(settings::AGENT_KEY, "agent-from-store").unwrap();
        let keys = BearerKeys::bootstrap(&store).unwrap();
        assert_eq!(keys.agent_key, "agent-from-store");
        assert_eq!(keys.agent_key_tail(), "om-store");
    }

    #[test]
    fn test_matching_is_exact() {
        let keys = BearerKeys {
            agent_key: "agent-secret".into(),
            admin_key: "admin-secret".into(),
        };
        assert!(keys.agent_key_matches("agent-secret"));
        assert!(!keys.agent_key_matches("agent-secret-x"));
        assert!(!keys.admin_key_matches("agent-secret"));
    }

    #[test]
    fn test_tail_handles_short_keys() {
        let keys = BearerKeys {
            agent_key: "abc".into(),
            admin_key: "longer-than-eight".into(),
        };
        assert_eq!(keys.agent_key_tail(), "abc");
        assert_eq!(keys.admin_key_tail(), "an-eight");
    }
}
