// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Risk-keyword triage.
//!
//! Operators configure a list of keywords; any request whose action, target,
//! or metadata contains one of them (case-insensitive substring) escalates
//! straight to `require_pin` before the policy engine is consulted.  The
//! haystack is `"{action}\n{target}\n{canonical_json(metadata)}"`, lowercased,
//! so metadata values participate in exactly their canonical rendering.

use crate::canon::canonical_map;
use crate::types::Metadata;

/// Keywords longer than this are dropped during normalisation.
pub const MAX_KEYWORD_LEN: usize = 64;

/// Normalise a raw keyword list: trim, lowercase, drop empties and
/// over-length entries, de-duplicate.  Insertion order of the first
/// occurrence is preserved, which fixes the first-match-wins order.
pub fn normalize_keywords<I>(raw: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for item in raw {
        let keyword = item.as_ref().trim().to_lowercase();
        if keyword.is_empty() || keyword.chars().count() > MAX_KEYWORD_LEN {
            continue;
        }
        if out.iter().any(|existing| existing == &keyword) {
            continue;
        }
        out.push(keyword);
    }
    out
}

/// Return the first keyword (in normalised-list order) found in the request
/// haystack, or `None`.  Keywords are assumed already normalised.
pub fn match_keyword<'a>(
    keywords: &'a [String],
    action: &str,
    target: &str,
    metadata: &Metadata,
) -> Option<&'a str> {
    if keywords.is_empty() {
        return None;
    }
    let haystack =
        format!("{}\n{}\n{}", action, target, canonical_map(metadata)).to_lowercase();
    keywords
        .iter()
        .find(|keyword| haystack.contains(keyword.as_str()))
        .map(String::as_str)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> Metadata {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }

    #[test]
    fn test_normalize_trims_lowercases_and_dedups() {
        let normalized = normalize_keywords(["  Delete ", "drop", "DELETE", "", "drop"]);
        assert_eq!(normalized, vec!["delete".to_string(), "drop".to_string()]);
    }

    #[test]
    fn test_normalize_drops_over_length_keywords() {
        let long = "x".repeat(MAX_KEYWORD_LEN + 1);
        let ok = "y".repeat(MAX_KEYWORD_LEN);
        assert_eq!(normalize_keywords([long, ok.clone()]), vec![ok]);
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let keywords = normalize_keywords(["secret"]);
        let hit = match_keyword(&keywords, "fs.read", "/app/SECRETS/db", &Metadata::new());
        assert_eq!(hit, Some("secret"));
    }

    #[test]
    fn test_first_keyword_in_list_order_wins() {
        let keywords = normalize_keywords(["target", "action"]);
        // Both keywords appear in the haystack; the earlier list entry wins.
        let hit = match_keyword(&keywords, "action.run", "target-host", &Metadata::new());
        assert_eq!(hit, Some("target"));
    }

    #[test]
    fn test_metadata_values_are_searched_canonically() {
        let keywords = normalize_keywords(["prod-db"]);
        let md = metadata(json!({"env": {"cluster": "Prod-DB"}}));
        assert_eq!(
            match_keyword(&keywords, "db.query", "analytics", &md),
            Some("prod-db")
        );
    }

    #[test]
    fn test_no_match_returns_none() {
        let keywords = normalize_keywords(["wipe"]);
        assert!(match_keyword(&keywords, "fs.read", "notes", &Metadata::new()).is_none());
    }

    #[test]
    fn test_empty_keyword_list_short_circuits() {
        assert!(match_keyword(&[], "anything", "anywhere", &Metadata::new()).is_none());
    }
}
