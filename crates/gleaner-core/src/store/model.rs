//! Persisted store payload and its legacy migration.

use crate::article::{Article, UNKNOWN_ACCOUNT};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The current on-disk shape: `{ "account": ..., "articles": [...] }`.
///
/// Each article is a pipe-joined `title|url|date` literal, kept for
/// compatibility with data written by earlier versions of the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePayload {
    pub account: String,
    pub articles: Vec<String>,
}

impl StorePayload {
    pub fn empty() -> Self {
        Self {
            account: UNKNOWN_ACCOUNT.to_string(),
            articles: Vec::new(),
        }
    }
}

/// Everything an on-disk payload may look like.
///
/// Early versions persisted a bare array of wire literals with no wrapping
/// object; those must still load. Only the current shape is ever written
/// back.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedPayload {
    Current(StorePayload),
    Legacy(Vec<String>),
}

/// Upgrades a loaded payload to the current shape.
///
/// Read-time only: the upgraded form is not written back until the next
/// save.
pub fn migrate(payload: PersistedPayload) -> StorePayload {
    match payload {
        PersistedPayload::Current(payload) => payload,
        PersistedPayload::Legacy(articles) => {
            debug!(
                count = articles.len(),
                "migrating legacy bare-array store payload"
            );
            StorePayload {
                account: UNKNOWN_ACCOUNT.to_string(),
                articles,
            }
        }
    }
}

/// Upgrades a payload to the current shape in place and hands out its
/// mutable interior, for read-modify-write under the file lock.
pub fn upgrade_in_place(payload: &mut PersistedPayload) -> &mut StorePayload {
    if let PersistedPayload::Legacy(articles) = payload {
        debug!(
            count = articles.len(),
            "migrating legacy bare-array store payload"
        );
        *payload = PersistedPayload::Current(StorePayload {
            account: UNKNOWN_ACCOUNT.to_string(),
            articles: std::mem::take(articles),
        });
    }
    match payload {
        PersistedPayload::Current(current) => current,
        PersistedPayload::Legacy(_) => unreachable!("upgraded above"),
    }
}

/// A typed view of the store: the account label plus decoded articles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub account: String,
    pub articles: Vec<Article>,
}

impl StoreSnapshot {
    pub fn empty() -> Self {
        Self {
            account: UNKNOWN_ACCOUNT.to_string(),
            articles: Vec::new(),
        }
    }

    /// Decodes a payload's wire literals, dropping undecodable entries
    /// with a warning. Order is preserved.
    pub fn from_payload(payload: StorePayload) -> Self {
        let mut articles = Vec::with_capacity(payload.articles.len());
        for encoded in &payload.articles {
            match Article::from_wire(encoded) {
                Ok(article) => articles.push(article),
                Err(e) => warn!(entry = %encoded, error = %e, "skipping undecodable store entry"),
            }
        }
        Self {
            account: payload.account,
            articles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_array_migrates_to_unknown_account() {
        let payload: PersistedPayload =
            serde_json::from_str(r#"["A|u1|2024-01-01"]"#).unwrap();
        let migrated = migrate(payload);
        assert_eq!(migrated.account, UNKNOWN_ACCOUNT);
        assert_eq!(migrated.articles, vec!["A|u1|2024-01-01".to_string()]);
    }

    #[test]
    fn current_shape_passes_through() {
        let payload: PersistedPayload =
            serde_json::from_str(r#"{"account":"acme","articles":["A|u1|2024-01-01"]}"#).unwrap();
        let migrated = migrate(payload);
        assert_eq!(migrated.account, "acme");
        assert_eq!(migrated.articles.len(), 1);
    }

    #[test]
    fn in_place_upgrade_keeps_entries_and_allows_edits() {
        let mut payload: PersistedPayload = serde_json::from_str(r#"["A|u1|2024-01-01"]"#).unwrap();
        let current = upgrade_in_place(&mut payload);
        assert_eq!(current.account, UNKNOWN_ACCOUNT);
        current.articles.push("B|u2|2024-01-02".to_string());
        assert_eq!(migrate(payload).articles.len(), 2);
    }

    #[test]
    fn snapshot_skips_undecodable_entries() {
        let payload = StorePayload {
            account: "acme".to_string(),
            articles: vec![
                "A|u1|2024-01-01".to_string(),
                "broken".to_string(),
                "B|u2|2024-01-02".to_string(),
            ],
        };
        let snapshot = StoreSnapshot::from_payload(payload);
        assert_eq!(snapshot.articles.len(), 2);
        assert_eq!(snapshot.articles[0].title, "A");
        assert_eq!(snapshot.articles[1].title, "B");
    }
}
