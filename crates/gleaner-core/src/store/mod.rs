//! Durable article store.
//!
//! A single JSON file holds every collected article plus the account label
//! they were collected under. The store is deliberately forgiving: reads
//! never fail outward and writes report failure as a boolean, because the
//! collector must keep running on a half-broken host rather than halt it.

mod file;
mod model;

pub use model::{StorePayload, StoreSnapshot};

use crate::article::{Article, UNKNOWN_ACCOUNT};
use crate::error::{HarvestError, Result};
use file::AtomicJsonFile;
use model::PersistedPayload;
use std::path::Path;
use tracing::{error, warn};

/// File name of the persisted store under its base directory.
const STORE_FILE_NAME: &str = "collected_articles.json";

/// File-backed store for harvested articles.
///
/// The store is a single global file not partitioned by account: switching
/// sources mid-use merges records under the new label. Known limitation,
/// kept for compatibility with existing data; writes that relabel a
/// non-empty store warn when it happens.
///
/// Every write is a read-modify-write under an exclusive file lock, so
/// interleaved writers (a collection run appending pages while the account
/// re-check relabels) cannot lose records.
pub struct ArticleStore {
    file: AtomicJsonFile<PersistedPayload>,
}

impl ArticleStore {
    /// Creates a store backed by the given file path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            file: AtomicJsonFile::new(path.as_ref().to_path_buf()),
        }
    }

    /// Creates a store at the default location (`~/.gleaner`).
    pub fn default_location() -> Result<Self> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| HarvestError::config("failed to get home directory"))?;
        Ok(Self::new(home_dir.join(".gleaner").join(STORE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Loads the store.
    ///
    /// Never fails outward: a missing file yields the empty default, and a
    /// corrupt or unreadable one is logged and also yields the default.
    /// Legacy bare-array payloads are upgraded on read.
    pub fn load(&self) -> StoreSnapshot {
        let raw: Option<PersistedPayload> = match self.file.load() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path().display(), error = %e, "store unreadable, using empty default");
                return StoreSnapshot::empty();
            }
        };
        match raw {
            Some(payload) => StoreSnapshot::from_payload(model::migrate(payload)),
            None => StoreSnapshot::empty(),
        }
    }

    /// Overwrites the persisted payload with the given articles and label.
    ///
    /// Full overwrite rather than record-level upsert: an atomic rewrite
    /// cannot leave a partially written payload behind. Returns `false`
    /// on any write error, leaving the prior on-disk content unchanged.
    pub fn save(&self, articles: &[Article], account: &str) -> bool {
        let next = StorePayload {
            account: account.to_string(),
            articles: articles.iter().map(Article::to_wire).collect(),
        };
        self.write("save", move |payload| {
            warn_on_relabel(payload, &next.account);
            *payload = PersistedPayload::Current(next);
        })
    }

    /// Appends articles to the persisted payload, keeping its label.
    ///
    /// The load, extend, and save happen under the store's file lock, so a
    /// concurrent relabel or save cannot interleave and drop records.
    pub fn append(&self, articles: &[Article]) -> bool {
        let encoded: Vec<String> = articles.iter().map(Article::to_wire).collect();
        self.write("append", move |payload| {
            model::upgrade_in_place(payload).articles.extend(encoded);
        })
    }

    /// Rewrites the persisted payload under a new account label, keeping
    /// its articles. Locked like [`ArticleStore::append`].
    pub fn relabel(&self, account: &str) -> bool {
        let account = account.to_string();
        self.write("relabel", move |payload| {
            warn_on_relabel(payload, &account);
            model::upgrade_in_place(payload).account = account;
        })
    }

    fn write(&self, op: &str, f: impl FnOnce(&mut PersistedPayload)) -> bool {
        let default = PersistedPayload::Current(StorePayload::empty());
        match self.file.update(default, f) {
            Ok(()) => true,
            Err(e) => {
                error!(path = %self.path().display(), error = %e, op, "store write failed");
                false
            }
        }
    }

    /// Removes the persisted file. Returns `true` on success; an absent
    /// file counts as success.
    pub fn clear(&self) -> bool {
        match self.file.remove() {
            Ok(()) => true,
            Err(e) => {
                error!(path = %self.path().display(), error = %e, "store clear failed");
                false
            }
        }
    }

    /// Convenience projection of `load().articles`.
    pub fn articles(&self) -> Vec<Article> {
        self.load().articles
    }

    /// Convenience projection of `load().account`.
    pub fn account(&self) -> String {
        self.load().account
    }
}

fn warn_on_relabel(previous: &PersistedPayload, account: &str) {
    let (from, records) = match previous {
        PersistedPayload::Current(payload) => (payload.account.as_str(), payload.articles.len()),
        PersistedPayload::Legacy(articles) => (UNKNOWN_ACCOUNT, articles.len()),
    };
    if from != account && records > 0 {
        warn!(
            from = %from,
            to = %account,
            records,
            "relabeling a non-empty store; existing records merge under the new account"
        );
    }
}
