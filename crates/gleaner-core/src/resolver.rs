//! Account label resolution.

use crate::article::UNKNOWN_ACCOUNT;
use crate::source::SourceAdapter;
use crate::store::ArticleStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Resolves the source's display name with a bounded wait and keeps the
/// persisted store label in sync with it.
///
/// The cache is seeded from the store so a front end can show the
/// last-known account before the source has rendered anything.
pub struct AccountResolver {
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<ArticleStore>,
    deadline: Duration,
    cached: Mutex<String>,
    name_tx: watch::Sender<String>,
}

impl AccountResolver {
    pub fn new(adapter: Arc<dyn SourceAdapter>, store: Arc<ArticleStore>, deadline: Duration) -> Self {
        let initial = store.account();
        let (name_tx, _) = watch::channel(initial.clone());
        Self {
            adapter,
            store,
            deadline,
            cached: Mutex::new(initial),
            name_tx,
        }
    }

    /// Subscribes to account name changes (the display collaborator seam).
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.name_tx.subscribe()
    }

    /// The last-known resolved name.
    pub fn current(&self) -> String {
        self.cached.lock().unwrap().clone()
    }

    /// Reads the account label, racing the adapter against the deadline.
    ///
    /// An absent surface, an empty label, or a deadline win all yield the
    /// `"unknown"` fallback. Pure read; no side effects.
    pub async fn resolve_name(&self) -> String {
        match timeout(self.deadline, self.adapter.account_label()).await {
            Ok(Some(label)) if !label.trim().is_empty() => label.trim().to_string(),
            Ok(_) => UNKNOWN_ACCOUNT.to_string(),
            Err(_) => {
                warn!(deadline_ms = self.deadline.as_millis() as u64, "account label read timed out");
                UNKNOWN_ACCOUNT.to_string()
            }
        }
    }

    /// Resolves the name and, if it changed, updates the cache, notifies
    /// subscribers, and persists the new label into the store alongside
    /// the existing records.
    pub async fn refresh_if_changed(&self) {
        let name = self.resolve_name().await;
        {
            let mut cached = self.cached.lock().unwrap();
            if *cached == name {
                return;
            }
            debug!(from = %cached, to = %name, "account name changed");
            *cached = name.clone();
        }
        let _ = self.name_tx.send(name.clone());

        // Locked relabel: a collection run appending pages concurrently
        // must not have its records overwritten by a stale snapshot.
        self.store.relabel(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Article;
    use crate::source::{ScriptedPage, ScriptedSource};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> Arc<ArticleStore> {
        Arc::new(ArticleStore::new(dir.path().join("store.json")))
    }

    #[tokio::test]
    async fn resolves_present_label() {
        let dir = TempDir::new().unwrap();
        let adapter = Arc::new(ScriptedSource::new(vec![]).with_account("acme"));
        let resolver = AccountResolver::new(adapter, store_in(&dir), Duration::from_millis(1000));
        assert_eq!(resolver.resolve_name().await, "acme");
    }

    #[tokio::test]
    async fn absent_label_falls_back_to_unknown() {
        let dir = TempDir::new().unwrap();
        let adapter = Arc::new(ScriptedSource::new(vec![]));
        let resolver = AccountResolver::new(adapter, store_in(&dir), Duration::from_millis(1000));
        assert_eq!(resolver.resolve_name().await, UNKNOWN_ACCOUNT);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_wins_the_race() {
        let dir = TempDir::new().unwrap();
        let adapter = Arc::new(
            ScriptedSource::new(vec![ScriptedPage::default()])
                .with_account("slow")
                .with_label_delay(Duration::from_secs(5)),
        );
        let resolver = AccountResolver::new(adapter, store_in(&dir), Duration::from_millis(1000));
        assert_eq!(resolver.resolve_name().await, UNKNOWN_ACCOUNT);
    }

    #[tokio::test]
    async fn refresh_persists_new_label_with_existing_records() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let records = vec![Article::new("A", "u1", "2024-01-01").unwrap()];
        assert!(store.save(&records, UNKNOWN_ACCOUNT));

        let adapter = Arc::new(ScriptedSource::new(vec![]).with_account("acme"));
        let resolver = AccountResolver::new(adapter, store.clone(), Duration::from_millis(1000));
        let mut names = resolver.subscribe();

        resolver.refresh_if_changed().await;

        let snapshot = store.load();
        assert_eq!(snapshot.account, "acme");
        assert_eq!(snapshot.articles, records);
        assert!(names.has_changed().unwrap());
        assert_eq!(*names.borrow_and_update(), "acme");
    }

    #[tokio::test]
    async fn refresh_is_a_no_op_when_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.save(&[], "acme"));

        let adapter = Arc::new(ScriptedSource::new(vec![]).with_account("acme"));
        let resolver = AccountResolver::new(adapter, store.clone(), Duration::from_millis(1000));
        let mut names = resolver.subscribe();

        resolver.refresh_if_changed().await;

        assert!(!names.has_changed().unwrap());
        assert_eq!(resolver.current(), "acme");
    }
}
