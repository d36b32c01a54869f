//! Wiring of the harvesting components.

use crate::config::HarvestConfig;
use crate::engine::CollectionEngine;
use crate::resolver::AccountResolver;
use crate::source::SourceAdapter;
use crate::store::ArticleStore;
use crate::watcher::ReadinessWatcher;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// Owns one wired harvesting pipeline: store, resolver, watcher, engine,
/// and the periodic account re-check.
///
/// Nothing here is a process-wide global; drop-in replacement adapters
/// and store paths make the whole pipeline testable. `shutdown` cancels
/// every owned task, so no timer or watcher callback fires after
/// teardown.
pub struct HarvestContext {
    pub store: Arc<ArticleStore>,
    pub resolver: Arc<AccountResolver>,
    pub watcher: Arc<ReadinessWatcher>,
    pub engine: Arc<CollectionEngine>,
    recheck_task: Mutex<Option<JoinHandle<()>>>,
}

impl HarvestContext {
    /// Wires the components and starts the background tasks: the dialog
    /// watch and the periodic account label re-check.
    pub fn start(
        adapter: Arc<dyn SourceAdapter>,
        store: ArticleStore,
        config: HarvestConfig,
    ) -> Arc<Self> {
        let store = Arc::new(store);
        let resolver = Arc::new(AccountResolver::new(
            adapter.clone(),
            store.clone(),
            config.label_deadline(),
        ));
        let watcher = Arc::new(ReadinessWatcher::new(
            adapter.clone(),
            store.clone(),
            resolver.clone(),
            config.dialog_debounce(),
            config.list_debounce(),
        ));
        let engine = Arc::new(CollectionEngine::new(
            adapter,
            store.clone(),
            config.clone(),
        ));

        watcher.start();

        let recheck_resolver = resolver.clone();
        let period = config.account_recheck();
        let recheck_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; the watcher's initial
            // dialog evaluation already covers startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                recheck_resolver.refresh_if_changed().await;
            }
        });

        Arc::new(Self {
            store,
            resolver,
            watcher,
            engine,
            recheck_task: Mutex::new(Some(recheck_task)),
        })
    }

    /// Stops the engine and cancels every owned background task.
    pub fn shutdown(&self) {
        debug!("harvest context shutting down");
        self.engine.stop();
        self.watcher.shutdown();
        if let Some(task) = self.recheck_task.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl Drop for HarvestContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
