//! Readiness watching.
//!
//! Translates raw structural change events from the source into a
//! debounced readiness signal. Two regions are watched independently: the
//! dialog region (whose appearance triggers an account refresh and arms
//! the list watch) and the list region (whose changes drive readiness
//! recomputation).

use crate::resolver::AccountResolver;
use crate::source::{MutationEvent, MutationKind, SourceAdapter, WatchRegion};
use crate::store::ArticleStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Whether collection may currently be started, and whether anything has
/// been stored so far. The sole input a front end uses to enable its
/// start/export affordances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub has_items: bool,
    pub has_stored: bool,
}

/// Watches the dialog and list regions and publishes [`Readiness`].
///
/// Both watches use trailing debounce: a burst of events within the
/// window collapses into exactly one evaluation after the window closes,
/// with no leading-edge evaluation. The list watch is re-armed on every
/// dialog evaluation; the previous list task is aborted first so a
/// re-rendered dialog cannot leave two watchers emitting duplicate
/// signals.
#[derive(Clone)]
pub struct ReadinessWatcher {
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<ArticleStore>,
    resolver: Arc<AccountResolver>,
    dialog_debounce: Duration,
    list_debounce: Duration,
    readiness_tx: watch::Sender<Readiness>,
    dialog_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    list_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ReadinessWatcher {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<ArticleStore>,
        resolver: Arc<AccountResolver>,
        dialog_debounce: Duration,
        list_debounce: Duration,
    ) -> Self {
        let (readiness_tx, _) = watch::channel(Readiness::default());
        Self {
            adapter,
            store,
            resolver,
            dialog_debounce,
            list_debounce,
            readiness_tx,
            dialog_task: Arc::new(Mutex::new(None)),
            list_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribes to readiness updates.
    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.readiness_tx.subscribe()
    }

    /// Starts the dialog watch.
    ///
    /// One synthetic burst is scheduled immediately so that a dialog
    /// already on screen when the watcher starts is still detected.
    pub fn start(&self) {
        // Abort the previous watch before its replacement spawns, so two
        // dialog loops never observe concurrently.
        if let Some(previous) = self.dialog_task.lock().unwrap().take() {
            previous.abort();
        }
        let rx = self.adapter.changes();
        let watcher = self.clone();
        let handle = tokio::spawn(async move { watcher.dialog_loop(rx).await });
        *self.dialog_task.lock().unwrap() = Some(handle);
    }

    /// Stops observing. No evaluation runs after this returns.
    pub fn shutdown(&self) {
        if let Some(task) = self.dialog_task.lock().unwrap().take() {
            task.abort();
        }
        if let Some(task) = self.list_task.lock().unwrap().take() {
            task.abort();
        }
    }

    async fn dialog_loop(self, mut rx: mpsc::UnboundedReceiver<MutationEvent>) {
        // Synthetic initial burst: evaluate once even with no events.
        let mut deadline = Some(Instant::now() + self.dialog_debounce);
        loop {
            match deadline {
                Some(at) => tokio::select! {
                    event = rx.recv() => match event {
                        Some(e) if is_dialog_insert(&e) => {
                            deadline = Some(Instant::now() + self.dialog_debounce);
                        }
                        Some(_) => {}
                        None => break,
                    },
                    _ = sleep_until(at) => {
                        deadline = None;
                        self.evaluate_dialog().await;
                    }
                },
                None => match rx.recv().await {
                    Some(e) if is_dialog_insert(&e) => {
                        deadline = Some(Instant::now() + self.dialog_debounce);
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }
    }

    async fn evaluate_dialog(&self) {
        if !self.adapter.dialog_present().await {
            return;
        }
        debug!("dialog present, refreshing account and arming list watch");
        self.resolver.refresh_if_changed().await;
        self.arm_list();
    }

    fn arm_list(&self) {
        // Same ordering as `start`: the old list watch is gone before the
        // new one exists.
        if let Some(previous) = self.list_task.lock().unwrap().take() {
            previous.abort();
        }
        let rx = self.adapter.changes();
        let watcher = self.clone();
        let handle = tokio::spawn(async move { watcher.list_loop(rx).await });
        *self.list_task.lock().unwrap() = Some(handle);
    }

    async fn list_loop(self, mut rx: mpsc::UnboundedReceiver<MutationEvent>) {
        // One immediate evaluation on arm, before any events arrive.
        self.evaluate_readiness().await;
        let mut deadline: Option<Instant> = None;
        loop {
            match deadline {
                Some(at) => tokio::select! {
                    event = rx.recv() => match event {
                        Some(e) if e.region == WatchRegion::List => {
                            deadline = Some(Instant::now() + self.list_debounce);
                        }
                        Some(_) => {}
                        None => break,
                    },
                    _ = sleep_until(at) => {
                        deadline = None;
                        self.evaluate_readiness().await;
                    }
                },
                None => match rx.recv().await {
                    Some(e) if e.region == WatchRegion::List => {
                        deadline = Some(Instant::now() + self.list_debounce);
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }
    }

    async fn evaluate_readiness(&self) {
        let readiness = Readiness {
            has_items: !self.adapter.list_items().await.is_empty(),
            has_stored: !self.store.articles().is_empty(),
        };
        self.readiness_tx.send_replace(readiness);
    }
}

fn is_dialog_insert(event: &MutationEvent) -> bool {
    event.region == WatchRegion::Dialog && event.kind == MutationKind::Insert
}
