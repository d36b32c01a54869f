//! A scripted in-memory source.
//!
//! Plays back a fixed sequence of pages, standing in for a live rendered
//! surface. Used by the unit tests and the CLI's fixture runner.

use super::adapter::{
    MutationEvent, MutationKind, PageInfo, RawItem, SourceAdapter, WatchRegion,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted page: its items and an optional rendered indicator text.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    pub items: Vec<RawItem>,
    pub indicator: Option<String>,
}

impl ScriptedPage {
    pub fn new(items: Vec<RawItem>) -> Self {
        Self {
            items,
            indicator: None,
        }
    }

    pub fn with_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.indicator = Some(indicator.into());
        self
    }
}

struct Inner {
    pages: Vec<ScriptedPage>,
    index: usize,
    dialog_present: bool,
    account: Option<String>,
    paginated: bool,
}

/// Scripted [`SourceAdapter`] implementation.
///
/// Advancing past the last page leaves the source on an empty page, which
/// a correct engine never reaches because `has_next_page` turns false on
/// the last scripted page. The list-read counter exists for debounce
/// tests: each readiness evaluation reads the list exactly once.
pub struct ScriptedSource {
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<MutationEvent>>>,
    list_reads: AtomicUsize,
    label_delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pages,
                index: 0,
                dialog_present: false,
                account: None,
                paginated: true,
            }),
            subscribers: Mutex::new(Vec::new()),
            list_reads: AtomicUsize::new(0),
            label_delay: None,
        }
    }

    pub fn with_account(self, account: impl Into<String>) -> Self {
        self.inner.lock().unwrap().account = Some(account.into());
        self
    }

    pub fn with_dialog_present(self, present: bool) -> Self {
        self.inner.lock().unwrap().dialog_present = present;
        self
    }

    /// Delays every `account_label` read, for resolver deadline tests.
    pub fn with_label_delay(mut self, delay: Duration) -> Self {
        self.label_delay = Some(delay);
        self
    }

    /// Drops the pagination indicator entirely (structural absence).
    pub fn without_pagination(self) -> Self {
        self.inner.lock().unwrap().paginated = false;
        self
    }

    /// Shows or hides the dialog region without emitting events.
    pub fn set_dialog_present(&self, present: bool) {
        self.inner.lock().unwrap().dialog_present = present;
    }

    /// Replaces the scripted account label.
    pub fn set_account(&self, account: Option<String>) {
        self.inner.lock().unwrap().account = account;
    }

    /// Fans a structural change event out to every live subscriber.
    pub fn emit(&self, region: WatchRegion, kind: MutationKind) {
        let event = MutationEvent { region, kind };
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event).is_ok());
    }

    /// How many times the list has been read so far.
    pub fn list_reads(&self) -> usize {
        self.list_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    async fn list_items(&self) -> Vec<RawItem> {
        self.list_reads.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().unwrap();
        inner
            .pages
            .get(inner.index)
            .map(|page| page.items.clone())
            .unwrap_or_default()
    }

    async fn pagination_info(&self) -> Option<PageInfo> {
        let inner = self.inner.lock().unwrap();
        if !inner.paginated || inner.pages.is_empty() {
            return None;
        }
        match inner.pages.get(inner.index).and_then(|p| p.indicator.as_deref()) {
            Some(text) => PageInfo::parse(text),
            None => Some(PageInfo {
                current: (inner.index + 1) as u32,
                total: inner.pages.len() as u32,
            }),
        }
    }

    async fn has_next_page(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.index + 1 < inner.pages.len()
    }

    async fn advance_to_next_page(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.index < inner.pages.len() {
            inner.index += 1;
        }
    }

    async fn account_label(&self) -> Option<String> {
        if let Some(delay) = self.label_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.lock().unwrap().account.clone()
    }

    async fn dialog_present(&self) -> bool {
        self.inner.lock().unwrap().dialog_present
    }

    fn changes(&self) -> mpsc::UnboundedReceiver<MutationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}
