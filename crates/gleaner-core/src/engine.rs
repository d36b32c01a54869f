//! The paginated collection engine.
//!
//! A run walks the rendered list one page at a time: scan the page,
//! append accepted records to the store, advance, wait, repeat. Every
//! wait races a cancellation token so a user stop takes effect at the
//! next suspension point rather than after the run completes.

use crate::article::Article;
use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::source::SourceAdapter;
use crate::store::ArticleStore;
use chrono::NaiveDate;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Engine lifecycle state.
///
/// `Stopped` and `Finished` are both re-startable; there is no error
/// terminal state. A run that hits trouble degrades to a smaller result
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Collecting,
    Stopped,
    Finished,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source was exhausted or the cutoff was reached.
    Finished,
    /// The user requested a stop mid-run.
    Stopped,
}

/// Transient per-run state. Dropped when the run ends; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub active: bool,
    pub current_page: u32,
    pub total_pages: u32,
    pub cutoff: Option<NaiveDate>,
}

impl Session {
    fn new(cutoff: Option<NaiveDate>) -> Self {
        Self {
            active: true,
            current_page: 1,
            total_pages: 1,
            cutoff,
        }
    }
}

/// Progress events emitted during a run, for status rendering.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// One page was scanned and its accepted records saved.
    PageCollected {
        page: u32,
        total_pages: u32,
        appended: usize,
    },
    /// The engine is waiting out the jittered inter-page delay.
    Waiting {
        page: u32,
        total_pages: u32,
        delay: Duration,
    },
    /// Terminal: the source was exhausted or the cutoff reached.
    Finished { total_records: usize },
    /// Terminal: the user stopped the run.
    Stopped { total_records: usize },
}

/// Summary of one run.
///
/// `total_records` is the store total after the run, not this run's
/// delta: interrupted and resumed runs report the same number the export
/// will contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub pages_scanned: usize,
    pub appended: usize,
    pub skipped_malformed: usize,
    pub total_records: usize,
    pub outcome: RunOutcome,
}

/// Draws the inter-page delay from `[min, max)`. Injectable so tests can
/// force deterministic delays.
pub type JitterFn = Arc<dyn Fn(Duration, Duration) -> Duration + Send + Sync>;

/// Uniform draw from `[min, max)`.
pub fn uniform_jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span_ms = (max - min).as_millis() as u64;
    // Sub-millisecond spans round down to an empty range.
    if span_ms == 0 {
        return min;
    }
    min + Duration::from_millis(rand::thread_rng().gen_range(0..span_ms))
}

/// The paginated harvesting state machine.
///
/// Cloning is cheap and shares all state; the run loop executes on a
/// clone so callers keep control of the original.
#[derive(Clone)]
pub struct CollectionEngine {
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<ArticleStore>,
    config: HarvestConfig,
    jitter: JitterFn,
    state: Arc<Mutex<EngineState>>,
    session: Arc<Mutex<Option<Session>>>,
    cancel: Arc<Mutex<Option<CancellationToken>>>,
    event_subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<EngineEvent>>>>,
}

impl CollectionEngine {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<ArticleStore>,
        config: HarvestConfig,
    ) -> Self {
        Self::with_jitter(adapter, store, config, Arc::new(uniform_jitter))
    }

    /// As [`CollectionEngine::new`], with an injected delay source.
    pub fn with_jitter(
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<ArticleStore>,
        config: HarvestConfig,
        jitter: JitterFn,
    ) -> Self {
        Self {
            adapter,
            store,
            config,
            jitter,
            state: Arc::new(Mutex::new(EngineState::Idle)),
            session: Arc::new(Mutex::new(None)),
            cancel: Arc::new(Mutex::new(None)),
            event_subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribes to progress events.
    pub fn events(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap()
    }

    /// Snapshot of the current run's session, if one is active.
    pub fn session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    /// Starts a collection run.
    ///
    /// Only one run may be active at a time; starting while `Collecting`
    /// is an error. The first iteration begins immediately. The returned
    /// handle resolves to the run's [`RunStats`].
    pub fn start(&self, cutoff: Option<NaiveDate>) -> Result<JoinHandle<RunStats>> {
        {
            let mut state = self.state.lock().unwrap();
            if *state == EngineState::Collecting {
                return Err(HarvestError::CollectionActive);
            }
            *state = EngineState::Collecting;
        }

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = Some(token.clone());
        *self.session.lock().unwrap() = Some(Session::new(cutoff));
        info!(?cutoff, "collection started");

        let engine = self.clone();
        Ok(tokio::spawn(async move { engine.run(token).await }))
    }

    /// Requests a stop.
    ///
    /// The run in flight re-checks at each suspension point and aborts
    /// without scheduling further iterations; at most one more step may
    /// complete after this returns. No-op outside a run.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().unwrap().as_ref() {
            token.cancel();
        }
        if let Some(session) = self.session.lock().unwrap().as_mut() {
            session.active = false;
        }
    }

    async fn run(self, token: CancellationToken) -> RunStats {
        let mut pages_scanned = 0;
        let mut appended_total = 0;
        let mut skipped_malformed = 0;

        let outcome = loop {
            if token.is_cancelled() {
                break RunOutcome::Stopped;
            }

            let items = self.adapter.list_items().await;
            if items.is_empty() {
                // Covers both an exhausted source and a missing list
                // container; neither is an error.
                debug!("no items rendered, finishing");
                break RunOutcome::Finished;
            }
            pages_scanned += 1;

            let cutoff = self
                .session
                .lock()
                .unwrap()
                .as_ref()
                .and_then(|s| s.cutoff);
            let scan = scan_page(&items, cutoff);
            skipped_malformed += scan.skipped_malformed;
            appended_total += scan.accepted.len();

            // Locked append: the periodic account re-check may relabel the
            // store while this run is writing pages.
            if !self.store.append(&scan.accepted) {
                // Prior on-disk content is still intact; only this page's
                // records are at risk.
                warn!("page append failed, continuing");
            }

            if token.is_cancelled() {
                break RunOutcome::Stopped;
            }
            if let Some(info) = self.adapter.pagination_info().await {
                if let Some(session) = self.session.lock().unwrap().as_mut() {
                    session.current_page = info.current;
                    session.total_pages = info.total;
                }
            }
            let (page, total_pages) = self.page_position();
            self.emit(EngineEvent::PageCollected {
                page,
                total_pages,
                appended: appended_total,
            });

            if scan.cutoff_reached || !self.adapter.has_next_page().await {
                break RunOutcome::Finished;
            }
            if token.is_cancelled() {
                break RunOutcome::Stopped;
            }

            let delay = (self.jitter)(self.config.page_delay_min(), self.config.page_delay_max());
            self.emit(EngineEvent::Waiting {
                page,
                total_pages,
                delay,
            });
            tokio::select! {
                _ = token.cancelled() => break RunOutcome::Stopped,
                _ = sleep(delay) => {}
            }

            self.adapter.advance_to_next_page().await;
            // Let the next page render before reading it.
            tokio::select! {
                _ = token.cancelled() => break RunOutcome::Stopped,
                _ = sleep(self.config.settle_delay()) => {}
            }
        };

        let total_records = self.store.articles().len();
        *self.session.lock().unwrap() = None;
        *self.cancel.lock().unwrap() = None;
        match outcome {
            RunOutcome::Finished => {
                *self.state.lock().unwrap() = EngineState::Finished;
                info!(total_records, pages_scanned, "collection finished");
                self.emit(EngineEvent::Finished { total_records });
            }
            RunOutcome::Stopped => {
                *self.state.lock().unwrap() = EngineState::Stopped;
                info!(total_records, pages_scanned, "collection stopped");
                self.emit(EngineEvent::Stopped { total_records });
            }
        }

        RunStats {
            pages_scanned,
            appended: appended_total,
            skipped_malformed,
            total_records,
            outcome,
        }
    }

    fn page_position(&self) -> (u32, u32) {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| (s.current_page, s.total_pages))
            .unwrap_or((1, 1))
    }

    fn emit(&self, event: EngineEvent) {
        self.event_subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct PageScan {
    accepted: Vec<Article>,
    skipped_malformed: usize,
    cutoff_reached: bool,
}

/// Scans one rendered page in order.
///
/// Malformed items are skipped without ending the scan. Items are
/// rendered newest-first, so the first one older than the cutoff ends
/// the scan of the page's remaining items.
fn scan_page(items: &[crate::source::RawItem], cutoff: Option<NaiveDate>) -> PageScan {
    let mut accepted = Vec::new();
    let mut skipped_malformed = 0;
    let mut cutoff_reached = false;

    for item in items {
        let (title, url, date_text) = match (&item.title, &item.url, &item.date_text) {
            (Some(t), Some(u), Some(d)) => (t, u, d),
            _ => {
                skipped_malformed += 1;
                continue;
            }
        };
        let article = match Article::new(title, url, date_text) {
            Ok(article) => article,
            Err(e) => {
                debug!(error = %e, "skipping malformed item");
                skipped_malformed += 1;
                continue;
            }
        };
        if let Some(cutoff) = cutoff {
            if article.published < cutoff {
                cutoff_reached = true;
                break;
            }
        }
        accepted.push(article);
    }

    PageScan {
        accepted,
        skipped_malformed,
        cutoff_reached,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{RawItem, ScriptedPage, ScriptedSource};
    use tempfile::TempDir;

    fn item(title: &str, date: &str) -> RawItem {
        RawItem::new(
            Some(title.to_string()),
            Some(format!("https://example.com/{title}")),
            Some(date.to_string()),
        )
    }

    fn zero_jitter() -> JitterFn {
        Arc::new(|_, _| Duration::ZERO)
    }

    fn fast_config() -> HarvestConfig {
        HarvestConfig {
            settle_delay_ms: 0,
            ..HarvestConfig::default()
        }
    }

    fn engine_over(source: Arc<ScriptedSource>, dir: &TempDir) -> Arc<CollectionEngine> {
        let store = Arc::new(ArticleStore::new(dir.path().join("store.json")));
        Arc::new(CollectionEngine::with_jitter(
            source,
            store,
            fast_config(),
            zero_jitter(),
        ))
    }

    fn date(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn harvests_every_page_in_rendered_order() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::new(vec![
                item("a", "2024-03-03"),
                item("b", "2024-03-02"),
                item("c", "2024-03-01"),
            ]),
            ScriptedPage::new(vec![
                item("d", "2024-02-03"),
                item("e", "2024-02-02"),
                item("f", "2024-02-01"),
            ]),
        ]));
        let engine = engine_over(source, &dir);

        let stats = engine.start(None).unwrap().await.unwrap();

        assert_eq!(stats.outcome, RunOutcome::Finished);
        assert_eq!(stats.pages_scanned, 2);
        assert_eq!(stats.appended, 6);
        assert_eq!(stats.total_records, 6);
        assert_eq!(engine.state(), EngineState::Finished);

        let titles: Vec<String> = dir_store(&dir).into_iter().map(|a| a.title).collect();
        assert_eq!(titles, ["a", "b", "c", "d", "e", "f"]);
    }

    fn dir_store(dir: &TempDir) -> Vec<Article> {
        ArticleStore::new(dir.path().join("store.json")).articles()
    }

    #[tokio::test]
    async fn empty_source_finishes_immediately() {
        let dir = TempDir::new().unwrap();
        let engine = engine_over(Arc::new(ScriptedSource::new(vec![])), &dir);

        let stats = engine.start(None).unwrap().await.unwrap();

        assert_eq!(stats.outcome, RunOutcome::Finished);
        assert_eq!(stats.pages_scanned, 0);
        assert_eq!(stats.total_records, 0);
    }

    #[tokio::test]
    async fn cutoff_ends_page_scan_and_run() {
        let dir = TempDir::new().unwrap();
        // Newest-first page: once "c" falls under the cutoff, "d" must be
        // skipped too even though a fresh comparison would accept nothing
        // after it anyway on this page.
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::new(vec![
                item("a", "2024-03-04"),
                item("b", "2024-03-03"),
                item("c", "2024-02-01"),
                item("d", "2024-01-15"),
            ]),
            ScriptedPage::new(vec![item("e", "2024-01-01")]),
        ]));
        let engine = engine_over(source, &dir);

        let stats = engine.start(Some(date("2024-03-01"))).unwrap().await.unwrap();

        assert_eq!(stats.outcome, RunOutcome::Finished);
        assert_eq!(stats.pages_scanned, 1);
        let titles: Vec<String> = dir_store(&dir).into_iter().map(|a| a.title).collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[tokio::test]
    async fn cutoff_accepts_records_on_the_boundary() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new(vec![ScriptedPage::new(vec![
            item("a", "2024-03-01"),
            item("b", "2024-02-29"),
        ])]));
        let engine = engine_over(source, &dir);

        engine.start(Some(date("2024-03-01"))).unwrap().await.unwrap();

        let titles: Vec<String> = dir_store(&dir).into_iter().map(|a| a.title).collect();
        assert_eq!(titles, ["a"]);
    }

    #[tokio::test]
    async fn malformed_items_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new(vec![ScriptedPage::new(vec![
            item("a", "2024-03-03"),
            RawItem::new(Some("no-url".to_string()), None, Some("2024-03-02".to_string())),
            RawItem::new(
                Some("bad-date".to_string()),
                Some("https://example.com/x".to_string()),
                Some("not a date".to_string()),
            ),
            item("b", "2024-03-01"),
        ])]));
        let engine = engine_over(source, &dir);

        let stats = engine.start(None).unwrap().await.unwrap();

        assert_eq!(stats.skipped_malformed, 2);
        let titles: Vec<String> = dir_store(&dir).into_iter().map(|a| a.title).collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[tokio::test]
    async fn appends_to_existing_records() {
        let dir = TempDir::new().unwrap();
        let store = ArticleStore::new(dir.path().join("store.json"));
        assert!(store.save(
            &[Article::new("old", "https://example.com/old", "2023-12-01").unwrap()],
            "acme"
        ));

        let source = Arc::new(ScriptedSource::new(vec![ScriptedPage::new(vec![item(
            "new",
            "2024-01-01",
        )])]));
        let engine = engine_over(source, &dir);

        let stats = engine.start(None).unwrap().await.unwrap();

        assert_eq!(stats.appended, 1);
        assert_eq!(stats.total_records, 2);
        let titles: Vec<String> = dir_store(&dir).into_iter().map(|a| a.title).collect();
        assert_eq!(titles, ["old", "new"]);
    }

    #[tokio::test]
    async fn start_while_collecting_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A long jitter keeps the first run parked in its inter-page wait.
        let store = Arc::new(ArticleStore::new(dir.path().join("store.json")));
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::new(vec![item("a", "2024-03-03")]),
            ScriptedPage::new(vec![item("b", "2024-03-02")]),
        ]));
        let engine = Arc::new(CollectionEngine::with_jitter(
            source,
            store,
            fast_config(),
            Arc::new(|_, _| Duration::from_secs(3600)),
        ));

        let mut events = engine.events();
        let handle = engine.start(None).unwrap();
        // Wait until the run is parked in its inter-page delay.
        loop {
            if let EngineEvent::Waiting { .. } = events.recv().await.unwrap() {
                break;
            }
        }

        assert!(matches!(
            engine.start(None),
            Err(HarvestError::CollectionActive)
        ));
        engine.stop();
        let stats = handle.await.unwrap();
        assert_eq!(stats.outcome, RunOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_inter_page_delay_appends_nothing_further() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ArticleStore::new(dir.path().join("store.json")));
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::new(vec![item("a", "2024-03-03")]),
            ScriptedPage::new(vec![item("b", "2024-03-02")]),
        ]));
        let engine = Arc::new(CollectionEngine::with_jitter(
            source.clone(),
            store.clone(),
            HarvestConfig::default(),
            Arc::new(|min, _| min),
        ));
        let mut events = engine.events();

        let handle = engine.start(None).unwrap();
        loop {
            if let EngineEvent::Waiting { .. } = events.recv().await.unwrap() {
                break;
            }
        }
        engine.stop();

        let stats = handle.await.unwrap();
        assert_eq!(stats.outcome, RunOutcome::Stopped);
        assert_eq!(engine.state(), EngineState::Stopped);
        let titles: Vec<String> = store.articles().into_iter().map(|a| a.title).collect();
        assert_eq!(titles, ["a"]);
        // The advance never ran: the source is still on page one.
        assert!(source.has_next_page().await);
    }

    #[tokio::test]
    async fn engine_is_restartable_after_finish() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new(vec![ScriptedPage::new(vec![item(
            "a",
            "2024-03-03",
        )])]));
        let engine = engine_over(source, &dir);

        let first = engine.start(None).unwrap().await.unwrap();
        assert_eq!(first.outcome, RunOutcome::Finished);

        // Second run re-reads the same rendered page and appends again:
        // the store has no identity notion beyond record content.
        let second = engine.start(None).unwrap().await.unwrap();
        assert_eq!(second.outcome, RunOutcome::Finished);
        assert_eq!(second.total_records, 2);
    }

    #[tokio::test]
    async fn session_tracks_pagination_indicator() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::new(vec![item("a", "2024-03-03")]).with_indicator("1 / 2"),
            ScriptedPage::new(vec![item("b", "2024-03-02")]).with_indicator("2 / 2"),
        ]));
        let engine = engine_over(source, &dir);
        let mut events = engine.events();

        engine.start(None).unwrap().await.unwrap();

        let mut pages = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::PageCollected {
                page, total_pages, ..
            } = event
            {
                pages.push((page, total_pages));
            }
        }
        assert_eq!(pages, [(1, 2), (2, 2)]);
        assert!(engine.session().is_none());
    }

    #[tokio::test]
    async fn missing_indicator_leaves_session_defaults() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(
            ScriptedSource::new(vec![ScriptedPage::new(vec![item("a", "2024-03-03")])])
                .without_pagination(),
        );
        let engine = engine_over(source, &dir);
        let mut events = engine.events();

        let stats = engine.start(None).unwrap().await.unwrap();

        assert_eq!(stats.outcome, RunOutcome::Finished);
        match events.recv().await.unwrap() {
            EngineEvent::PageCollected {
                page, total_pages, ..
            } => {
                assert_eq!((page, total_pages), (1, 1));
            }
            other => panic!("expected PageCollected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_event_reports_store_total() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ArticleStore::new(dir.path().join("store.json")));
        assert!(store.save(
            &[Article::new("old", "https://example.com/old", "2023-12-01").unwrap()],
            "acme"
        ));
        let source = Arc::new(ScriptedSource::new(vec![ScriptedPage::new(vec![item(
            "a",
            "2024-03-03",
        )])]));
        let engine = Arc::new(CollectionEngine::with_jitter(
            source,
            store,
            fast_config(),
            zero_jitter(),
        ));
        let mut events = engine.events();

        engine.start(None).unwrap().await.unwrap();

        let mut terminal = None;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::Finished { total_records } = event {
                terminal = Some(total_records);
            }
        }
        assert_eq!(terminal, Some(2));
    }

    #[test]
    fn jitter_stays_within_the_half_open_range() {
        let min = Duration::from_millis(1000);
        let max = Duration::from_millis(3000);
        for _ in 0..50 {
            let delay = uniform_jitter(min, max);
            assert!(delay >= min && delay < max);
        }
    }

    #[test]
    fn jitter_handles_degenerate_ranges() {
        let ms = Duration::from_millis;
        assert_eq!(uniform_jitter(ms(5), ms(5)), ms(5));
        assert_eq!(uniform_jitter(ms(5), ms(3)), ms(5));
        // A positive span under one millisecond must not draw from an
        // empty range.
        assert_eq!(
            uniform_jitter(Duration::from_micros(100), Duration::from_micros(900)),
            Duration::from_micros(100)
        );
    }
}
