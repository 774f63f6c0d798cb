//! Overlay State Store
//!
//! Holds the heatmap overlay's state (phase, current page URL, fetched
//! records, tooltip flag) behind one `RwLock`, publishes transitions on
//! a broadcast bus for the rendering layer, and runs fetches as spawned
//! tasks.
//!
//! Staleness is handled by generation counting rather than cancellation:
//! every `enable` / `disable` / `set_page_url` bumps an `AtomicU64`;
//! fetch and tooltip tasks capture the generation at spawn and discard
//! their effect once superseded. The slow path re-checks under the state
//! lock, so a stale response can never clobber newer state.

use crate::aggregate::HeatmapView;
use crate::client::{Authenticator, StatsClient};
use crate::document::QueryableDocument;
use crate::error::{HeatmapError, Result};
use crate::types::EventRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// How long the "heatmap loaded" tooltip stays up
pub const TOOLTIP_HIDE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatmapPhase {
    /// Overlay off; no records held
    Disabled,
    /// Enabled, but no page URL observed yet
    Idle,
    /// Fetch in flight for the current page URL
    Loading,
    /// Records held for the current page URL
    Loaded,
}

#[derive(Debug, Clone)]
pub struct HeatmapState {
    pub phase: HeatmapPhase,
    pub page_url: Option<String>,
    pub events: Vec<EventRecord>,
    pub show_tooltip: bool,
}

impl HeatmapState {
    fn new() -> Self {
        Self {
            phase: HeatmapPhase::Disabled,
            page_url: None,
            events: Vec::new(),
            show_tooltip: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.phase != HeatmapPhase::Disabled
    }
}

/// Transitions published to the rendering layer
#[derive(Debug, Clone)]
pub enum HeatmapEvent {
    Enabled,
    Disabled,
    PageChanged { url: String },
    FetchStarted { url: String },
    EventsLoaded { url: String, records: usize },
    FetchFailed { error: String },
    TooltipShown,
    TooltipHidden,
}

struct StoreInner {
    state: RwLock<HeatmapState>,
    /// Bumped on every meaningful transition; stale tasks compare against it
    generation: AtomicU64,
    events_tx: broadcast::Sender<HeatmapEvent>,
    client: Arc<dyn StatsClient>,
    auth: Arc<dyn Authenticator>,
}

#[derive(Clone)]
pub struct HeatmapStore {
    inner: Arc<StoreInner>,
}

impl HeatmapStore {
    pub fn new(client: Arc<dyn StatsClient>, auth: Arc<dyn Authenticator>) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(HeatmapState::new()),
                generation: AtomicU64::new(0),
                events_tx,
                client,
                auth,
            }),
        }
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<HeatmapEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> HeatmapState {
        self.inner.state.read().await.clone()
    }

    /// Turn the overlay on and fetch stats for the current page, if one
    /// is known yet
    pub async fn enable(&self) {
        let generation = self.bump();
        let url = {
            let mut state = self.inner.state.write().await;
            state.events.clear();
            state.show_tooltip = false;
            state.phase = if state.page_url.is_some() {
                HeatmapPhase::Loading
            } else {
                HeatmapPhase::Idle
            };
            state.page_url.clone()
        };
        self.publish(HeatmapEvent::Enabled);
        if let Some(url) = url {
            self.spawn_fetch(url, generation);
        }
    }

    /// Turn the overlay off; drops records and hides the tooltip
    /// immediately
    pub async fn disable(&self) {
        self.bump();
        {
            let mut state = self.inner.state.write().await;
            state.phase = HeatmapPhase::Disabled;
            state.events.clear();
            state.show_tooltip = false;
        }
        self.publish(HeatmapEvent::Disabled);
    }

    /// Observed page URL changed. While enabled this discards the held
    /// records and re-fetches for the new URL.
    pub async fn set_page_url(&self, url: impl Into<String>) {
        let url = url.into();
        let generation = self.bump();
        let refetch = {
            let mut state = self.inner.state.write().await;
            state.page_url = Some(url.clone());
            if state.enabled() {
                state.events.clear();
                state.show_tooltip = false;
                state.phase = HeatmapPhase::Loading;
                true
            } else {
                false
            }
        };
        self.publish(HeatmapEvent::PageChanged { url: url.clone() });
        if refetch {
            self.spawn_fetch(url, generation);
        }
    }

    /// Subscribe the store to a page-URL source. Every URL received is
    /// applied as a `set_page_url` call until the source closes.
    pub fn attach_page_source(
        &self,
        mut urls: broadcast::Receiver<String>,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                match urls.recv().await {
                    Ok(url) => store.set_page_url(url).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "page-URL source lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Derive the ranked heatmap for the currently held records
    pub async fn view(&self, doc: &(impl QueryableDocument + ?Sized)) -> Result<HeatmapView> {
        let events = self.inner.state.read().await.events.clone();
        HeatmapView::compute(doc, &events)
    }

    fn bump(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn publish(&self, event: HeatmapEvent) {
        let _ = self.inner.events_tx.send(event);
    }

    fn spawn_fetch(&self, url: String, generation: u64) {
        let store = self.clone();
        tokio::spawn(async move {
            store.run_fetch(url, generation).await;
        });
    }

    async fn run_fetch(&self, url: String, generation: u64) {
        let request_id = Uuid::new_v4();
        debug!(%request_id, %url, "fetching element stats");
        self.publish(HeatmapEvent::FetchStarted { url: url.clone() });

        let result = match self.inner.client.element_stats(&url).await {
            Err(HeatmapError::AuthRequired) => {
                // 403 is not a failure: kick off re-auth and treat the
                // fetch as an empty result
                warn!(%request_id, "stats fetch rejected, re-authenticating");
                self.inner.auth.authenticate().await;
                Ok(Vec::new())
            }
            other => other,
        };

        match result {
            Ok(records) => {
                let loaded = {
                    let mut state = self.inner.state.write().await;
                    if !self.is_current(generation) {
                        debug!(%request_id, "discarding stale stats response");
                        return;
                    }
                    let loaded = records.len();
                    state.events = records;
                    state.phase = HeatmapPhase::Loaded;
                    state.show_tooltip = true;
                    loaded
                };
                self.publish(HeatmapEvent::EventsLoaded {
                    url,
                    records: loaded,
                });
                self.publish(HeatmapEvent::TooltipShown);
                self.spawn_tooltip_timer(generation);
            }
            Err(error) => {
                warn!(%request_id, %error, "stats fetch failed");
                {
                    let mut state = self.inner.state.write().await;
                    if !self.is_current(generation) {
                        return;
                    }
                    state.phase = HeatmapPhase::Disabled;
                    state.events.clear();
                    state.show_tooltip = false;
                }
                self.publish(HeatmapEvent::FetchFailed {
                    error: error.to_string(),
                });
                self.publish(HeatmapEvent::Disabled);
            }
        }
    }

    fn spawn_tooltip_timer(&self, generation: u64) {
        let store = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(TOOLTIP_HIDE_DELAY).await;
            let hidden = {
                let mut state = store.inner.state.write().await;
                if !store.is_current(generation) || !state.show_tooltip {
                    return;
                }
                state.show_tooltip = false;
                true
            };
            if hidden {
                store.publish(HeatmapEvent::TooltipHidden);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct StubStats {
        records: Vec<EventRecord>,
        delay: Option<Duration>,
        forbidden: bool,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubStats {
        fn with_records(records: Vec<EventRecord>) -> Self {
            Self {
                records,
                delay: None,
                forbidden: false,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatsClient for StubStats {
        async fn element_stats(&self, _page_url: &str) -> Result<Vec<EventRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.forbidden {
                return Err(HeatmapError::AuthRequired);
            }
            if self.fail {
                return Err(HeatmapError::Url(url::ParseError::EmptyHost));
            }
            Ok(self.records.clone())
        }
    }

    #[derive(Default)]
    struct CountingAuth {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Authenticator for CountingAuth {
        async fn authenticate(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_record(count: u64) -> EventRecord {
        EventRecord {
            count,
            ..Default::default()
        }
    }

    async fn settle() {
        // paused clock: sleeping lets spawned tasks run and auto-advances
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_loads_events_for_current_page() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let client = Arc::new(StubStats::with_records(vec![sample_record(3)]));
        let store = HeatmapStore::new(client.clone(), Arc::new(CountingAuth::default()));

        store.set_page_url("https://site.test/").await;
        store.enable().await;
        settle().await;

        let state = store.state().await;
        assert_eq!(state.phase, HeatmapPhase::Loaded);
        assert_eq!(state.events.len(), 1);
        assert!(state.show_tooltip);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_without_url_stays_idle() {
        let client = Arc::new(StubStats::with_records(vec![]));
        let store = HeatmapStore::new(client.clone(), Arc::new(CountingAuth::default()));

        store.enable().await;
        settle().await;

        assert_eq!(store.state().await.phase, HeatmapPhase::Idle);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_runs_authenticator_once_and_loads_empty() {
        let mut client = StubStats::with_records(vec![sample_record(1)]);
        client.forbidden = true;
        let client = Arc::new(client);
        let auth = Arc::new(CountingAuth::default());
        let store = HeatmapStore::new(client.clone(), auth.clone());

        store.set_page_url("https://site.test/").await;
        store.enable().await;
        settle().await;

        let state = store.state().await;
        assert_eq!(state.phase, HeatmapPhase::Loaded);
        assert!(state.events.is_empty());
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_falls_back_to_disabled() {
        let mut client = StubStats::with_records(vec![sample_record(1)]);
        client.fail = true;
        let store = HeatmapStore::new(Arc::new(client), Arc::new(CountingAuth::default()));
        let mut events = store.subscribe();

        store.set_page_url("https://site.test/").await;
        store.enable().await;
        settle().await;

        assert_eq!(store.state().await.phase, HeatmapPhase::Disabled);
        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, HeatmapEvent::FetchFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_discards_in_flight_fetch() {
        let mut client = StubStats::with_records(vec![sample_record(5)]);
        client.delay = Some(Duration::from_millis(100));
        let store = HeatmapStore::new(Arc::new(client), Arc::new(CountingAuth::default()));

        store.set_page_url("https://site.test/").await;
        store.enable().await;
        settle().await; // fetch now sleeping
        store.disable().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let state = store.state().await;
        assert_eq!(state.phase, HeatmapPhase::Disabled);
        assert!(state.events.is_empty());
        assert!(!state.show_tooltip);
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_change_supersedes_previous_fetch() {
        let mut client = StubStats::with_records(vec![sample_record(5)]);
        client.delay = Some(Duration::from_millis(100));
        let client = Arc::new(client);
        let store = HeatmapStore::new(client.clone(), Arc::new(CountingAuth::default()));

        store.set_page_url("https://site.test/a").await;
        store.enable().await;
        settle().await;
        store.set_page_url("https://site.test/b").await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let state = store.state().await;
        assert_eq!(state.phase, HeatmapPhase::Loaded);
        assert_eq!(state.page_url.as_deref(), Some("https://site.test/b"));
        // both fetches ran; only the second one landed
        assert_eq!(client.calls(), 2);
        assert_eq!(state.events.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attached_page_source_drives_refetches() {
        let client = Arc::new(StubStats::with_records(vec![sample_record(2)]));
        let store = HeatmapStore::new(client.clone(), Arc::new(CountingAuth::default()));

        let (urls_tx, urls_rx) = broadcast::channel(8);
        let handle = store.attach_page_source(urls_rx);

        urls_tx.send("https://site.test/a".to_string()).unwrap();
        settle().await;
        store.enable().await;
        settle().await;
        urls_tx.send("https://site.test/b".to_string()).unwrap();
        settle().await;

        let state = store.state().await;
        assert_eq!(state.page_url.as_deref(), Some("https://site.test/b"));
        assert_eq!(state.phase, HeatmapPhase::Loaded);
        assert_eq!(client.calls(), 2);

        drop(urls_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tooltip_auto_hides_after_delay() {
        let client = Arc::new(StubStats::with_records(vec![]));
        let store = HeatmapStore::new(client, Arc::new(CountingAuth::default()));

        store.set_page_url("https://site.test/").await;
        store.enable().await;
        settle().await;
        assert!(store.state().await.show_tooltip);

        tokio::time::sleep(TOOLTIP_HIDE_DELAY + Duration::from_millis(50)).await;
        assert!(!store.state().await.show_tooltip);
        assert_eq!(store.state().await.phase, HeatmapPhase::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_tooltip_timer_does_not_fire_after_reload() {
        let client = Arc::new(StubStats::with_records(vec![]));
        let store = HeatmapStore::new(client, Arc::new(CountingAuth::default()));

        store.set_page_url("https://site.test/a").await;
        store.enable().await;
        settle().await;

        // new page right before the old timer elapses
        tokio::time::sleep(Duration::from_millis(900)).await;
        store.set_page_url("https://site.test/b").await;
        settle().await;

        // the fresh load shows its own tooltip; the stale timer from
        // page /a must not hide it early
        assert!(store.state().await.show_tooltip);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.state().await.show_tooltip);

        tokio::time::sleep(TOOLTIP_HIDE_DELAY).await;
        assert!(!store.state().await.show_tooltip);
    }
}
