//! Prefetch/navigation state machine
//!
//! The navigator owns the single prefetch slot, the page cache and the event
//! bus. Everything that spans time (fetches, the hover delay, the touch
//! release grace period) runs in a tokio task and reports back as a
//! signal tagged with the session id or timer generation it belongs to.
//! The host feeds those signals back in with [`Navigator::tick`] or
//! [`Navigator::drain`]; a signal whose session or timer has since been
//! replaced is dropped.

mod input;

pub use input::{Disposition, InputEvent, Modifiers, PointerButton};

use crate::{
    CandidateFilter, Event, EventBus, EventKind, ExitReason, FetchMeta, IntentClassifier,
    NavigatorConfig, ReceiveOverride, ReceivedPage, Result, SpeculativeError,
};
use foresight_network::{
    AbortHandle, AbortableFetch, CacheEntry, CacheStats, PageCache, PageKey,
    PageRequest, SharedClock, SystemClock, Transport,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Rewrites a page URL into the request a prefetch issues
pub type RequestTransform = Arc<dyn Fn(&Url) -> PageRequest + Send + Sync>;

/// Identifier of a prefetch session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable navigator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigatorState {
    /// Nothing scheduled or in flight
    Idle,
    /// Intent observed, prefetch delayed
    Scheduled,
    /// Fetch in flight
    Prefetching,
    /// Last session populated the cache
    Completed,
    /// A commit is waiting for its fetch
    AwaitingCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Preload,
    TouchRelease,
}

/// Deferred input delivered back to the navigator
#[derive(Debug)]
enum Signal {
    Settled {
        session: SessionId,
        key: PageKey,
        request: PageRequest,
        outcome: foresight_network::Result<Value>,
    },
    Timer {
        kind: TimerKind,
        generation: u64,
    },
}

#[derive(Debug)]
struct Timer {
    generation: u64,
    cancel: CancellationToken,
}

impl Timer {
    fn clear(self) {
        self.cancel.cancel();
    }
}

#[derive(Debug)]
struct PrefetchSession {
    id: SessionId,
    key: PageKey,
    abort: AbortHandle,
}

#[derive(Debug)]
struct ScheduledIntent {
    key: PageKey,
    timer: Timer,
}

/// Speculative navigation state machine.
///
/// One instance per page (or per test). Must be used inside a tokio runtime,
/// since prefetches and timers are spawned as tasks.
pub struct Navigator {
    config: NavigatorConfig,
    transport: Arc<dyn Transport>,
    cache: PageCache,
    bus: EventBus,
    classifier: IntentClassifier,
    request_transform: Option<RequestTransform>,
    clock: SharedClock,
    location: Url,
    session: Option<PrefetchSession>,
    scheduled: Option<ScheduledIntent>,
    completed: Option<PageKey>,
    pending_display: bool,
    last_touch: Option<Instant>,
    touch_release: Option<Timer>,
    next_session: u64,
    next_timer: u64,
    signal_tx: mpsc::UnboundedSender<Signal>,
    signal_rx: mpsc::UnboundedReceiver<Signal>,
}

impl Navigator {
    /// Create a navigator for the page at `location`
    pub fn new(
        config: NavigatorConfig,
        transport: Arc<dyn Transport>,
        location: &str,
    ) -> Result<Self> {
        let location =
            Url::parse(location).map_err(|e| SpeculativeError::invalid_url(location, e))?;
        let clock: SharedClock = Arc::new(SystemClock);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        if !config.supported {
            info!("Platform unsupported, speculative navigation disabled");
        }

        Ok(Self {
            cache: PageCache::with_clock(config.cache_config(), clock.clone()),
            config,
            transport,
            bus: EventBus::new(),
            classifier: IntentClassifier::new(),
            request_transform: None,
            clock,
            location,
            session: None,
            scheduled: None,
            completed: None,
            pending_display: false,
            last_touch: None,
            touch_release: None,
            next_session: 0,
            next_timer: 0,
            signal_tx,
            signal_rx,
        })
    }

    /// Use a custom clock for cache freshness and touch timing.
    ///
    /// Replaces the cache, so call it before anything is fetched.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.cache = PageCache::with_clock(self.config.cache_config(), clock.clone());
        self.clock = clock;
        self
    }

    /// Rewrite page URLs into the requests prefetches issue
    pub fn with_request_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Url) -> PageRequest + Send + Sync + 'static,
    {
        self.request_transform = Some(Arc::new(transform));
        self
    }

    /// Only treat URLs accepted by `filter` as candidates
    pub fn with_candidate_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        let filter: CandidateFilter = Arc::new(filter);
        self.classifier = IntentClassifier::new().with_filter(filter);
        self
    }

    /// Configuration in effect
    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Current page URL
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// The host navigated; classification now compares against `location`
    pub fn set_location(&mut self, location: &str) -> Result<()> {
        self.location =
            Url::parse(location).map_err(|e| SpeculativeError::invalid_url(location, e))?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------------

    /// Register a listener for one event kind.
    ///
    /// The listener's return value is only used for `receive`, where it may
    /// rewrite the body and title seen by later listeners and stored in the
    /// cache.
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&Event) -> Option<ReceiveOverride> + Send + 'static,
    {
        self.bus.subscribe(kind, listener);
    }

    /// Register an observer for one event kind
    pub fn on<F>(&mut self, kind: EventKind, observer: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.bus.on(kind, observer);
    }

    /// Register a `receive` listener
    pub fn on_receive<F>(&mut self, listener: F)
    where
        F: FnMut(&ReceivedPage) -> Option<ReceiveOverride> + Send + 'static,
    {
        self.bus.on_receive(listener);
    }

    // ---------------------------------------------------------------------
    // Host operations
    // ---------------------------------------------------------------------

    /// Start prefetching `url`, or the scheduled intent target when `None`
    pub fn request_prefetch(&mut self, url: Option<&str>) {
        if !self.config.supported {
            return;
        }

        let key = match url {
            Some(url) => match self.resolve(url) {
                Some(key) => key,
                None => return,
            },
            None => match &self.scheduled {
                Some(scheduled) => scheduled.key.clone(),
                None => {
                    debug!("Prefetch requested with nothing scheduled");
                    return;
                }
            },
        };

        self.start_prefetch(key);
    }

    /// The user decided to navigate to `url` now
    pub fn request_display(&mut self, url: &str) {
        if !self.config.supported {
            return;
        }

        match self.resolve(url) {
            Some(key) => self.commit(key),
            None => self.bus.emit(Event::Exit {
                url: url.to_string(),
                reason: ExitReason::InvalidUrl,
            }),
        }
    }

    /// Schedule a prefetch of `url` after `delay`, replacing any scheduled one
    pub fn request_intent(&mut self, url: &str, delay: Duration) {
        if !self.config.supported {
            return;
        }
        if let Some(key) = self.resolve(url) {
            self.schedule_intent(key, delay);
        }
    }

    /// Intent was abandoned (pointer left, touch released)
    pub fn cancel_intent(&mut self) {
        if !self.config.supported {
            return;
        }

        if let Some(scheduled) = self.scheduled.take() {
            debug!("Cleared scheduled prefetch of {}", scheduled.key);
            scheduled.timer.clear();
            return;
        }

        if self.pending_display {
            debug!("Ignoring cancel: a commit is awaiting the fetch");
            return;
        }

        self.halt_session();
    }

    /// The host restored `url` from history
    pub fn restore(&mut self, url: &str) {
        if !self.config.supported {
            return;
        }
        if let Some(key) = self.resolve(url) {
            self.bus.emit(Event::Restore { key });
        }
    }

    /// Drop the cached copy of `url`
    pub fn purge(&mut self, url: &str) {
        if let Some(key) = self.resolve(url) {
            self.cache.purge(&key);
        }
    }

    /// Drop every cached page
    pub fn purge_all(&mut self) {
        self.cache.purge_all();
    }

    /// Raw cache entry for `url`, fresh or stale
    pub fn peek(&self, url: &str) -> Option<&CacheEntry> {
        let key = self.resolve(url)?;
        self.cache.get(&key)
    }

    /// Whether a fresh cache entry exists for `url`
    pub fn is_fresh(&self, url: &str) -> bool {
        self.resolve(url)
            .map(|key| self.cache.is_valid(&key))
            .unwrap_or(false)
    }

    /// Cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Observable state
    pub fn state(&self) -> NavigatorState {
        if self.pending_display {
            NavigatorState::AwaitingCompletion
        } else if self.scheduled.is_some() {
            NavigatorState::Scheduled
        } else if self.session.is_some() {
            NavigatorState::Prefetching
        } else if self.completed.is_some() {
            NavigatorState::Completed
        } else {
            NavigatorState::Idle
        }
    }

    /// Page currently being fetched
    pub fn in_flight(&self) -> Option<&PageKey> {
        self.session.as_ref().map(|s| &s.key)
    }

    /// Id of the live prefetch session
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Page whose prefetch is scheduled but not started
    pub fn scheduled(&self) -> Option<&PageKey> {
        self.scheduled.as_ref().map(|s| &s.key)
    }

    /// Whether a commit is waiting for its fetch
    pub fn is_awaiting_display(&self) -> bool {
        self.pending_display
    }

    /// Whether any fetch or timer is still outstanding
    pub fn has_pending_work(&self) -> bool {
        self.session.is_some() || self.scheduled.is_some() || self.touch_release.is_some()
    }

    // ---------------------------------------------------------------------
    // Signal delivery
    // ---------------------------------------------------------------------

    /// Wait for the next deferred signal and process it.
    ///
    /// Only returns once a fetch settles or a timer fires; check
    /// [`Navigator::has_pending_work`] first.
    pub async fn tick(&mut self) {
        if let Some(signal) = self.signal_rx.recv().await {
            self.handle_signal(signal);
        }
    }

    /// Process every signal that is already queued. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(signal) = self.signal_rx.try_recv() {
            self.handle_signal(signal);
            processed += 1;
        }
        processed
    }

    /// Keep ticking until no fetch or timer is outstanding
    pub async fn settle(&mut self) {
        while self.has_pending_work() {
            self.tick().await;
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Settled {
                session,
                key,
                request,
                outcome,
            } => self.on_settled(session, key, request, outcome),
            Signal::Timer { kind, generation } => self.on_timer(kind, generation),
        }
    }

    fn on_timer(&mut self, kind: TimerKind, generation: u64) {
        match kind {
            TimerKind::Preload => {
                let current = self
                    .scheduled
                    .as_ref()
                    .is_some_and(|s| s.timer.generation == generation);
                if !current {
                    debug!("Dropping stale preload timer {}", generation);
                    return;
                }
                if let Some(scheduled) = self.scheduled.take() {
                    self.start_prefetch(scheduled.key);
                }
            }
            TimerKind::TouchRelease => {
                let current = self
                    .touch_release
                    .as_ref()
                    .is_some_and(|t| t.generation == generation);
                if !current {
                    return;
                }
                self.touch_release = None;
                if !self.pending_display {
                    debug!("Touch released without click");
                    self.halt_session();
                }
            }
        }
    }

    fn on_settled(
        &mut self,
        session: SessionId,
        key: PageKey,
        request: PageRequest,
        outcome: foresight_network::Result<Value>,
    ) {
        let active = self.session.as_ref().is_some_and(|s| s.id == session);
        if !active {
            debug!("Dropping late result of session {} for {}", session, key);
            return;
        }
        self.session = None;

        match outcome {
            Ok(body) => {
                let fetched_at = self.clock.now();
                let page = self.bus.dispatch_receive(ReceivedPage {
                    key: key.clone(),
                    body,
                    title: None,
                    meta: FetchMeta {
                        request: request.clone(),
                        fetched_at,
                    },
                });

                let entry = CacheEntry::new(key.clone(), page.body, fetched_at)
                    .with_title(page.title)
                    .with_request(request);
                let entry = self.cache.insert(entry).clone();
                self.completed = Some(key.clone());
                debug!("Prefetch of {} completed", key);

                if self.pending_display {
                    self.pending_display = false;
                    info!("Displaying {} after waiting", key);
                    self.bus.emit(Event::Change { key, entry });
                }
            }
            Err(error) => {
                if self.pending_display {
                    self.pending_display = false;
                    warn!("Awaited prefetch of {} failed: {}", key, error);
                    self.emit_exit(&key, ExitReason::NetworkError);
                } else {
                    debug!("Speculative prefetch of {} failed: {}", key, error);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    fn schedule_intent(&mut self, key: PageKey, delay: Duration) {
        if self.pending_display {
            debug!("Not scheduling {}: a commit is awaiting its fetch", key);
            return;
        }

        self.clear_scheduled();
        debug!("Scheduling prefetch of {} in {:?}", key, delay);
        let timer = self.arm_timer(TimerKind::Preload, delay);
        self.scheduled = Some(ScheduledIntent { key, timer });
    }

    fn start_prefetch(&mut self, key: PageKey) {
        self.clear_scheduled();

        if self.pending_display {
            debug!("Not prefetching {}: a commit is awaiting its fetch", key);
            return;
        }
        if self.session.as_ref().is_some_and(|s| s.key == key) {
            debug!("Prefetch of {} already in flight", key);
            return;
        }

        self.halt_session();

        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.completed = None;

        self.bus.emit(Event::Preload { key: key.clone() });

        let request = self.build_request(&key);
        let fetch = AbortableFetch::start(self.transport.clone(), request.clone());
        let abort = fetch.abort_handle();
        let tx = self.signal_tx.clone();
        let settled_key = key.clone();

        tokio::spawn(async move {
            let outcome = fetch.ready().await;
            let _ = tx.send(Signal::Settled {
                session: id,
                key: settled_key,
                request,
                outcome,
            });
        });

        debug!("Started prefetch session {} for {}", id, key);
        self.session = Some(PrefetchSession { id, key, abort });
    }

    fn commit(&mut self, key: PageKey) {
        if self.pending_display {
            info!("Commit to {} while another page is pending", key);
            self.pending_display = false;
            self.halt_session();
            self.emit_exit(&key, ExitReason::WaitingForAnotherPage);
            return;
        }

        if let Some(entry) = self.cache.lookup(&key).cloned() {
            info!("Displaying {} from cache", key);
            self.bus.emit(Event::Change { key, entry });
            return;
        }

        if self.session.as_ref().is_some_and(|s| s.key == key) {
            self.clear_scheduled();
            self.await_display(&key);
            return;
        }

        // Another page is in flight, even if this one is scheduled behind it
        if let Some(other) = &self.session {
            info!("Commit to {} while {} is prefetching", key, other.key);
            self.emit_exit(&key, ExitReason::PreloadingPlanned);
            return;
        }

        self.start_prefetch(key.clone());
        self.await_display(&key);
    }

    fn await_display(&mut self, key: &PageKey) {
        debug!("Waiting for {}", key);
        self.bus.emit(Event::Wait);
        self.pending_display = true;
    }

    fn halt_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.abort.abort();
            debug!("Halted prefetch session {} for {}", session.id, session.key);
        }
    }

    fn clear_scheduled(&mut self) {
        if let Some(scheduled) = self.scheduled.take() {
            scheduled.timer.clear();
        }
    }

    fn arm_timer(&mut self, kind: TimerKind, delay: Duration) -> Timer {
        self.next_timer += 1;
        let generation = self.next_timer;
        let cancel = CancellationToken::new();
        let cancelled = cancel.clone();
        let tx = self.signal_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Signal::Timer { kind, generation });
                }
            }
        });

        Timer { generation, cancel }
    }

    fn emit_exit(&mut self, key: &PageKey, reason: ExitReason) {
        self.bus.emit(Event::Exit {
            url: key.to_string(),
            reason,
        });
    }

    fn build_request(&self, key: &PageKey) -> PageRequest {
        match &self.request_transform {
            Some(transform) => transform(key.url()),
            None => PageRequest::from(key),
        }
    }

    fn resolve(&self, url: &str) -> Option<PageKey> {
        match PageKey::resolve(&self.location, url) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("Ignoring unparsable URL '{}': {}", url, e);
                None
            }
        }
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("state", &self.state())
            .field("location", &self.location.as_str())
            .field("in_flight", &self.in_flight().map(PageKey::as_str))
            .field("scheduled", &self.scheduled().map(PageKey::as_str))
            .field("cache", &self.cache)
            .field("bus", &self.bus)
            .finish()
    }
}
