//! Lifecycle events and their listener chains

use foresight_network::{CacheEntry, PageKey, PageRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// Lifecycle event kinds collaborators can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A prefetch started
    Preload,
    /// A prefetch completed; listeners may rewrite body and title
    Receive,
    /// A commit is waiting on the network
    Wait,
    /// A page is ready to display
    Change,
    /// The host restored a page from history
    Restore,
    /// Navigation must fall back to a real page load
    Exit,
}

impl EventKind {
    /// Every kind, in declaration order
    pub const ALL: [EventKind; 6] = [
        EventKind::Preload,
        EventKind::Receive,
        EventKind::Wait,
        EventKind::Change,
        EventKind::Restore,
        EventKind::Exit,
    ];

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Preload => "preload",
            EventKind::Receive => "receive",
            EventKind::Wait => "wait",
            EventKind::Change => "change",
            EventKind::Restore => "restore",
            EventKind::Exit => "exit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised event name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Why a navigation attempt was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The awaited fetch failed
    NetworkError,
    /// Click landed while a prefetch for another page was in flight
    PreloadingPlanned,
    /// Click landed while a previous commit was still waiting
    WaitingForAnotherPage,
    /// The clicked URL could not be parsed
    InvalidUrl,
}

impl ExitReason {
    /// Reason string reported to hosts
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::NetworkError => "network error",
            ExitReason::PreloadingPlanned => "click occurred while preloading planned",
            ExitReason::WaitingForAnotherPage => {
                "clicked on a link while waiting for another page to display"
            }
            ExitReason::InvalidUrl => "invalid url",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request and timing of a completed fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchMeta {
    /// Request actually issued
    pub request: PageRequest,
    /// When the body arrived
    pub fetched_at: Instant,
}

/// Payload of a `receive` event
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPage {
    /// Page that was fetched
    pub key: PageKey,
    /// Body, possibly rewritten by earlier listeners
    pub body: Value,
    /// Title, if a listener produced one
    pub title: Option<String>,
    /// Fetch details
    pub meta: FetchMeta,
}

/// Partial rewrite returned by a `receive` listener
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiveOverride {
    /// Replacement body
    pub body: Option<Value>,
    /// Replacement title
    pub title: Option<String>,
}

impl ReceiveOverride {
    /// Replace the body
    pub fn body(body: Value) -> Self {
        Self {
            body: Some(body),
            title: None,
        }
    }

    /// Replace the title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            body: None,
            title: Some(title.into()),
        }
    }

    /// Also replace the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn apply(self, page: &mut ReceivedPage) {
        if let Some(body) = self.body {
            page.body = body;
        }
        if let Some(title) = self.title {
            page.title = Some(title);
        }
    }
}

/// A lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Prefetch of `key` started
    Preload { key: PageKey },
    /// Prefetch completed
    Receive(ReceivedPage),
    /// A commit is waiting for its data
    Wait,
    /// Display `entry` for `key`
    Change { key: PageKey, entry: CacheEntry },
    /// The host restored `key` from history
    Restore { key: PageKey },
    /// Fall back to a real navigation to `url`
    Exit { url: String, reason: ExitReason },
}

impl Event {
    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Preload { .. } => EventKind::Preload,
            Event::Receive(_) => EventKind::Receive,
            Event::Wait => EventKind::Wait,
            Event::Change { .. } => EventKind::Change,
            Event::Restore { .. } => EventKind::Restore,
            Event::Exit { .. } => EventKind::Exit,
        }
    }
}

/// Event listener.
///
/// The return value is only consulted for `receive` events; other kinds
/// ignore it.
pub type Listener = Box<dyn FnMut(&Event) -> Option<ReceiveOverride> + Send>;

/// Ordered listener chains per event kind
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<Listener>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `kind`
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&Event) -> Option<ReceiveOverride> + Send + 'static,
    {
        self.listeners
            .entry(kind)
            .or_default()
            .push(Box::new(listener));
    }

    /// Append an observer that never rewrites anything
    pub fn on<F>(&mut self, kind: EventKind, mut observer: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.subscribe(kind, move |event| {
            observer(event);
            None
        });
    }

    /// Append a `receive` listener working directly on the page payload
    pub fn on_receive<F>(&mut self, mut listener: F)
    where
        F: FnMut(&ReceivedPage) -> Option<ReceiveOverride> + Send + 'static,
    {
        self.subscribe(EventKind::Receive, move |event| match event {
            Event::Receive(page) => listener(page),
            _ => None,
        });
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Deliver `event` to its listeners in registration order
    pub fn emit(&mut self, event: Event) {
        if let Event::Receive(page) = event {
            self.dispatch_receive(page);
            return;
        }

        if let Some(listeners) = self.listeners.get_mut(&event.kind()) {
            for listener in listeners.iter_mut() {
                listener(&event);
            }
        }
    }

    /// Deliver a `receive` event, folding each listener's override into the
    /// payload seen by the next one. Returns the final payload.
    pub fn dispatch_receive(&mut self, page: ReceivedPage) -> ReceivedPage {
        let Some(listeners) = self.listeners.get_mut(&EventKind::Receive) else {
            return page;
        };

        let mut event = Event::Receive(page);
        for listener in listeners.iter_mut() {
            if let Some(rewrite) = listener(&event) {
                if let Event::Receive(ref mut current) = event {
                    rewrite.apply(current);
                }
            }
        }

        match event {
            Event::Receive(page) => page,
            _ => unreachable!("receive dispatch only carries receive events"),
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind.as_str(), &self.listener_count(kind));
        }
        map.finish()
    }
}
