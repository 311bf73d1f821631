//! Test harness: scripted transport, event recorder and an in-memory node tree
//!
//! Enabled in unit tests and through the `testing` feature for integration
//! tests and host-side harnesses.

use crate::{DomNode, Event, EventKind, LinkAttributes, Navigator};
use foresight_network::{NetworkError, PageRequest, Result, Transport};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

enum Route {
    Ready(Result<Value>),
    Gated(oneshot::Receiver<Result<Value>>),
}

/// Held response for a gated route; settle it to release the fetch.
pub struct Gate {
    tx: oneshot::Sender<Result<Value>>,
}

impl Gate {
    /// Release the fetch with a body
    pub fn succeed(self, body: Value) {
        let _ = self.tx.send(Ok(body));
    }

    /// Release the fetch with an error
    pub fn fail(self, error: NetworkError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Transport answering from a per-URL script.
///
/// Each URL has a FIFO of responses; every fetch consumes one. A fetch with
/// nothing scripted fails with a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Route>>>,
    calls: Mutex<Vec<PageRequest>>,
}

impl ScriptedTransport {
    /// Empty script
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, url: &str, route: Route) {
        lock(&self.routes)
            .entry(url.to_string())
            .or_default()
            .push_back(route);
    }

    /// Answer the next fetch of `url` with `body`
    pub fn reply(&self, url: &str, body: Value) {
        self.push(url, Route::Ready(Ok(body)));
    }

    /// Fail the next fetch of `url`
    pub fn fail(&self, url: &str, error: NetworkError) {
        self.push(url, Route::Ready(Err(error)));
    }

    /// Hold the next fetch of `url` until the returned gate is settled
    pub fn gate(&self, url: &str) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.push(url, Route::Gated(rx));
        Gate { tx }
    }

    /// URLs requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|r| r.url.to_string())
            .collect()
    }

    /// Requests issued so far, in order
    pub fn requests(&self) -> Vec<PageRequest> {
        lock(&self.calls).clone()
    }

    /// Number of fetches of `url`
    pub fn call_count(&self, url: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &PageRequest) -> Result<Value> {
        lock(&self.calls).push(request.clone());
        let route = lock(&self.routes)
            .get_mut(request.url.as_str())
            .and_then(VecDeque::pop_front);

        match route {
            Some(Route::Ready(result)) => result,
            Some(Route::Gated(rx)) => rx.await.unwrap_or(Err(NetworkError::Cancelled)),
            None => Err(NetworkError::Http {
                status: 404,
                message: format!("no scripted response for {}", request.url),
            }),
        }
    }
}

/// Records every event a navigator emits
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventRecorder {
    /// Subscribe a recorder to every event kind of `navigator`
    pub fn attach(navigator: &mut Navigator) -> Self {
        let recorder = Self::default();
        for kind in EventKind::ALL {
            let events = recorder.events.clone();
            navigator.subscribe(kind, move |event| {
                lock(&events).push(event.clone());
                None
            });
        }
        recorder
    }

    /// Everything recorded so far
    pub fn events(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    /// Kinds recorded so far
    pub fn kinds(&self) -> Vec<EventKind> {
        lock(&self.events).iter().map(Event::kind).collect()
    }

    /// Number of recorded events of `kind`
    pub fn count(&self, kind: EventKind) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }

    /// Drain the recording
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *lock(&self.events))
    }
}

struct NodeData {
    id: usize,
    link: Mutex<Option<LinkAttributes>>,
    parent: Option<TestNode>,
}

/// In-memory document node
#[derive(Clone)]
pub struct TestNode(Arc<NodeData>);

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

impl TestNode {
    fn create(link: Option<LinkAttributes>, parent: Option<TestNode>) -> Self {
        TestNode(Arc::new(NodeData {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            link: Mutex::new(link),
            parent,
        }))
    }

    /// Root node
    pub fn document() -> Self {
        Self::create(None, None)
    }

    /// Append a plain element
    pub fn append_element(&self) -> Self {
        Self::create(None, Some(self.clone()))
    }

    /// Append a link element
    pub fn append_link(&self, link: LinkAttributes) -> Self {
        Self::create(Some(link), Some(self.clone()))
    }

    /// Replace the node's link attributes
    pub fn set_link(&self, link: LinkAttributes) {
        *lock(&self.0.link) = Some(link);
    }
}

impl PartialEq for TestNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for TestNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestNode")
            .field("id", &self.0.id)
            .field("link", &*lock(&self.0.link))
            .finish()
    }
}

impl DomNode for TestNode {
    fn link(&self) -> Option<LinkAttributes> {
        lock(&self.0.link).clone()
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.clone()
    }
}
