//! Speculative Page Navigation
//!
//! This crate predicts which page a user is about to open and fetches it
//! ahead of time:
//! - Hover intent with a short delay before prefetching
//! - Immediate prefetch on touch start
//! - Click commits that display from cache, wait on the in-flight fetch, or
//!   fall back to a real page load
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Navigator                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  InputEvent ──> IntentClassifier ──> schedule / prefetch     │
//! │       │                                    │                 │
//! │       ↓                                    ↓                 │
//! │  click ──> commit ─┬─ cache hit ──> change                   │
//! │                    ├─ in flight ──> wait ──> change | exit   │
//! │                    └─ elsewhere ──> exit                     │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │  Signals (mpsc)                                      │   │
//! │  │   Settled { session, outcome }   stale ids dropped   │   │
//! │  │   Timer { kind, generation }     stale gens dropped  │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                                                              │
//! │  EventBus: preload · receive · wait · change · restore · exit│
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod events;
pub mod intent;
mod navigator;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{
    NavigatorConfig, DEFAULT_DELAY_BEFORE_PRELOAD, DEFAULT_TOUCH_HOVER_GUARD,
    DEFAULT_TOUCH_RELEASE_GRACE,
};
pub use error::{Result, SpeculativeError};
pub use events::{
    Event, EventBus, EventKind, ExitReason, FetchMeta, Listener, ReceiveOverride, ReceivedPage,
    UnknownEventKind,
};
pub use intent::{Candidate, CandidateFilter, DomNode, IntentClassifier, LinkAttributes, Rejection};
pub use navigator::{
    Disposition, InputEvent, Modifiers, Navigator, NavigatorState, PointerButton,
    RequestTransform, SessionId,
};

pub use foresight_network::{
    CacheEntry, HttpTransport, ManualClock, NetworkError, PageKey, PageRequest, Transport,
};

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        Disposition, DomNode, Event, EventKind, ExitReason, InputEvent, LinkAttributes,
        Navigator, NavigatorConfig, NavigatorState, ReceiveOverride, Result,
    };
}
