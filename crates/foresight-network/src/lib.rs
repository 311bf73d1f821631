//! Network layer for speculative page navigation
//!
//! This crate holds everything below the navigation state machine:
//!
//! - **Page cache**: fetched bodies keyed by URL with a fixed TTL
//! - **Abortable fetch**: one cancellable request with a completion future
//! - **Transport**: the seam to the network, with a reqwest implementation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    foresight-network                      │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                           │
//! │  PageRequest ──> AbortableFetch ──> Transport (HTTP)     │
//! │                       │   ↑                               │
//! │                       │   └── AbortHandle (cancel)        │
//! │                       ↓                                   │
//! │                 ┌──────────────┐                          │
//! │                 │  PageCache   │  fresh iff age < ttl     │
//! │                 └──────────────┘                          │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod cache;
mod client;
mod clock;
pub mod config;
mod error;
mod fetch;
mod request;
mod transport;

pub use cache::{CacheEntry, CacheStats, PageCache};
pub use client::HttpTransport;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{CacheConfig, ClientConfig, DEFAULT_CACHE_TTL};
pub use error::{NetworkError, Result};
pub use fetch::{AbortHandle, AbortableFetch};
pub use request::{PageKey, PageRequest};
pub use transport::Transport;

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        AbortableFetch, CacheConfig, CacheEntry, PageCache, PageKey, PageRequest, Result,
        Transport,
    };
}
