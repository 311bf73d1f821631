//! Navigator configuration

use crate::Result;
use foresight_network::config::duration_ms;
use foresight_network::{CacheConfig, DEFAULT_CACHE_TTL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default hover delay before a prefetch starts
pub const DEFAULT_DELAY_BEFORE_PRELOAD: Duration = Duration::from_millis(50);

/// Window after a touch during which pointer-over events are ignored
pub const DEFAULT_TOUCH_HOVER_GUARD: Duration = Duration::from_millis(500);

/// Grace period between touch release and halting a prefetch
pub const DEFAULT_TOUCH_RELEASE_GRACE: Duration = Duration::from_millis(500);

/// Configuration for the navigator.
///
/// Deserializes from the camelCase keys hosts already use
/// (`delayBeforePreload`, `cacheTTL`, ...), durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NavigatorConfig {
    /// Hover delay before prefetching
    #[serde(with = "duration_ms")]
    pub delay_before_preload: Duration,
    /// Cache time-to-live
    #[serde(with = "duration_ms", alias = "cacheTTL")]
    pub cache_ttl: Duration,
    /// Pointer-over suppression window after a touch
    #[serde(with = "duration_ms")]
    pub touch_hover_guard: Duration,
    /// Delay before a touch released without a click halts the prefetch
    #[serde(with = "duration_ms")]
    pub touch_release_grace: Duration,
    /// Whether the host platform supports in-place navigation at all
    pub supported: bool,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            delay_before_preload: DEFAULT_DELAY_BEFORE_PRELOAD,
            cache_ttl: DEFAULT_CACHE_TTL,
            touch_hover_guard: DEFAULT_TOUCH_HOVER_GUARD,
            touch_release_grace: DEFAULT_TOUCH_RELEASE_GRACE,
            supported: true,
        }
    }
}

impl NavigatorConfig {
    /// Parse a host-supplied JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set hover delay
    pub fn with_delay_before_preload(mut self, delay: Duration) -> Self {
        self.delay_before_preload = delay;
        self
    }

    /// Set cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Mark the platform as unsupported; every operation becomes a no-op
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Cache configuration derived from this config
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default().with_ttl(self.cache_ttl)
    }
}
