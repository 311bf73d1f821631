//! Transport seam between the prefetcher and the network

use crate::{PageRequest, Result};
use serde_json::Value;

/// Issues a GET for a page and parses its body.
///
/// Implementations must be cancel-safe: the future may be dropped at any
/// await point when the prefetch is abandoned.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Fetch and parse the body of `request`
    async fn fetch(&self, request: &PageRequest) -> Result<Value>;
}
