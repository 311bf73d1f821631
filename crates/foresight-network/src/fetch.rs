//! Cancellable single-request fetches

use crate::{NetworkError, PageRequest, Result, Transport};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type ReadyFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'static>>;

/// Handle that requests cancellation of an [`AbortableFetch`].
///
/// Cloneable and usable after the fetch has settled, in which case aborting
/// does nothing.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    /// Request cancellation
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One cancellable network request.
///
/// The request is issued lazily when [`AbortableFetch::ready`] is first
/// polled. Once aborted, `ready` settles with [`NetworkError::Cancelled`]
/// even if the transport would have succeeded.
pub struct AbortableFetch {
    request: PageRequest,
    token: CancellationToken,
    ready: ReadyFuture,
}

impl AbortableFetch {
    /// Start fetching `request` through `transport`
    pub fn start<T>(transport: Arc<T>, request: PageRequest) -> Self
    where
        T: Transport + ?Sized,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let issued = request.clone();

        let ready: ReadyFuture = Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    debug!("Fetch of {} aborted", issued.url);
                    Err(NetworkError::Cancelled)
                }
                result = transport.fetch(&issued) => result,
            }
        });

        Self {
            request,
            token,
            ready,
        }
    }

    /// Request being fetched
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Handle for aborting the fetch from elsewhere
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            token: self.token.clone(),
        }
    }

    /// Request cancellation
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Completion: the parsed body, a network error, or `Cancelled`
    pub async fn ready(self) -> Result<Value> {
        self.ready.await
    }
}

impl std::fmt::Debug for AbortableFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortableFetch")
            .field("request", &self.request)
            .field("aborted", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    struct SlowEcho {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Transport for SlowEcho {
        async fn fetch(&self, request: &PageRequest) -> Result<Value> {
            tokio::time::sleep(self.delay).await;
            Ok(json!(request.url.path()))
        }
    }

    struct Offline;

    #[async_trait::async_trait]
    impl Transport for Offline {
        async fn fetch(&self, _request: &PageRequest) -> Result<Value> {
            Err(NetworkError::Connection("offline".into()))
        }
    }

    fn request(path: &str) -> PageRequest {
        PageRequest::get(Url::parse(&format!("https://example.com{}", path)).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_with_body() {
        let transport = Arc::new(SlowEcho {
            delay: Duration::from_millis(20),
        });
        let fetch = AbortableFetch::start(transport, request("/a"));

        assert_eq!(fetch.ready().await.unwrap(), json!("/a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_before_completion() {
        let transport = Arc::new(SlowEcho {
            delay: Duration::from_secs(5),
        });
        let fetch = AbortableFetch::start(transport, request("/a"));
        let handle = fetch.abort_handle();

        handle.abort();

        assert!(handle.is_aborted());
        assert_eq!(fetch.ready().await, Err(NetworkError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_while_in_flight() {
        let transport = Arc::new(SlowEcho {
            delay: Duration::from_secs(5),
        });
        let fetch = AbortableFetch::start(transport, request("/a"));
        let handle = fetch.abort_handle();

        let task = tokio::spawn(fetch.ready());
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();

        assert_eq!(task.await.unwrap(), Err(NetworkError::Cancelled));
    }

    #[tokio::test]
    async fn test_abort_after_completion_is_noop() {
        let fetch = AbortableFetch::start(
            Arc::new(SlowEcho {
                delay: Duration::ZERO,
            }),
            request("/done"),
        );
        let handle = fetch.abort_handle();

        let body = fetch.ready().await.unwrap();
        handle.abort();

        assert_eq!(body, json!("/done"));
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let fetch = AbortableFetch::start(Arc::new(Offline), request("/a"));
        assert!(matches!(
            fetch.ready().await,
            Err(NetworkError::Connection(_))
        ));
    }
}
