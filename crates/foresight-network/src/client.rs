//! HTTP transport backed by reqwest

use crate::{ClientConfig, NetworkError, PageRequest, Result, Transport};
use reqwest::{header, Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// HTTP transport for page prefetches
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if config.compression {
            builder = builder.gzip(true).brotli(true);
        }

        let client = builder
            .build()
            .map_err(|e| NetworkError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Transport configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn fetch_once(&self, request: &PageRequest) -> Result<Value> {
        let mut builder = self
            .client
            .get(request.url.clone())
            .header(header::ACCEPT, "application/json");

        for (key, value) in self.config.headers.iter().chain(request.headers.iter()) {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> Result<Value> {
        let status = response.status();
        classify_status(status)?;

        let bytes = response.bytes().await.map_err(|e| self.map_error(e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn map_error(&self, error: reqwest::Error) -> NetworkError {
        if error.is_timeout() {
            NetworkError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            error.into()
        }
    }
}

/// Map a response status onto the error taxonomy
fn classify_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    Err(NetworkError::Http {
        status: status.as_u16(),
        message: status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    })
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &PageRequest) -> Result<Value> {
        debug!("Fetching: {}", request.url);

        let result = self.fetch_once(request).await;
        if let Err(ref e) = result {
            warn!("Prefetch of {} failed: {}", request.url, e);
        }
        result
    }
}
