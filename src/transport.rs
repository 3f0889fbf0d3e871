//! Network primitive used for store calls and ad-server fetches.

use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// Issues the two kinds of request the cache engine needs.
///
/// A non-success store status must surface as [`CacheError::Transport`]
/// carrying the status and raw body. Any failed fetch surfaces as
/// [`CacheError::Fetch`].
#[async_trait]
pub trait CacheTransport: Send + Sync {
    /// POST a JSON body and return the response body.
    async fn post_json(&self, url: &str, body: String) -> Result<String, CacheError>;

    /// GET a document and return its body.
    async fn get(&self, url: &str) -> Result<String, CacheError>;
}

/// `reqwest`-backed transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn read_body(response: reqwest::Response) -> Result<String, CacheError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CacheError::transport(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(CacheError::transport(Some(status.as_u16()), body));
        }
        Ok(body)
    }
}

#[async_trait]
impl CacheTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: String) -> Result<String, CacheError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|e| CacheError::transport(e.status().map(|s| s.as_u16()), e.to_string()))?;

        Self::read_body(response).await
    }

    async fn get(&self, url: &str) -> Result<String, CacheError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::Fetch(e.to_string()))?;

        Self::read_body(response)
            .await
            .map_err(|e| fetch_error(url, e))
    }
}

fn fetch_error(url: &str, e: CacheError) -> CacheError {
    match e {
        CacheError::Transport {
            status: Some(status),
            body,
        } => CacheError::Fetch(format!("{} returned {}: {}", url, status, body)),
        CacheError::Fetch(_) => e,
        other => CacheError::Fetch(other.to_string()),
    }
}
