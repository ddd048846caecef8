//! HTTP transport shared by the provers and the beacon feed.
//!
//! Every response is untrusted: bytes and JSON handed back from here are
//! verified by `oplite-core` before anything derived from them is trusted.
//! Requests carry a bounded timeout so a hung remote errors instead of
//! stalling the sync or the polling loop.

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::trace;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors from network operations.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Failed to build the HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
    /// The request could not be sent or timed out.
    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },
    /// The server answered with a non-success status.
    #[error("HTTP error {status} from {url}")]
    HttpError { url: String, status: u16 },
    /// Failed to read or parse the response body.
    #[error("Body read from {url} failed: {reason}")]
    BodyReadFailed { url: String, reason: String },
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, NetworkError> {
        trace!(%url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    /// Fetch a URL and return the raw body.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        let resp = self.get(url).await?;
        let bytes = resp.bytes().await.map_err(|e| NetworkError::BodyReadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// Fetch a URL and deserialize its JSON body.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, NetworkError> {
        let resp = self.get(url).await?;
        resp.json::<T>().await.map_err(|e| NetworkError::BodyReadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
