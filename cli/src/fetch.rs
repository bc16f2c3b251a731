//! HTTP execution of the URL the guest produced.

use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;

/// Non-fatal failure to fetch a URL.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a GET request.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<FetchResponse, NetworkError>;
}

/// Blocking reqwest client. No retries.
///
/// The client (and its TLS setup) is built on the first fetch.
pub struct HttpFetcher {
    timeout: Duration,
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, NetworkError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchResponse, NetworkError> {
        tracing::debug!(url, "sending GET");
        let response = self.client()?.get(url).send()?;
        let status = response.status();
        let body = response.text()?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }
}
