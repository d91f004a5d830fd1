//! # HTTP Transport
//!
//! Thin wrapper around a shared [`reqwest::Client`] providing the three
//! request shapes the registry client needs:
//!
//! - [`HttpClient::get`]: GET with headers, non-200 is an error
//! - [`HttpClient::get_json`]: GET + JSON decode into a typed value
//! - [`HttpClient::get_with_cancel`]: GET honoring a cooperative
//!   cancellation token
//!
//! One client instance is reused per process so connections are pooled by
//! reqwest. No retries and no redirect policy beyond the library default.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// Shared HTTP client for registry requests.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Creates a new client with the crate's default user agent.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::default_user_agent())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Returns the `User-Agent` value sent with every request.
    pub fn default_user_agent() -> &'static str {
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
    }

    /// Performs a GET request with the given headers.
    ///
    /// Fails with [`Error::Network`] when no status line was received and
    /// with [`Error::Http`] for any status other than 200.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<reqwest::Response> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| Error::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(Error::Http {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }

    /// Performs a GET request, aborting promptly when `cancel` fires.
    ///
    /// On cancellation the in-flight request future is dropped, which
    /// releases the underlying socket.
    pub async fn get_with_cancel(
        &self,
        cancel: &CancellationToken,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            response = self.get(url, headers) => response,
        }
    }

    /// Performs a GET request and decodes the response body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.get(url, headers).await?;
        let body = Self::read_body(url, response).await?;

        serde_json::from_slice(&body).map_err(|e| Error::Decode {
            what: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Reads a full response body, honoring the cancellation token while
    /// the transfer is in progress.
    pub async fn read_body_with_cancel(
        cancel: &CancellationToken,
        url: &str,
        response: reqwest::Response,
    ) -> Result<Vec<u8>> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            body = Self::read_body(url, response) => body,
        }
    }

    /// Reads a full response body into memory.
    pub async fn read_body(url: &str, response: reqwest::Response) -> Result<Vec<u8>> {
        let bytes = response.bytes().await.map_err(|e| Error::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}
