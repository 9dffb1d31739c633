//! HTTP transport used by the propensity client.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use url::Url;

/// Errors produced by the SDK HTTP transport.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Issues credentialed `GET` requests and returns the response body.
///
/// The propensity client only ever talks to its endpoint through this trait,
/// which lets tests record outbound URLs instead of hitting the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: Url) -> Result<Bytes, ClientError>;
}

/// [`Fetcher`] backed by `reqwest`.
///
/// The default client keeps a cookie store so cookies set by the endpoint are
/// sent back on later requests.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .cookie_store(true)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: Url) -> Result<Bytes, ClientError> {
        let resp = self.http.get(url).send().await?;
        read_body(resp).await
    }
}

async fn read_body(resp: reqwest::Response) -> Result<Bytes, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    Ok(resp.bytes().await?)
}
