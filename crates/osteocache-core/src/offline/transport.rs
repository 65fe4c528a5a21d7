//! The network side of the offline cache.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::error::FetchError;
use super::request::{Request, Response};

/// Performs live fetches for the offline cache.
///
/// An `Err` means no response arrived at all; HTTP error statuses come back
/// as `Ok` responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// HTTP request timeout in seconds, enforced by the client itself.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// `Transport` over HTTP against the application origin.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    origin: Url,
}

impl HttpTransport {
    pub fn new(origin: &str) -> Result<Self, FetchError> {
        let origin = Url::parse(origin).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", origin, e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        self.origin
            .join(url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = self.resolve(&request.url)?;
        debug!(method = %request.method, url = %url, "Live fetch");

        let response = self
            .client
            .request(request.method.clone(), url)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            url: request.url.clone(),
            status,
            headers,
            body,
        })
    }
}
