//! HTTP transport abstraction
//!
//! The client talks to the network through the [`Transport`] trait, which
//! exposes "send a request, get a buffered response" and an explicit
//! shutdown. [`ReqwestTransport`] is the default implementation.
//!
//! A client either owns its transport and shuts it down on
//! [`CouchClient::shutdown`](crate::CouchClient::shutdown), or borrows a
//! caller's shared transport and leaves it running. See [`Ownership`].

use crate::request::HttpMethod;
use crate::response::RawResponse;
use crate::{ClientConfig, Error, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A fully built request, ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Request headers in sending order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<Vec<u8>>,
    /// Timeout for the whole exchange
    pub timeout: Duration,
    /// Ceiling for buffering a body without `Content-Length`
    pub max_body_bytes: usize,
}

impl TransportRequest {
    /// Get a header value by case-insensitive name
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }
}

/// Who is responsible for shutting a transport down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The client created the transport and releases it on shutdown
    Owned,
    /// The caller supplied the transport and keeps managing it
    Shared,
}

/// Sends requests to the server
///
/// Transport failures are returned as-is; classifying responses is the
/// caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and buffer the whole response
    async fn send(&self, request: TransportRequest) -> Result<RawResponse>;

    /// Release the transport's resources
    async fn shutdown(&self) -> Result<()>;
}

/// Number of body bytes to buffer for a response
///
/// The declared `Content-Length` wins; without one the configured ceiling
/// applies.
pub fn body_limit(content_length: Option<u64>, max_body_bytes: usize) -> usize {
    content_length
        .map(|length| usize::try_from(length).unwrap_or(usize::MAX))
        .unwrap_or(max_body_bytes)
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug)]
pub struct ReqwestTransport {
    /// HTTP client
    client: reqwest::Client,
    /// Set once shutdown has been requested
    closed: AtomicBool,
}

impl ReqwestTransport {
    /// Create a transport from the client configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self::from_client(client))
    }

    /// Wrap an existing `reqwest` client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    /// Check whether shutdown has been requested
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Read the body in chunks, stopping at `limit` bytes
    async fn read_body(response: &mut reqwest::Response, limit: usize) -> Result<Vec<u8>> {
        let mut body = Vec::new();

        while let Some(chunk) = response.chunk().await? {
            let remaining = limit - body.len();
            if chunk.len() > remaining {
                body.extend_from_slice(&chunk[..remaining]);
                tracing::warn!(limit, "response body truncated at buffering limit");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let mut req = self
            .client
            .request(request.method.as_reqwest(), &request.url)
            .timeout(request.timeout);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        let mut response = req.send().await?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let limit = body_limit(response.content_length(), request.max_body_bytes);
        let body = Self::read_body(&mut response, limit).await?;

        Ok(RawResponse::new(status, headers, body))
    }

    async fn shutdown(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("reqwest transport shut down");
        }
        Ok(())
    }
}

/// Flatten response headers, keeping the first value of repeated names
fn collect_headers(map: &HeaderMap) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (key, value) in map {
        if let Ok(value_str) = value.to_str() {
            headers
                .entry(key.as_str().to_string())
                .or_insert_with(|| value_str.to_string());
        }
    }
    headers
}
