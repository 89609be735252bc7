// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP seam between the pipeline and remote systems.
//!
//! Every call to the HR source and to a destination goes through
//! [`HttpTransport`]. Production uses [`ReqwestTransport`]; tests script
//! responses with their own implementation.
//!
//! A transport only reports what happened on the wire: a response with any
//! status is `Ok`, and only timeouts and connection failures are errors.
//! [`TransportResponse::error_for_status`] turns non-2xx into
//! [`IntegrationError::Http`].

use crate::error::{IntegrationError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Type alias for boxed async futures (keeps trait signatures readable).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Add a header. Values that are not valid header text are dropped with a warning.
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(HeaderName::from_static(name), v);
            }
            Err(_) => warn!(header = name, url = %self.url, "Header value is not valid HTTP text, dropped"),
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Header value as text, for logging and tests.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with [`IntegrationError::Http`] unless the status is 2xx.
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(IntegrationError::http(self.status, url, truncate(&self.body, 512)))
        }
    }

    /// Parse the body as JSON. An empty body is `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Sends requests to remote systems.
pub trait HttpTransport: Send + Sync + 'static {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResponse>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResponse> {
        Box::pin(async move {
            let url = request.url.clone();
            let mut builder = self
                .client
                .request(request.method.clone(), &request.url)
                .headers(request.headers)
                .timeout(request.timeout);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            debug!(method = %request.method, url = %url, "Sending request");
            let response = builder.send().await.map_err(|e| map_reqwest_error(&url, e))?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| map_reqwest_error(&url, e))?;
            Ok(TransportResponse { status, body })
        })
    }
}

fn map_reqwest_error(url: &str, error: reqwest::Error) -> IntegrationError {
    if error.is_timeout() {
        IntegrationError::Timeout {
            url: url.to_string(),
        }
    } else {
        IntegrationError::Connection {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
