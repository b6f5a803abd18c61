// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for HTTP communication with the assessment service.
//!
//! Provides a trait-based transport layer that enables:
//! - Real HTTP requests for production ([`HttpTransport`])
//! - Mock transports for unit testing
//!
//! Whatever goes wrong, a transport returns a [`RetryableError`]. Nothing else
//! crosses this boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

use crate::error::RetryableError;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, RetryableError>;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single request against the service, relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    fn new(method: Method, endpoint: impl Into<String>, body: Option<Value>) -> Self {
        Request {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint, None)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, endpoint, Some(body))
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, endpoint, Some(body))
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint, None)
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// Transport trait for request/response communication.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations. Implementations must bound
/// every call with a timeout.
pub trait Transport: Send + Sync {
    /// Issues one request and returns the decoded JSON body.
    fn execute(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Value>> + Send + '_>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Value>> + Send + '_>> {
        (**self).execute(request)
    }
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL every endpoint is joined to.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bearer token supplied by the identity layer, if any.
    pub token: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            base_url: "http://localhost:8000/api".to_string(),
            timeout: DEFAULT_TIMEOUT,
            token: None,
        }
    }
}

/// HTTP transport implementation using reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: TransportConfig) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    async fn send(&self, request: Request) -> TransportResult<(u16, Value)> {
        let mut builder = self
            .client
            .request(request.method.into(), self.url(&request.endpoint))
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        if let Some(ref token) = self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RetryableError::network(format!("network error: {}", e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| RetryableError::network(format!("failed to read response: {}", e)))?;

        if !(200..300).contains(&status) {
            return Err(error_from_response(status, &content_type, &body));
        }
        Ok((status, parse_success_body(&body)?))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Value>> + Send + '_>> {
        Box::pin(async move {
            let method = request.method;
            let endpoint = request.endpoint.clone();
            let started = Instant::now();

            // Dropping the send future on timeout aborts the in-flight request.
            let result = match tokio::time::timeout(self.config.timeout, self.send(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(RetryableError::timeout(self.config.timeout)),
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok((status, _)) => {
                    debug!(method = method.as_str(), %endpoint, status, elapsed_ms, "request ok")
                }
                Err(e) => debug!(
                    method = method.as_str(),
                    %endpoint,
                    status = ?e.status_code,
                    elapsed_ms,
                    error = %e,
                    "request failed"
                ),
            }
            result.map(|(_, body)| body)
        })
    }
}

/// Builds the error for a non-success response.
///
/// JSON bodies contribute their `detail`, `message` or `error` field; anything
/// else is used as plain text.
pub fn error_from_response(status: u16, content_type: &str, body: &str) -> RetryableError {
    let body = body.trim();
    let message = if body.is_empty() {
        None
    } else if content_type.contains("json") {
        match serde_json::from_str::<Value>(body) {
            Ok(json) => Some(message_from_json(&json)),
            Err(_) => Some(body.to_string()),
        }
    } else {
        Some(body.to_string())
    };
    RetryableError::from_status(
        status,
        message.unwrap_or_else(|| format!("HTTP {}", status)),
    )
}

fn message_from_json(json: &Value) -> String {
    for field in ["detail", "message", "error"] {
        match json.get(field) {
            Some(Value::String(s)) => return s.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }
    match json {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes a success body. Empty bodies are `null`.
pub fn parse_success_body(body: &str) -> TransportResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| RetryableError::malformed(format!("malformed response: {}", e)))
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
