//! Transport seam between the helper and the cluster
//!
//! The helper only ever builds [`TransportRequest`] values; how they reach
//! the cluster is up to the [`Transport`] implementation. [`HttpTransport`]
//! speaks the engine's REST API.

mod http;

pub use http::HttpTransport;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Request methods used by the helper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// Newline-delimited JSON (bulk API)
    NdJson(String),
}

/// One request to the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Path segments, unescaped
    pub segments: Vec<String>,
    pub params: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl TransportRequest {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn ndjson(mut self, body: String) -> Self {
        self.body = Some(RequestBody::NdJson(body));
        self
    }

    /// `/a/b/c` rendering, for logs
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Engine reply: status plus decoded body (`Null` when empty)
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body of a 2xx reply, or [`Error::Engine`] carrying the engine's reason
    pub fn into_success(self) -> Result<Value> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(Error::Engine {
                status: self.status,
                reason: error_reason(&self.body),
            })
        }
    }
}

/// Extract a readable reason from an engine error body
pub fn error_reason(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(reason)) => reason.clone(),
        Some(Value::Object(obj)) => obj
            .get("reason")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        Some(other) => other.to_string(),
        None => match body {
            Value::Null => "empty response".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

/// A connection to the cluster, shared by every helper call
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for the reply. Non-2xx replies are
    /// returned as responses, not errors.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// Human-readable endpoint description
    fn describe(&self) -> String;
}
