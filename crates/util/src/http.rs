//! Blocking HTTP client abstraction.
//!
//! Plugins talk to provider catalogs through [`HttpClient`] so tests can swap
//! in canned responses. The production implementation wraps a blocking
//! `reqwest` client; exactly one request is in flight at a time.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::redact_sensitive;

/// Errors raised by HTTP transports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("invalid response body from {url}: {message}")]
    Decode { url: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// An outbound request description, independent of the transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
    pub json_body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            json_body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value, HttpError> {
        serde_json::from_slice(&self.body).map_err(|error| HttpError::Decode {
            url: redact_sensitive(&self.url),
            message: error.to_string(),
        })
    }
}

/// Trait for HTTP client operations.
///
/// Implementations must return [`HttpError::Status`] for non-success statuses
/// so callers never have to inspect the status themselves.
pub trait HttpClient: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with a 30 second timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("eogate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| HttpError::Client(error.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, request.url.as_str());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((username, password)) = &request.basic_auth {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let redacted_url = redact_sensitive(&request.url);
        debug!(url = %redacted_url, method = ?request.method, query_count = request.query.len(), "http request started");
        let response = builder.send().map_err(|error| HttpError::Transport {
            url: redacted_url.clone(),
            message: redact_sensitive(&error.to_string()),
        })?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: redact_sensitive(&final_url),
            });
        }
        let body = response.bytes().map_err(|error| HttpError::Transport {
            url: redacted_url,
            message: error.to_string(),
        })?;
        debug!(status = status.as_u16(), byte_count = body.len(), "http request completed");
        Ok(HttpResponse {
            status: status.as_u16(),
            url: final_url,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builders_accumulate_request_parts() {
        let request = HttpRequest::get("https://catalog.example.com/search")
            .with_query("page", "2")
            .with_header("Accept", "application/json")
            .with_basic_auth("user", "secret");
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.basic_auth, Some(("user".to_string(), "secret".to_string())));
    }

    #[test]
    fn json_decode_errors_redact_urls() {
        let response = HttpResponse {
            status: 200,
            url: "https://catalog.example.com/search?apikey=abc".to_string(),
            body: b"not json".to_vec(),
        };
        let error = response.json().expect_err("invalid json");
        let message = error.to_string();
        assert!(!message.contains("abc"), "secret leaked: {message}");
    }

    #[test]
    fn json_decodes_valid_bodies() {
        let response = HttpResponse {
            status: 200,
            url: "https://catalog.example.com".to_string(),
            body: br#"{"features": []}"#.to_vec(),
        };
        assert_eq!(response.json().expect("valid json"), json!({"features": []}));
    }
}
