//! Request descriptors.

use crate::errors::{PlatformError, PlatformResult};
use crate::template::{self, ArrayEncoding, Params};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// Request body, tagged by the caller.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Serialized as JSON text.
    Json(Value),
    /// Passed through unmodified.
    Binary {
        /// Raw body bytes.
        bytes: Bytes,
        /// Content type sent when the request carries none.
        content_type: Option<String>,
    },
}

impl Payload {
    /// Creates a binary payload.
    pub fn binary(bytes: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self::Binary {
            bytes: bytes.into(),
            content_type: content_type.map(String::from),
        }
    }

    /// Returns true for binary payloads.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary { .. })
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Array encoding for GET query strings.
    pub array_encoding: ArrayEncoding,
    /// Overrides the client timeout for this request.
    pub timeout: Option<Duration>,
}

/// A single logical API call.
///
/// `retry_count` travels with the descriptor across re-authentication
/// attempts and is bounded by `PlatformConfig::max_auth_retries`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Target URL, without the GET query string.
    pub url: String,
    /// HTTP method.
    pub method: Method,
    /// Request body. For GET it becomes the query string.
    pub body: Option<Payload>,
    /// Additional headers.
    pub headers: HeaderMap,
    /// Re-authentication attempts already spent.
    pub retry_count: u32,
    /// Request options.
    pub options: RequestOptions,
}

impl ApiRequest {
    /// Creates a request without a body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            headers: HeaderMap::new(),
            retry_count: 0,
            options: RequestOptions::default(),
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Creates a PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Creates a PATCH request.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    /// Creates a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Creates a HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    /// Sets a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Payload::Json(body));
        self
    }

    /// Sets query parameters. Only meaningful for GET.
    pub fn query(self, params: Params) -> Self {
        self.json(Value::Object(params))
    }

    /// Sets a tagged payload.
    pub fn payload(mut self, payload: Payload) -> Self {
        self.body = Some(payload);
        self
    }

    /// Adds a header.
    pub fn header(mut self, name: &str, value: &str) -> PlatformResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            PlatformError::invalid_argument(format!("Invalid header name {}: {}", name, e))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            PlatformError::invalid_argument(format!("Invalid header value: {}", e))
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the array encoding used for GET query strings.
    pub fn array_encoding(mut self, encoding: ArrayEncoding) -> Self {
        self.options.array_encoding = encoding;
        self
    }

    /// Overrides the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Returns true when the body is binary.
    pub fn is_binary(&self) -> bool {
        self.body.as_ref().map_or(false, Payload::is_binary)
    }

    /// Returns true if the body goes on the wire rather than into the URL.
    pub fn sends_body(&self) -> bool {
        self.method != Method::GET && self.method != Method::HEAD
    }

    /// URL actually requested: for GET the JSON body is appended as a query string.
    pub fn target_url(&self) -> String {
        if self.method != Method::GET {
            return self.url.clone();
        }
        match &self.body {
            Some(Payload::Json(Value::Object(params))) => {
                let query = template::build_query_string(params, &self.options.array_encoding);
                template::append_query(&self.url, &query)
            }
            _ => self.url.clone(),
        }
    }
}
