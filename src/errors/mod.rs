//! Error types for the Platform client.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type alias for Platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Error kinds for categorizing Platform errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformErrorKind {
    // Configuration errors
    /// No way to obtain an access token was configured.
    MissingAuth,
    /// Invalid base URL.
    InvalidBaseUrl,
    /// Invalid configuration.
    InvalidConfiguration,

    // Authentication errors
    /// The token provider resolved to an empty token.
    MissingToken,
    /// Token has expired and the re-authentication budget is spent.
    ExpiredToken,
    /// The authentication collaborator failed to produce a token.
    AuthenticationFailed,
    /// The server rejected the credentials (401).
    Unauthorized,

    // Authorization errors
    /// Access forbidden (403).
    Forbidden,

    // Request errors
    /// Request rejected as malformed (400).
    BadRequest,
    /// Invalid parameter.
    InvalidParameter,
    /// Unprocessable entity (422).
    UnprocessableEntity,

    // Resource errors
    /// Resource not found (404).
    NotFound,
    /// Resource conflict (409).
    Conflict,

    // Network errors
    /// Connection failed.
    ConnectionFailed,
    /// Request timeout.
    Timeout,
    /// Any other transport failure.
    Transport,

    // Server errors
    /// Internal server error (500).
    InternalError,
    /// Bad gateway (502).
    BadGateway,
    /// Service unavailable (503).
    ServiceUnavailable,

    // Response errors
    /// Failed to deserialize response.
    DeserializationError,
    /// Unexpected response format.
    UnexpectedFormat,

    // Domain errors
    /// Operation not allowed in the entity's current state.
    InvalidState,
    /// Invalid argument for a domain operation.
    InvalidArgument,
    /// Link relation absent from the entity's link map.
    LinkNotFound,

    // Generic
    /// Unknown error.
    Unknown,
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAuth => write!(f, "missing_auth"),
            Self::InvalidBaseUrl => write!(f, "invalid_base_url"),
            Self::InvalidConfiguration => write!(f, "invalid_configuration"),
            Self::MissingToken => write!(f, "missing_token"),
            Self::ExpiredToken => write!(f, "expired_token"),
            Self::AuthenticationFailed => write!(f, "authentication_failed"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::InvalidParameter => write!(f, "invalid_parameter"),
            Self::UnprocessableEntity => write!(f, "unprocessable_entity"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Transport => write!(f, "transport"),
            Self::InternalError => write!(f, "internal_error"),
            Self::BadGateway => write!(f, "bad_gateway"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
            Self::DeserializationError => write!(f, "deserialization_error"),
            Self::UnexpectedFormat => write!(f, "unexpected_format"),
            Self::InvalidState => write!(f, "invalid_state"),
            Self::InvalidArgument => write!(f, "invalid_argument"),
            Self::LinkNotFound => write!(f, "link_not_found"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Body of an unsuccessful HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// Parsed JSON error document.
    Json(Value),
    /// Raw text for non-JSON responses.
    Text(String),
    /// A JSON content type whose body could not be parsed.
    Empty,
}

/// Platform API error with detailed information.
#[derive(Error, Debug)]
pub struct PlatformError {
    kind: PlatformErrorKind,
    message: String,
    status_code: Option<u16>,
    body: Option<ErrorBody>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        Ok(())
    }
}

impl PlatformError {
    /// Creates a new Platform error.
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            body: None,
            cause: None,
        }
    }

    /// Sets the HTTP status code.
    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the response body.
    pub fn with_body(mut self, body: ErrorBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> &PlatformErrorKind {
        &self.kind
    }

    /// Gets the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the HTTP status code.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Gets the response body of an HTTP failure.
    pub fn body(&self) -> Option<&ErrorBody> {
        self.body.as_ref()
    }

    /// Gets the parsed JSON error document, if the server sent one.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(ErrorBody::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns true if this error is retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            PlatformErrorKind::ConnectionFailed
                | PlatformErrorKind::Timeout
                | PlatformErrorKind::InternalError
                | PlatformErrorKind::BadGateway
                | PlatformErrorKind::ServiceUnavailable
        )
    }

    /// Returns true for errors raised locally before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self.kind,
            PlatformErrorKind::InvalidState
                | PlatformErrorKind::InvalidArgument
                | PlatformErrorKind::LinkNotFound
                | PlatformErrorKind::MissingToken
        )
    }

    /// Creates an error from an HTTP status code and response body.
    pub fn from_response(status: u16, body: ErrorBody) -> Self {
        let message = match &body {
            ErrorBody::Json(value) => value
                .get("message")
                .or_else(|| value.get("error_description"))
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {} error", status)),
            ErrorBody::Text(text) if !text.is_empty() => text.clone(),
            _ => format!("HTTP {} error", status),
        };

        Self::new(Self::kind_from_status(status), message)
            .with_status(status)
            .with_body(body)
    }

    /// Rebuilds an error shared between several awaiters of one future.
    pub(crate) fn from_shared(error: &PlatformError) -> Self {
        let mut copy = Self::new(error.kind.clone(), error.message.clone());
        copy.status_code = error.status_code;
        copy.body = error.body.clone();
        copy
    }

    /// Maps HTTP status code to error kind.
    fn kind_from_status(status: u16) -> PlatformErrorKind {
        match status {
            400 => PlatformErrorKind::BadRequest,
            401 => PlatformErrorKind::Unauthorized,
            403 => PlatformErrorKind::Forbidden,
            404 => PlatformErrorKind::NotFound,
            409 => PlatformErrorKind::Conflict,
            422 => PlatformErrorKind::UnprocessableEntity,
            500 => PlatformErrorKind::InternalError,
            502 => PlatformErrorKind::BadGateway,
            503 => PlatformErrorKind::ServiceUnavailable,
            _ => PlatformErrorKind::Unknown,
        }
    }

    // Convenience constructors

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::InvalidConfiguration, message)
    }

    /// Creates the fatal empty-token error.
    pub fn missing_token() -> Self {
        Self::new(PlatformErrorKind::MissingToken, "Token is mandatory")
    }

    /// Creates an authentication failure.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::AuthenticationFailed, message)
    }

    /// Creates a domain state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::InvalidState, message)
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::InvalidArgument, message)
    }

    /// Creates a missing link relation error.
    pub fn link_not_found(rel: &str) -> Self {
        Self::new(
            PlatformErrorKind::LinkNotFound,
            format!("Link not found: {}", rel),
        )
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Timeout, message)
    }

    /// Creates a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::DeserializationError, message)
    }

    /// Maps a transport failure, keeping the reqwest error as the cause.
    pub fn transport(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            PlatformErrorKind::Timeout
        } else if error.is_connect() {
            PlatformErrorKind::ConnectionFailed
        } else {
            PlatformErrorKind::Transport
        };
        Self::new(kind, format!("Request failed: {}", error)).with_cause(error)
    }
}
