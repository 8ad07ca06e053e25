//! Error types for the spid-client library.
//!
//! This module provides a unified error type with explicit variants for
//! configuration, transport, HTTP and authentication failures.

use std::fmt;
use thiserror::Error;

/// The unified error type for SPiD client operations.
///
/// Configuration errors surface before any network activity; transport and
/// HTTP errors surface as rejected futures from the API calls that produced
/// them.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid constructor or call arguments. Raised before any I/O happens.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network transport errors (connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A non-2xx response from the SPiD server.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Authentication errors (missing or invalid refresh token).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The server returned a body that could not be parsed as JSON.
    #[error("malformed response (HTTP {status}): {detail}")]
    MalformedResponse { status: u16, detail: String },
}

/// Invalid constructor or call arguments.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Request method outside the supported set.
    #[error("method must be one of GET | POST | DELETE but it is \"{value}\"")]
    InvalidMethod { value: String },

    /// Request path was empty.
    #[error("pathname must be a non-empty string")]
    EmptyPath,

    /// Both client-credentials and bearer-token fields were supplied.
    #[error("accessToken/refreshToken cannot be present when clientId and clientSecret are present")]
    AmbiguousCredentials,

    /// Only one of clientId/clientSecret was supplied.
    #[error("clientId and clientSecret must both be present")]
    IncompleteClientCredentials,

    /// A token failed the format check.
    #[error("invalid {field}: {reason}")]
    InvalidToken { field: &'static str, reason: String },

    /// An option that must be a URL did not parse as one.
    #[error("invalid {name} URL '{value}': {reason}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The autologin parameter accepts only 0 or 1.
    #[error("invalid autologin value: \"{value}\"")]
    InvalidAutologin { value: u8 },
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Other transport failure surfaced by the HTTP client.
    #[error("{message}")]
    Other { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Other {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A token refresh was requested but no refresh token is stored.
    #[error("refresh token missing or invalid")]
    RefreshTokenInvalid,
}

/// A non-2xx response from the server.
///
/// The message is the canonical HTTP status text and `fields` holds whatever
/// the server put in the error body. A `code` field in the body overrides the
/// transport-level status, which is why callers should prefer [`HttpError::code`]
/// over reading `status` directly.
#[derive(Debug)]
pub struct HttpError {
    /// Transport-level HTTP status code.
    pub status: u16,
    /// HTTP status text.
    pub message: String,
    /// Fields merged from the server's JSON error body.
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl HttpError {
    /// Create a new HTTP error.
    pub fn new(
        status: u16,
        message: impl Into<String>,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            fields,
        }
    }

    /// The effective error code: the body's `code` field when the server
    /// supplied one, the HTTP status otherwise.
    pub fn code(&self) -> u16 {
        self.fields
            .get("code")
            .and_then(serde_json::Value::as_u64)
            .map(|code| code as u16)
            .unwrap_or(self.status)
    }

    /// Look up a string field from the server error body.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(serde_json::Value::as_str)
    }

    /// Check if this error represents a failed authentication.
    pub fn is_auth_error(&self) -> bool {
        self.code() == 401
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} ({})", self.code(), self.message)?;
        if let Some(error) = self.field("error") {
            write!(f, " [{}]", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_code_overrides_http_status() {
        let mut fields = serde_json::Map::new();
        fields.insert("code".to_string(), json!(409));
        let err = HttpError::new(400, "Bad Request", fields);
        assert_eq!(err.status, 400);
        assert_eq!(err.code(), 409);
    }

    #[test]
    fn code_defaults_to_http_status() {
        let err = HttpError::new(503, "Service Unavailable", serde_json::Map::new());
        assert_eq!(err.code(), 503);
    }

    #[test]
    fn display_includes_server_error_field() {
        let mut fields = serde_json::Map::new();
        fields.insert("error".to_string(), json!("LoginException"));
        let err = HttpError::new(401, "Unauthorized", fields);
        let text = err.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("LoginException"));
    }

    #[test]
    fn auth_error_detection() {
        let err = HttpError::new(401, "Unauthorized", serde_json::Map::new());
        assert!(err.is_auth_error());
        let err = HttpError::new(500, "Internal Server Error", serde_json::Map::new());
        assert!(!err.is_auth_error());
    }
}
