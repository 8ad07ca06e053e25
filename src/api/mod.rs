//! HTTP request primitives and the SPiD API client.

pub mod client;
pub mod endpoints;

pub use client::ApiClient;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;

/// Supported request methods.
///
/// SPiD endpoints only ever use these three; anything else is rejected
/// before a request is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    /// Parse a method string. The match is case-sensitive and exact.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            other => Err(ConfigError::InvalidMethod {
                value: other.to_string(),
            }),
        }
    }

    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request payload: an ordered mapping of field names to optional values.
///
/// Fields recorded with no value are dropped before transmission, so callers
/// can thread optional parameters through without filtering them first. For
/// `POST` the defined fields become a form-urlencoded body; for `GET` and
/// `DELETE` they become the query string.
///
/// # Example
///
/// ```
/// use spid_client::Payload;
///
/// let payload = Payload::new()
///     .field("product_id", "prod-1")
///     .optional("redirect_uri", None::<String>);
/// assert_eq!(payload.defined(), vec![("product_id", "prod-1")]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Payload {
    entries: BTreeMap<String, Option<String>>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with a value.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), Some(value.into()));
        self
    }

    /// Add a field that may have no value. Undefined fields are never
    /// transmitted.
    pub fn optional(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.entries.insert(key.into(), value.map(Into::into));
        self
    }

    /// The defined key/value pairs, in key order.
    pub fn defined(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
            .collect()
    }

    /// True when no defined fields remain.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_methods() {
        assert_eq!(Method::parse("GET").unwrap(), Method::Get);
        assert_eq!(Method::parse("POST").unwrap(), Method::Post);
        assert_eq!(Method::parse("DELETE").unwrap(), Method::Delete);
    }

    #[test]
    fn rejects_unknown_and_lowercase_methods() {
        assert!(Method::parse("PUT").is_err());
        assert!(Method::parse("get").is_err());
        assert!(Method::parse("").is_err());
    }

    #[test]
    fn undefined_fields_are_dropped() {
        let payload = Payload::new()
            .field("a", "1")
            .optional("b", None::<String>)
            .optional("c", Some("3"));
        assert_eq!(payload.defined(), vec![("a", "1"), ("c", "3")]);
    }

    #[test]
    fn payload_with_only_undefined_fields_is_empty() {
        let payload = Payload::new().optional("a", None::<String>);
        assert!(payload.is_empty());
        assert!(payload.defined().is_empty());
    }
}
