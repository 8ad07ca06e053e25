//! SPiD server URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{ConfigError, Error};

/// A validated SPiD server base URL.
///
/// This type ensures the URL is absolute with an http(s) scheme and a host,
/// and is normalized for endpoint construction.
///
/// # Example
///
/// ```
/// use spid_client::ServerUrl;
///
/// let server = ServerUrl::new("https://payment.schibsted.no").unwrap();
/// assert_eq!(server.url("/ajax/hasSession.js"),
///            "https://payment.schibsted.no/ajax/hasSession.js");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerUrl(Url);

impl ServerUrl {
    /// Create a new server URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is relative, has no host, or uses a
    /// scheme other than http/https.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| ConfigError::InvalidUrl {
            name: "server",
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        // Normalize: remove trailing slash
        let normalized = if url.path() == "/" {
            let mut u = url.clone();
            u.set_path("");
            u
        } else {
            url
        };

        Ok(Self(normalized))
    }

    /// Returns the full URL string for an endpoint path like
    /// `/ajax/hasSession.js`.
    pub fn url(&self, path: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        format!("{}{}", base, path)
    }

    /// Returns the URL for an endpoint path as a parsed [`Url`], ready for
    /// query-parameter appending.
    pub fn endpoint(&self, path: &str) -> Url {
        // Paths are crate-internal constants; join only fails for
        // cannot-be-a-base URLs, which validation rules out.
        self.0.join(path).expect("validated base URL")
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                name: "server",
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        let scheme = url.scheme();
        if scheme != "https" && scheme != "http" {
            return Err(ConfigError::InvalidUrl {
                name: "server",
                value: original.to_string(),
                reason: "must use http or https".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                name: "server",
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ServerUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServerUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ServerUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_https_url() {
        let server = ServerUrl::new("https://identity.example.com").unwrap();
        assert_eq!(server.host(), Some("identity.example.com"));
    }

    #[test]
    fn valid_http_dev_url() {
        let server = ServerUrl::new("http://spp.dev").unwrap();
        assert_eq!(server.host(), Some("spp.dev"));
    }

    #[test]
    fn endpoint_url_construction() {
        let server = ServerUrl::new("https://identity.example.com").unwrap();
        assert_eq!(
            server.url("/ajax/hasSession.js"),
            "https://identity.example.com/ajax/hasSession.js"
        );
    }

    #[test]
    fn normalizes_trailing_slash() {
        let server = ServerUrl::new("https://identity.example.com/").unwrap();
        assert_eq!(
            server.url("/oauth/token"),
            "https://identity.example.com/oauth/token"
        );
    }

    #[test]
    fn invalid_scheme() {
        assert!(ServerUrl::new("ftp://identity.example.com").is_err());
    }

    #[test]
    fn invalid_relative_url() {
        assert!(ServerUrl::new("/ajax/hasSession.js").is_err());
    }
}
