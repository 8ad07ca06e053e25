//! Credential resolution for SPiD endpoints.
//!
//! SPiD endpoints come in three flavors: open (no auth), server-to-server
//! (Basic auth with client id and secret) and user (Bearer token with an
//! optional refresh token). [`Credentials::resolve`] classifies a set of
//! options into exactly one of those modes, or fails when the options are
//! ambiguous or malformed.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::error::{ConfigError, Error};

use super::tokens::{AccessToken, RefreshToken};

/// Default minimum accepted token length.
const DEFAULT_TOKEN_MIN_LENGTH: usize = 2;

/// Credential options, as supplied at client construction.
///
/// The client-credentials fields and the bearer-token fields are mutually
/// exclusive; leave everything unset for open endpoints.
///
/// # Example
///
/// ```
/// use spid_client::{AuthOptions, Credentials};
///
/// let credentials = Credentials::resolve(AuthOptions {
///     client_id: Some("client-1".to_string()),
///     client_secret: Some("s3cret".to_string()),
///     ..AuthOptions::default()
/// }).unwrap();
/// assert!(matches!(credentials, Credentials::ClientCredentials { .. }));
/// ```
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Client id obtained from SPiD self service.
    pub client_id: Option<String>,
    /// Client secret obtained from SPiD self service.
    pub client_secret: Option<String>,
    /// Access token obtained from exchanging a code (or user/pass).
    pub access_token: Option<String>,
    /// Refresh token used to get a new access token on a 401.
    pub refresh_token: Option<String>,
    /// Optional scope passed along with token refresh requests.
    pub scope: Option<String>,
    /// Minimum accepted token length.
    pub token_min_length: usize,
    /// Maximum accepted token length, unbounded when `None`.
    pub token_max_length: Option<usize>,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            access_token: None,
            refresh_token: None,
            scope: None,
            token_min_length: DEFAULT_TOKEN_MIN_LENGTH,
            token_max_length: None,
        }
    }
}

/// The resolved authentication mode for a client instance.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// No authentication; open endpoints only.
    None,
    /// Server-to-server Basic auth.
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    /// User Bearer token, optionally refreshable.
    Bearer {
        access_token: Option<AccessToken>,
        refresh_token: Option<RefreshToken>,
        scope: Option<String>,
    },
}

impl Credentials {
    /// Classify a set of options into an authentication mode.
    ///
    /// # Errors
    ///
    /// Fails when both client-credentials and bearer fields are present,
    /// when only one of `client_id`/`client_secret` is supplied, or when a
    /// supplied token does not pass the format check.
    pub fn resolve(options: AuthOptions) -> Result<Self, Error> {
        let has_client_credentials =
            options.client_id.is_some() || options.client_secret.is_some();
        let has_bearer = options.access_token.is_some() || options.refresh_token.is_some();

        if has_client_credentials && has_bearer {
            return Err(ConfigError::AmbiguousCredentials.into());
        }

        if has_client_credentials {
            let (Some(client_id), Some(client_secret)) =
                (options.client_id, options.client_secret)
            else {
                return Err(ConfigError::IncompleteClientCredentials.into());
            };
            if client_id.is_empty() || client_secret.is_empty() {
                return Err(ConfigError::IncompleteClientCredentials.into());
            }
            return Ok(Credentials::ClientCredentials {
                client_id,
                client_secret,
            });
        }

        if has_bearer {
            let bounds = (options.token_min_length, options.token_max_length);
            let access_token = options
                .access_token
                .map(|t| checked_token("accessToken", t, bounds))
                .transpose()?
                .map(AccessToken::new);
            let refresh_token = options
                .refresh_token
                .map(|t| checked_token("refreshToken", t, bounds))
                .transpose()?
                .map(RefreshToken::new);
            return Ok(Credentials::Bearer {
                access_token,
                refresh_token,
                scope: options.scope,
            });
        }

        Ok(Credentials::None)
    }
}

/// Validate a token string against the configured length bounds.
fn checked_token(
    field: &'static str,
    token: String,
    (min, max): (usize, Option<usize>),
) -> Result<String, Error> {
    if token.len() < min {
        return Err(ConfigError::InvalidToken {
            field,
            reason: format!("must be at least {min} characters"),
        }
        .into());
    }
    if let Some(max) = max
        && token.len() > max
    {
        return Err(ConfigError::InvalidToken {
            field,
            reason: format!("must be at most {max} characters"),
        }
        .into());
    }
    Ok(token)
}

/// Build a Basic authorization header value from a client id and secret.
///
/// # Example
///
/// ```
/// use spid_client::basic_auth_header;
///
/// let header = basic_auth_header("Aladdin", "OpenSesame").unwrap();
/// assert_eq!(header, "Basic QWxhZGRpbjpPcGVuU2VzYW1l");
/// ```
pub fn basic_auth_header(user: &str, pass: &str) -> Result<String, Error> {
    if user.is_empty() {
        return Err(ConfigError::InvalidToken {
            field: "clientId",
            reason: "must be a non-empty string".to_string(),
        }
        .into());
    }
    let encoded = BASE64_STANDARD.encode(format!("{user}:{pass}"));
    Ok(format!("Basic {encoded}"))
}

/// Build a Bearer authorization header value from a token.
pub fn bearer_auth_header(token: &str) -> Result<String, Error> {
    if token.is_empty() {
        return Err(ConfigError::InvalidToken {
            field: "accessToken",
            reason: "must be a non-empty string".to_string(),
        }
        .into());
    }
    Ok(format!("Bearer {token}"))
}
