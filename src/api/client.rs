//! SPiD HTTP client: request execution and 401 refresh-retry.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace};

use crate::auth::{AccessToken, Credentials, RefreshToken, basic_auth_header, bearer_auth_header};
use crate::error::{AuthError, ConfigError, Error, HttpError};
use crate::types::ServerUrl;

use super::endpoints::{OAUTH_TOKEN, OauthTokenResponse};
use super::{Method, Payload};

/// HTTP client for SPiD endpoints.
///
/// One client instance wraps one server and one resolved [`Credentials`]
/// mode. Every call attaches the matching authorization header, and calls
/// made with a refreshable Bearer token recover from a single 401 by
/// exchanging the refresh token at `/oauth/token` and retrying the original
/// request exactly once.
///
/// # Thread Safety
///
/// Clients are cheap to clone (they use an internal `Arc`) and safe to share
/// across tasks. Token refresh is serialized internally so concurrent calls
/// that hit a 401 at the same time share one refresh round-trip.
///
/// # Example
///
/// ```no_run
/// use spid_client::{ApiClient, AuthOptions, Credentials, Payload, ServerUrl};
///
/// # async fn example() -> Result<(), spid_client::Error> {
/// let server = ServerUrl::new("https://identity.example.com")?;
/// let credentials = Credentials::resolve(AuthOptions {
///     access_token: Some("access-token".to_string()),
///     refresh_token: Some("refresh-token".to_string()),
///     ..AuthOptions::default()
/// })?;
/// let client = ApiClient::new(server, credentials);
///
/// let payload = Payload::new().field("product_id", "prod-1");
/// let response = client.get("/ajax/hasproduct.js", &payload).await?;
/// println!("{response}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    server: ServerUrl,
    http: reqwest::Client,
    auth: AuthState,
    // Serializes refresh round-trips so concurrent 401s do not race.
    refresh_gate: Mutex<()>,
}

enum AuthState {
    Open,
    Basic {
        client_id: String,
        client_secret: String,
    },
    Bearer {
        tokens: RwLock<BearerTokens>,
        scope: Option<String>,
    },
}

struct BearerTokens {
    access: Option<AccessToken>,
    refresh: Option<RefreshToken>,
}

impl From<Credentials> for AuthState {
    fn from(credentials: Credentials) -> Self {
        match credentials {
            Credentials::None => AuthState::Open,
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => AuthState::Basic {
                client_id,
                client_secret,
            },
            Credentials::Bearer {
                access_token,
                refresh_token,
                scope,
            } => AuthState::Bearer {
                tokens: RwLock::new(BearerTokens {
                    access: access_token,
                    refresh: refresh_token,
                }),
                scope,
            },
        }
    }
}

impl ApiClient {
    /// Create a new client for the given server and credentials.
    pub fn new(server: ServerUrl, credentials: Credentials) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("spid-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            inner: Arc::new(ApiClientInner {
                server,
                http,
                auth: AuthState::from(credentials),
                refresh_gate: Mutex::new(()),
            }),
        }
    }

    /// Returns the server URL this client is configured for.
    pub fn server(&self) -> &ServerUrl {
        &self.inner.server
    }

    /// Make a call to the server.
    ///
    /// The method string must be exactly `GET`, `POST` or `DELETE` and the
    /// path must be non-empty; both are checked before any network activity.
    /// On a 401 with a stored refresh token the call refreshes the access
    /// token and retries once.
    #[instrument(skip(self, payload), fields(server = %self.inner.server))]
    pub async fn call(&self, method: &str, path: &str, payload: &Payload) -> Result<Value, Error> {
        let method = Method::parse(method)?;
        if path.is_empty() {
            return Err(ConfigError::EmptyPath.into());
        }

        let auth = self.auth_header().await?;
        match self.execute(method, path, payload, auth.as_deref()).await {
            Err(Error::Http(err)) if err.is_auth_error() => {
                if self.can_refresh().await {
                    debug!("401 response, refreshing access token and retrying once");
                    self.refresh_and_retry(method, path, payload, auth).await
                } else {
                    Err(Error::Http(err))
                }
            }
            other => other,
        }
    }

    /// Make a GET request.
    pub async fn get(&self, path: &str, payload: &Payload) -> Result<Value, Error> {
        self.call("GET", path, payload).await
    }

    /// Make a POST request.
    pub async fn post(&self, path: &str, payload: &Payload) -> Result<Value, Error> {
        self.call("POST", path, payload).await
    }

    /// Make a DELETE request.
    pub async fn delete(&self, path: &str, payload: &Payload) -> Result<Value, Error> {
        self.call("DELETE", path, payload).await
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// The stored access token is updated in place; if the server rotates
    /// the refresh token the stored one is replaced as well.
    ///
    /// # Errors
    ///
    /// Returns an error if no refresh token is stored or the exchange fails.
    #[instrument(skip(self), fields(server = %self.inner.server))]
    pub async fn refresh_access_token(&self) -> Result<(), Error> {
        let AuthState::Bearer { tokens, scope } = &self.inner.auth else {
            return Err(AuthError::RefreshTokenInvalid.into());
        };

        let refresh = {
            let tokens = tokens.read().await;
            tokens.refresh.as_ref().map(|t| t.as_str().to_string())
        };
        let refresh = refresh.ok_or(AuthError::RefreshTokenInvalid)?;

        info!("refreshing access token");

        let payload = Payload::new()
            .field("grant_type", "refresh_token")
            .field("refresh_token", refresh)
            .optional("scope", scope.clone());

        let auth = self.auth_header().await?;
        let value = self
            .execute(Method::Post, OAUTH_TOKEN, &payload, auth.as_deref())
            .await?;
        let response: OauthTokenResponse =
            serde_json::from_value(value).map_err(|e| Error::MalformedResponse {
                status: 200,
                detail: e.to_string(),
            })?;

        {
            let mut tokens = tokens.write().await;
            tokens.access = Some(AccessToken::new(response.access_token));
            if let Some(rotated) = response.refresh_token {
                tokens.refresh = Some(RefreshToken::new(rotated));
            }
        }

        debug!("access token refreshed");
        Ok(())
    }

    /// Export the current access token for persistence.
    ///
    /// # Security
    ///
    /// Handle the returned token securely. It grants access to the account.
    pub async fn export_access_token(&self) -> Option<String> {
        match &self.inner.auth {
            AuthState::Bearer { tokens, .. } => {
                let tokens = tokens.read().await;
                tokens.access.as_ref().map(|t| t.as_str().to_string())
            }
            _ => None,
        }
    }

    async fn can_refresh(&self) -> bool {
        match &self.inner.auth {
            AuthState::Bearer { tokens, .. } => tokens.read().await.refresh.is_some(),
            _ => false,
        }
    }

    async fn refresh_and_retry(
        &self,
        method: Method,
        path: &str,
        payload: &Payload,
        stale_auth: Option<String>,
    ) -> Result<Value, Error> {
        {
            let _gate = self.inner.refresh_gate.lock().await;
            // A concurrent caller may have refreshed while we waited for
            // the gate; skip the redundant round-trip if the stored token
            // already changed.
            if self.auth_header().await? == stale_auth {
                self.refresh_access_token().await?;
            }
        }
        let auth = self.auth_header().await?;
        self.execute(method, path, payload, auth.as_deref()).await
    }

    /// Build the authorization header for the current credentials.
    async fn auth_header(&self) -> Result<Option<String>, Error> {
        match &self.inner.auth {
            AuthState::Open => Ok(None),
            AuthState::Basic {
                client_id,
                client_secret,
            } => Ok(Some(basic_auth_header(client_id, client_secret)?)),
            AuthState::Bearer { tokens, .. } => {
                let tokens = tokens.read().await;
                match &tokens.access {
                    Some(token) => Ok(Some(bearer_auth_header(token.as_str())?)),
                    None => Ok(None),
                }
            }
        }
    }

    /// Issue exactly one network round-trip.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: &Payload,
        auth: Option<&str>,
    ) -> Result<Value, Error> {
        let url = self.inner.server.url(path);
        let pairs = payload.defined();

        let mut request = match method {
            Method::Get => self.inner.http.get(&url),
            Method::Post => self.inner.http.post(&url),
            Method::Delete => self.inner.http.delete(&url),
        };
        if !pairs.is_empty() {
            request = match method {
                Method::Post => request.form(&pairs),
                Method::Get | Method::Delete => request.query(&pairs),
            };
        }
        if let Some(header) = auth {
            request = request.header(AUTHORIZATION, header);
        }

        debug!(%method, %url, authenticated = auth.is_some(), "SPiD request");
        trace!(?pairs, "request payload");

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Handle a response, parsing the body or error.
    async fn handle_response(&self, response: reqwest::Response) -> Result<Value, Error> {
        let status = response.status();
        trace!(status = %status, "SPiD response");

        let body = response.text().await?;
        trace!(body = %body, "response body");

        if status.is_success() {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&body).map_err(|_| Error::MalformedResponse {
                status: status.as_u16(),
                detail: snippet(&body),
            })
        } else {
            let parsed: Value =
                serde_json::from_str(&body).map_err(|_| Error::MalformedResponse {
                    status: status.as_u16(),
                    detail: snippet(&body),
                })?;
            let fields = match parsed {
                Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            let message = status.canonical_reason().unwrap_or("Unknown");
            Err(HttpError::new(status.as_u16(), message, fields).into())
        }
    }
}

// Custom Debug impl that hides credential state
impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("server", &self.inner.server)
            .field("auth", &"[REDACTED]")
            .finish()
    }
}

/// Truncate a response body for error messages.
fn snippet(body: &str) -> String {
    const MAX: usize = 120;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &body[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_client() -> ApiClient {
        let server = ServerUrl::new("https://identity.example.com").unwrap();
        ApiClient::new(server, Credentials::None)
    }

    #[test]
    fn client_creation() {
        let client = open_client();
        assert_eq!(client.server().host(), Some("identity.example.com"));
    }

    #[test]
    fn debug_redacts_auth_state() {
        let server = ServerUrl::new("https://identity.example.com").unwrap();
        let client = ApiClient::new(
            server,
            Credentials::ClientCredentials {
                client_id: "client-1".to_string(),
                client_secret: "s3cret".to_string(),
            },
        );
        let debug = format!("{:?}", client);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn refresh_without_token_fails() {
        let client = open_client();
        let result = client.refresh_access_token().await;
        assert!(matches!(
            result,
            Err(Error::Auth(AuthError::RefreshTokenInvalid))
        ));
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        assert!(snippet(&long).len() < 200);
        assert_eq!(snippet("short"), "short");
    }
}
