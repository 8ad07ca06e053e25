//! The high-level SPiD client.
//!
//! [`Spid`] ties the pieces together: the HTTP client for authenticated
//! calls, the session diff engine for change events, a pluggable persistence
//! backend for session polling, and the URL builders for browser-facing
//! links.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, instrument, warn};

use crate::api::endpoints::{self, EntitlementResponse};
use crate::api::{ApiClient, Payload};
use crate::auth::{AuthOptions, Credentials};
use crate::error::Error;
use crate::persist::{MemoryCache, NullPersistence, Persistence};
use crate::session::{DiffState, SessionEvent, SessionState, diff};
use crate::types::ServerUrl;
use crate::urls::Urls;

/// Events buffered per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Default TTL for persisted sessions without an `expiresIn` field.
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(300);

/// Configuration for a [`Spid`] instance.
pub struct SpidOptions {
    /// The SPiD identity server.
    pub server: ServerUrl,
    /// The payment server hosting the checkout flow. Defaults to `server`.
    pub payment_server: Option<ServerUrl>,
    /// Client id, included in every browser-facing URL.
    pub client_id: Option<String>,
    /// Redirect URI, included in every browser-facing URL.
    pub redirect_uri: Option<String>,
    /// API credentials.
    pub auth: AuthOptions,
    /// Session persistence backend. Defaults to [`NullPersistence`].
    pub persistence: Option<Box<dyn Persistence>>,
    /// Poll the session cluster instead of the primary session endpoint.
    pub use_session_cluster: bool,
    /// TTL for persisted sessions whose response lacks `expiresIn`.
    pub session_ttl: Duration,
    /// TTL for cached entitlement responses. `None` disables the cache.
    pub entitlement_cache_ttl: Option<Duration>,
}

impl SpidOptions {
    /// Options for the given server, with everything else at its default.
    pub fn new(server: ServerUrl) -> Self {
        Self {
            server,
            payment_server: None,
            client_id: None,
            redirect_uri: None,
            auth: AuthOptions::default(),
            persistence: None,
            use_session_cluster: false,
            session_ttl: DEFAULT_SESSION_TTL,
            entitlement_cache_ttl: None,
        }
    }
}

/// The result of a product or subscription entitlement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    /// The checked product id.
    pub product_id: String,
    /// Whether the logged-in user holds the entitlement.
    pub result: bool,
}

/// Diff bookkeeping, mutated after each session poll.
struct Tracking {
    diff: DiffState,
    previous: SessionState,
}

/// The SPiD client.
///
/// # Example
///
/// ```no_run
/// use spid_client::{ServerUrl, Spid, SpidOptions};
/// use tokio_stream::StreamExt;
///
/// # async fn example() -> Result<(), spid_client::Error> {
/// let server = ServerUrl::new("https://identity.example.com")?;
/// let spid = Spid::new(SpidOptions {
///     client_id: Some("client-1".to_string()),
///     redirect_uri: Some("https://app.example.com/callback".to_string()),
///     ..SpidOptions::new(server)
/// })?;
///
/// let mut events = spid.subscribe();
/// let session = spid.has_session().await?;
/// if session.is_logged_in() {
///     println!("hello, {}", session.user_id.unwrap());
/// }
/// while let Some(Ok(event)) = events.next().await {
///     println!("session event on {}", event.channel());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Spid {
    api: ApiClient,
    urls: Urls,
    persist: Box<dyn Persistence>,
    cache: Option<MemoryCache>,
    tracking: Mutex<Tracking>,
    events: broadcast::Sender<SessionEvent>,
    use_session_cluster: bool,
    session_ttl: Duration,
}

impl Spid {
    /// Create a client from options.
    ///
    /// # Errors
    ///
    /// Fails when the supplied credentials are ambiguous or malformed.
    pub fn new(options: SpidOptions) -> Result<Self, Error> {
        let credentials = Credentials::resolve(options.auth)?;
        let payment_server = options.payment_server.unwrap_or_else(|| options.server.clone());
        let urls = Urls::new(
            options.server.clone(),
            payment_server,
            options.client_id,
            options.redirect_uri,
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            api: ApiClient::new(options.server, credentials),
            urls,
            persist: options
                .persistence
                .unwrap_or_else(|| Box::new(NullPersistence)),
            cache: options.entitlement_cache_ttl.map(MemoryCache::new),
            tracking: Mutex::new(Tracking {
                diff: DiffState::new(),
                previous: SessionState::default(),
            }),
            events,
            use_session_cluster: options.use_session_cluster,
            session_ttl: options.session_ttl,
        })
    }

    /// The underlying HTTP client, for calls this facade does not cover.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The URL builders for browser-facing links.
    pub fn urls(&self) -> &Urls {
        &self.urls
    }

    /// Subscribe to session change events.
    ///
    /// Events fired before the subscription are not replayed, and a
    /// subscriber that falls too far behind observes a lag error on the
    /// stream.
    pub fn subscribe(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    /// Look up the current session.
    ///
    /// A non-expired persisted session short-circuits the lookup without any
    /// network call; this trades staleness for latency. Otherwise the
    /// session endpoint is polled, the response persisted (when the lookup
    /// succeeded), and change events emitted for the transition from the
    /// previously observed session.
    #[instrument(skip(self))]
    pub async fn has_session(&self) -> Result<SessionState, Error> {
        if let Some(cached) = self.persist.get() {
            debug!("returning persisted session");
            return Ok(cached);
        }

        let value = match self.fetch_session().await {
            Ok(value) => value,
            Err(err) => {
                self.emit(SessionEvent::Error {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };
        let session: SessionState =
            serde_json::from_value(value).map_err(|e| Error::MalformedResponse {
                status: 200,
                detail: e.to_string(),
            })?;

        if session.result == Some(true) {
            let ttl = session
                .expires_in
                .and_then(|secs| u64::try_from(secs).ok())
                .map(Duration::from_secs)
                .unwrap_or(self.session_ttl);
            self.persist.set(&session, ttl);
        }

        let events = {
            let mut tracking = self.tracking.lock().expect("tracking lock poisoned");
            let tracking = &mut *tracking;
            let events = diff(&tracking.previous, &session, &mut tracking.diff);
            tracking.previous = session.clone();
            events
        };
        for event in events {
            self.emit(event);
        }

        Ok(session)
    }

    /// One session poll, with the cluster-to-primary fallback.
    async fn fetch_session(&self) -> Result<Value, Error> {
        let payload = Payload::new().field("autologin", "1");
        if !self.use_session_cluster {
            return self.api.get(endpoints::SESSION, &payload).await;
        }
        match self.api.get(endpoints::SESSION_CLUSTER, &payload).await {
            Err(Error::Http(err)) if err.field("type") == Some("LoginException") => {
                // The cluster rejects autologin for some login states; the
                // primary endpoint still answers.
                warn!("session cluster raised a login exception, retrying the primary endpoint");
                self.api.get(endpoints::SESSION, &payload).await
            }
            other => other,
        }
    }

    /// Check whether the logged-in user has access to a product.
    ///
    /// Positive results are cached by product id when the entitlement cache
    /// is enabled.
    #[instrument(skip(self))]
    pub async fn has_product(&self, product_id: &str) -> Result<Entitlement, Error> {
        self.entitlement(endpoints::HAS_PRODUCT, "prd_", product_id)
            .await
    }

    /// Check whether the logged-in user has an active subscription for a
    /// product.
    #[instrument(skip(self))]
    pub async fn has_subscription(&self, product_id: &str) -> Result<Entitlement, Error> {
        self.entitlement(endpoints::HAS_SUBSCRIPTION, "sub_", product_id)
            .await
    }

    async fn entitlement(
        &self,
        path: &str,
        key_prefix: &str,
        product_id: &str,
    ) -> Result<Entitlement, Error> {
        let cache_key = format!("{key_prefix}{product_id}");
        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get(&cache_key)
        {
            debug!(%cache_key, "returning cached entitlement");
            let response: EntitlementResponse =
                serde_json::from_value(cached).map_err(|e| Error::MalformedResponse {
                    status: 200,
                    detail: e.to_string(),
                })?;
            return Ok(Entitlement {
                product_id: product_id.to_string(),
                result: response.result,
            });
        }

        let payload = Payload::new().field("product_id", product_id);
        let value = self.api.get(path, &payload).await?;
        let response: EntitlementResponse =
            serde_json::from_value(value.clone()).map_err(|e| Error::MalformedResponse {
                status: 200,
                detail: e.to_string(),
            })?;

        if response.result
            && let Some(cache) = &self.cache
        {
            cache.set(cache_key, value, None);
        }

        Ok(Entitlement {
            product_id: product_id.to_string(),
            result: response.result,
        })
    }

    /// Log the user out, clear all client-side session data and emit a
    /// [`SessionEvent::Logout`].
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), Error> {
        self.api.get(endpoints::LOGOUT, &Payload::new()).await?;
        self.clear_client_data();

        let current = SessionState::default();
        {
            let mut tracking = self.tracking.lock().expect("tracking lock poisoned");
            tracking.previous = current.clone();
        }
        self.emit(SessionEvent::Logout(current));
        Ok(())
    }

    /// Accept the user agreement, then re-poll the session.
    ///
    /// Client-side session data is cleared first so the poll observes the
    /// post-acceptance state.
    #[instrument(skip(self))]
    pub async fn accept_agreement(&self) -> Result<SessionState, Error> {
        self.api
            .get(endpoints::ACCEPT_AGREEMENT, &Payload::new())
            .await?;
        self.clear_client_data();
        self.has_session().await
    }

    /// Submit visitor traits.
    #[instrument(skip(self, traits))]
    pub async fn set_traits(&self, traits: &str) -> Result<(), Error> {
        self.api
            .get(endpoints::TRAITS, &Payload::new().field("t", traits))
            .await?;
        Ok(())
    }

    /// The login flow URL for a browser.
    pub fn login_url(&self, login_type: &str, redirect_uri: Option<&str>) -> String {
        self.urls.login(login_type, redirect_uri)
    }

    /// The signup flow URL for a browser.
    pub fn signup_url(&self, login_type: &str, redirect_uri: Option<&str>) -> String {
        self.urls.signup(login_type, redirect_uri)
    }

    /// The checkout flow URL for a paylink.
    pub fn purchase_url(&self, paylink: &str, redirect_uri: Option<&str>) -> String {
        self.urls.purchase_paylink(paylink, redirect_uri)
    }

    /// Drop the persisted session and all cached entitlements.
    pub fn clear_client_data(&self) {
        self.persist.clear();
        if let Some(cache) = &self.cache {
            cache.clear_all();
        }
    }

    fn emit(&self, event: SessionEvent) {
        debug!(channel = event.channel(), "session event");
        // Delivery is best-effort; send only fails with no subscribers.
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for Spid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spid")
            .field("api", &self.api)
            .field("use_session_cluster", &self.use_session_cluster)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}
