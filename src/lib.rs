//! spid-client - SPiD Identity and Payment Client
//!
//! This library wraps the SPiD REST endpoints for session lookup,
//! login/logout, product and subscription entitlement checks, and payment
//! purchase links. The high-level entry point is [`Spid`]; the lower-level
//! [`ApiClient`] handles credential selection, retry-on-401 token refresh and
//! response normalization for direct endpoint calls.
//!
//! # Example
//!
//! ```no_run
//! use spid_client::{ServerUrl, Spid, SpidOptions};
//!
//! # async fn example() -> Result<(), spid_client::Error> {
//! let server = ServerUrl::new("https://identity.example.com")?;
//! let spid = Spid::new(SpidOptions {
//!     client_id: Some("client-1".to_string()),
//!     redirect_uri: Some("https://app.example.com/callback".to_string()),
//!     ..SpidOptions::new(server)
//! })?;
//!
//! let session = spid.has_session().await?;
//! if session.is_logged_in() {
//!     let product = spid.has_product("prod-1").await?;
//!     println!("entitled: {}", product.result);
//! } else {
//!     println!("log in at {}", spid.login_url("", None));
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod error;
pub mod persist;
pub mod sdk;
pub mod session;
pub mod types;
pub mod urls;

// Re-export primary types at crate root for convenience
pub use api::{ApiClient, Method, Payload};
pub use auth::{AuthOptions, Credentials, basic_auth_header, bearer_auth_header};
pub use error::Error;
pub use persist::{FilePersistence, MemoryPersistence, NullPersistence, Persistence};
pub use sdk::{Entitlement, Spid, SpidOptions};
pub use session::{SessionEvent, SessionState};
pub use types::ServerUrl;
pub use urls::Urls;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
