//! SPiD endpoint paths and wire types.

use serde::Deserialize;

// ============================================================================
// Endpoint Paths
// ============================================================================

/// OAuth token endpoint, used for refresh-token exchange.
pub const OAUTH_TOKEN: &str = "/oauth/token";

/// Session lookup on the primary SPiD server.
pub const SESSION: &str = "/ajax/hasSession.js";

/// Session lookup on the session cluster.
pub const SESSION_CLUSTER: &str = "/rpc/hasSession.js";

/// Product entitlement check.
pub const HAS_PRODUCT: &str = "/ajax/hasproduct.js";

/// Subscription entitlement check.
pub const HAS_SUBSCRIPTION: &str = "/ajax/hassubscription.js";

/// Agreement acceptance.
pub const ACCEPT_AGREEMENT: &str = "/ajax/acceptAgreement.js";

/// Visitor trait submission.
pub const TRAITS: &str = "/ajax/traits.js";

/// Logout.
pub const LOGOUT: &str = "/logout";

/// OAuth authorization UI, used for login/signup links.
pub const AUTHORIZE: &str = "/bff-oauth/authorize";

/// Purchase checkout flow on the payment server.
pub const PURCHASE: &str = "/api/payment/purchase";

// ============================================================================
// Wire Types
// ============================================================================

/// Response from the `/oauth/token` refresh exchange.
///
/// See RFC 6749 section 6; the server may rotate the refresh token.
#[derive(Debug, Deserialize)]
pub struct OauthTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Response from the entitlement endpoints.
#[derive(Debug, Deserialize)]
pub struct EntitlementResponse {
    #[serde(default)]
    pub result: bool,
}
