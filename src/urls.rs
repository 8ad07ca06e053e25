//! Builders for user-facing SPiD URLs.
//!
//! These are the links an application hands to a browser: login and signup
//! flows, account pages, logout and the purchase checkout. Every URL carries
//! the configured `client_id` and `redirect_uri`, which individual calls can
//! override.

use crate::api::endpoints;
use crate::error::{ConfigError, Error};
use crate::types::ServerUrl;

const ACCOUNT_SUMMARY: &str = "/account/summary";
const ACCOUNT_PURCHASE_HISTORY: &str = "/account/purchasehistory";
const ACCOUNT_SUBSCRIPTIONS: &str = "/account/subscriptions";
const ACCOUNT_PRODUCTS: &str = "/account/products";

/// Builds full URLs to SPiD pages and endpoints.
#[derive(Debug, Clone)]
pub struct Urls {
    server: ServerUrl,
    payment_server: ServerUrl,
    client_id: Option<String>,
    redirect_uri: Option<String>,
}

impl Urls {
    /// Create a URL builder.
    ///
    /// `payment_server` hosts the checkout flow and may differ from the
    /// identity server.
    pub fn new(
        server: ServerUrl,
        payment_server: ServerUrl,
        client_id: Option<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        Self {
            server,
            payment_server,
            client_id,
            redirect_uri,
        }
    }

    /// The login flow. `login_type` selects an authentication method and may
    /// be empty; `redirect_uri` overrides the configured one.
    pub fn login(&self, login_type: &str, redirect_uri: Option<&str>) -> String {
        self.authorize(login_type, redirect_uri)
    }

    /// The signup flow. Currently the same page as [`Urls::login`].
    pub fn signup(&self, login_type: &str, redirect_uri: Option<&str>) -> String {
        self.authorize(login_type, redirect_uri)
    }

    fn authorize(&self, login_type: &str, redirect_uri: Option<&str>) -> String {
        self.build(
            &self.server,
            endpoints::AUTHORIZE,
            &[
                ("response_type", Some("code")),
                ("scope", Some("openid")),
                ("acr_values", Some(login_type)),
                ("redirect_uri", redirect_uri),
            ],
        )
    }

    /// The logout page.
    pub fn logout(&self) -> String {
        self.build(
            &self.server,
            endpoints::LOGOUT,
            &[("response_type", Some("code"))],
        )
    }

    /// The account summary page.
    pub fn account(&self) -> String {
        self.build(
            &self.server,
            ACCOUNT_SUMMARY,
            &[("response_type", Some("code"))],
        )
    }

    /// The purchase history page.
    pub fn purchase_history(&self) -> String {
        self.build(&self.server, ACCOUNT_PURCHASE_HISTORY, &[])
    }

    /// The subscriptions page.
    pub fn subscriptions(&self) -> String {
        self.build(&self.server, ACCOUNT_SUBSCRIPTIONS, &[])
    }

    /// The products page.
    pub fn products(&self) -> String {
        self.build(&self.server, ACCOUNT_PRODUCTS, &[])
    }

    /// The account summary page with a voucher to redeem.
    pub fn redeem(&self, voucher_code: &str) -> String {
        self.build(
            &self.server,
            ACCOUNT_SUMMARY,
            &[("voucher_code", Some(voucher_code))],
        )
    }

    /// The session lookup endpoint on the primary server.
    ///
    /// # Errors
    ///
    /// `autologin` must be 0 or 1.
    pub fn session(&self, autologin: u8) -> Result<String, Error> {
        let autologin = Self::checked_autologin(autologin)?;
        Ok(self.build(
            &self.server,
            endpoints::SESSION,
            &[("autologin", Some(autologin))],
        ))
    }

    /// The session lookup endpoint on the session cluster, the faster and
    /// preferred variant.
    ///
    /// # Errors
    ///
    /// `autologin` must be 0 or 1.
    pub fn session_cluster(&self, autologin: u8) -> Result<String, Error> {
        let autologin = Self::checked_autologin(autologin)?;
        Ok(self.build(
            &self.server,
            endpoints::SESSION_CLUSTER,
            &[("autologin", Some(autologin))],
        ))
    }

    /// The product entitlement endpoint.
    pub fn product(&self, product_id: &str) -> String {
        self.build(
            &self.server,
            endpoints::HAS_PRODUCT,
            &[("product_id", Some(product_id))],
        )
    }

    /// The subscription entitlement endpoint.
    pub fn subscription(&self, product_id: &str) -> String {
        self.build(
            &self.server,
            endpoints::HAS_SUBSCRIPTION,
            &[("product_id", Some(product_id))],
        )
    }

    /// The agreement acceptance endpoint.
    pub fn agreement(&self) -> String {
        self.build(&self.server, endpoints::ACCEPT_AGREEMENT, &[])
    }

    /// The visitor trait submission endpoint.
    pub fn traits(&self, traits: &str) -> String {
        self.build(&self.server, endpoints::TRAITS, &[("t", Some(traits))])
    }

    /// The checkout flow for a paylink, on the payment server.
    pub fn purchase_paylink(&self, paylink: &str, redirect_uri: Option<&str>) -> String {
        self.build(
            &self.payment_server,
            endpoints::PURCHASE,
            &[("paylink", Some(paylink)), ("redirect_uri", redirect_uri)],
        )
    }

    fn checked_autologin(autologin: u8) -> Result<&'static str, Error> {
        match autologin {
            0 => Ok("0"),
            1 => Ok("1"),
            value => Err(ConfigError::InvalidAutologin { value }.into()),
        }
    }

    /// Assemble a URL from a base, a path and query parameters. The
    /// configured `client_id` and `redirect_uri` are always included when
    /// set; `params` entries override them, and `None` values are dropped.
    fn build(&self, base: &ServerUrl, path: &str, params: &[(&str, Option<&str>)]) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(client_id) = &self.client_id {
            pairs.push(("client_id", client_id.clone()));
        }
        if let Some(redirect_uri) = &self.redirect_uri {
            pairs.push(("redirect_uri", redirect_uri.clone()));
        }
        for (name, value) in params {
            let Some(value) = value else { continue };
            match pairs.iter_mut().find(|(existing, _)| existing == name) {
                Some(pair) => pair.1 = (*value).to_string(),
                None => pairs.push((name, (*value).to_string())),
            }
        }

        let mut url = base.endpoint(path);
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(&pairs);
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> Urls {
        Urls::new(
            ServerUrl::new("https://identity.example.com").unwrap(),
            ServerUrl::new("https://payment.example.com").unwrap(),
            Some("client-1".to_string()),
            Some("https://app.example.com/callback".to_string()),
        )
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        let parsed = url::Url::parse(url).unwrap();
        parsed.query_pairs().into_owned().collect()
    }

    #[test]
    fn login_url_carries_oauth_params() {
        let url = urls().login("", None);
        assert!(url.starts_with("https://identity.example.com/bff-oauth/authorize?"));

        let pairs = query_pairs(&url);
        assert!(pairs.contains(&("client_id".to_string(), "client-1".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&("scope".to_string(), "openid".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "https://app.example.com/callback".to_string()
        )));
    }

    #[test]
    fn login_redirect_uri_override() {
        let url = urls().login("", Some("https://other.example.com/done"));
        let pairs = query_pairs(&url);
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "https://other.example.com/done".to_string()
        )));
        assert!(
            !pairs.contains(&(
                "redirect_uri".to_string(),
                "https://app.example.com/callback".to_string()
            ))
        );
    }

    #[test]
    fn session_url_validates_autologin() {
        let urls = urls();
        let url = urls.session(1).unwrap();
        assert!(url.starts_with("https://identity.example.com/ajax/hasSession.js?"));
        assert!(query_pairs(&url).contains(&("autologin".to_string(), "1".to_string())));

        assert!(urls.session(2).is_err());
        assert!(urls.session_cluster(7).is_err());
    }

    #[test]
    fn session_cluster_uses_rpc_path() {
        let url = urls().session_cluster(0).unwrap();
        assert!(url.starts_with("https://identity.example.com/rpc/hasSession.js?"));
        assert!(query_pairs(&url).contains(&("autologin".to_string(), "0".to_string())));
    }

    #[test]
    fn purchase_url_uses_payment_server() {
        let url = urls().purchase_paylink("pl-123", None);
        assert!(url.starts_with("https://payment.example.com/api/payment/purchase?"));
        assert!(query_pairs(&url).contains(&("paylink".to_string(), "pl-123".to_string())));
    }

    #[test]
    fn entitlement_urls_carry_product_id() {
        let urls = urls();
        assert!(
            query_pairs(&urls.product("p1")).contains(&("product_id".to_string(), "p1".to_string()))
        );
        assert!(
            urls.subscription("p1")
                .starts_with("https://identity.example.com/ajax/hassubscription.js?")
        );
    }

    #[test]
    fn no_configured_client_params() {
        let bare = Urls::new(
            ServerUrl::new("https://identity.example.com").unwrap(),
            ServerUrl::new("https://payment.example.com").unwrap(),
            None,
            None,
        );
        let pairs = query_pairs(&bare.traits("news"));
        assert_eq!(pairs, vec![("t".to_string(), "news".to_string())]);
    }
}
