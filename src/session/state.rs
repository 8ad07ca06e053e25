//! Session state as reported by the SPiD session endpoints.

use serde::{Deserialize, Serialize};

/// One session response from the server.
///
/// All fields are optional: an anonymous visitor produces a response with no
/// `userId` at all. Server fields this crate does not model are kept in
/// `extra` so persisted sessions round-trip losslessly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    /// The logged-in user id, absent for anonymous visitors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Visitor identification data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor: Option<serde_json::Value>,

    /// The user status flag reported by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_status: Option<String>,

    /// Relative session expiry in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// Whether the server considers the lookup successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,

    /// Any other server fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionState {
    /// True when the session belongs to a logged-in user.
    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }
}
