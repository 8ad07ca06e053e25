//! Session change detection.
//!
//! Comparing the previous and current session responses yields a fixed-order
//! sequence of events. The diff itself is a pure function over the two
//! sessions plus a small piece of per-client state (the one-shot
//! session-init latch and the last observed user status).

use serde_json::Value;

use super::state::SessionState;

/// Sentinel for "no status observed yet".
const STATUS_UNKNOWN: &str = "unknown";

/// A session change event.
///
/// Every variant carries the full current session, except [`SessionEvent::Visitor`]
/// which carries only the visitor data and [`SessionEvent::Error`] which
/// reports a failed session lookup.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The response contains visitor identification data.
    Visitor(Value),

    /// A user has created a session, or is no longer the same user.
    Login(SessionState),

    /// The previously logged-in user is no longer logged in.
    Logout(SessionState),

    /// One user was logged in, and it is no longer the same user.
    UserChange(SessionState),

    /// There is a user now, or there used to be one.
    SessionChange(SessionState),

    /// No user neither before nor after.
    NotLoggedIn(SessionState),

    /// The first session of this client instance's lifetime was initiated.
    SessionInit(SessionState),

    /// The user status flag changed.
    StatusChange(SessionState),

    /// A session lookup failed.
    Error { message: String },
}

impl SessionEvent {
    /// The channel name for this event.
    pub fn channel(&self) -> &'static str {
        match self {
            SessionEvent::Visitor(_) => "visitor",
            SessionEvent::Login(_) => "login",
            SessionEvent::Logout(_) => "logout",
            SessionEvent::UserChange(_) => "userChange",
            SessionEvent::SessionChange(_) => "sessionChange",
            SessionEvent::NotLoggedIn(_) => "notLoggedIn",
            SessionEvent::SessionInit(_) => "sessionInit",
            SessionEvent::StatusChange(_) => "statusChange",
            SessionEvent::Error { .. } => "error",
        }
    }
}

/// Per-client diff state: the session-init latch and the tracked user status.
#[derive(Debug)]
pub struct DiffState {
    session_init_sent: bool,
    user_status: String,
}

impl Default for DiffState {
    fn default() -> Self {
        Self {
            session_init_sent: false,
            user_status: STATUS_UNKNOWN.to_string(),
        }
    }
}

impl DiffState {
    /// Create a fresh diff state.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute the events that describe the transition from `previous` to
/// `current`.
///
/// Events are produced in a fixed order; all applicable ones fire, except
/// that exactly one of `SessionChange`/`NotLoggedIn` is produced per call.
/// `SessionInit` fires at most once per [`DiffState`] lifetime, and
/// `StatusChange` only when the current response carries a status that
/// differs from the tracked value. Absent fields are treated as the empty
/// case; no input can make this fail.
pub fn diff(
    previous: &SessionState,
    current: &SessionState,
    state: &mut DiffState,
) -> Vec<SessionEvent> {
    let mut events = Vec::new();

    let prev_user = previous.user_id.as_deref();
    let cur_user = current.user_id.as_deref();

    // Response contains a visitor
    if let Some(visitor) = &current.visitor {
        events.push(SessionEvent::Visitor(visitor.clone()));
    }
    // User has created a session, or user is no longer the same
    if cur_user.is_some() && prev_user != cur_user {
        events.push(SessionEvent::Login(current.clone()));
    }
    // User is no longer logged in
    if prev_user.is_some() && cur_user.is_none() {
        events.push(SessionEvent::Logout(current.clone()));
    }
    // One user was logged in, and it is no longer the same user
    if let (Some(previous_id), Some(current_id)) = (prev_user, cur_user)
        && previous_id != current_id
    {
        events.push(SessionEvent::UserChange(current.clone()));
    }
    // There is a user now, or there used to be a user
    if prev_user.is_some() || cur_user.is_some() {
        events.push(SessionEvent::SessionChange(current.clone()));
    } else {
        events.push(SessionEvent::NotLoggedIn(current.clone()));
    }
    // Fired when the session is successfully initiated for the first time
    if cur_user.is_some() && !state.session_init_sent {
        state.session_init_sent = true;
        events.push(SessionEvent::SessionInit(current.clone()));
    }
    // Fired when the userStatus flag in the session has changed
    if let Some(status) = &current.user_status
        && *status != state.user_status
    {
        state.user_status = status.clone();
        events.push(SessionEvent::StatusChange(current.clone()));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(user_id: Option<&str>, user_status: Option<&str>) -> SessionState {
        SessionState {
            user_id: user_id.map(String::from),
            user_status: user_status.map(String::from),
            ..SessionState::default()
        }
    }

    fn channels(events: &[SessionEvent]) -> Vec<&'static str> {
        events.iter().map(SessionEvent::channel).collect()
    }

    #[test]
    fn first_login_sequence() {
        let mut state = DiffState::new();
        let previous = SessionState::default();
        let current = session(Some("u1"), Some("ok"));

        let events = diff(&previous, &current, &mut state);
        assert_eq!(
            channels(&events),
            vec!["login", "sessionChange", "sessionInit", "statusChange"]
        );
    }

    #[test]
    fn logout_sequence() {
        let mut state = DiffState::new();
        let previous = session(Some("u1"), None);
        let current = SessionState::default();

        let events = diff(&previous, &current, &mut state);
        // A session existed before, so this is a session change rather than
        // a plain not-logged-in poll.
        assert_eq!(channels(&events), vec!["logout", "sessionChange"]);
    }

    #[test]
    fn user_change_sequence() {
        let mut state = DiffState {
            session_init_sent: true,
            user_status: "ok".to_string(),
        };
        let previous = session(Some("u1"), Some("ok"));
        let current = session(Some("u2"), Some("ok"));

        let events = diff(&previous, &current, &mut state);
        assert_eq!(
            channels(&events),
            vec!["login", "userChange", "sessionChange"]
        );
    }

    #[test]
    fn anonymous_polling_emits_not_logged_in() {
        let mut state = DiffState::new();
        let events = diff(&SessionState::default(), &SessionState::default(), &mut state);
        assert_eq!(channels(&events), vec!["notLoggedIn"]);
    }

    #[test]
    fn visitor_event_carries_only_visitor_data() {
        let mut state = DiffState::new();
        let current = SessionState {
            visitor: Some(json!({"uid": "v-1"})),
            ..SessionState::default()
        };

        let events = diff(&SessionState::default(), &current, &mut state);
        assert_eq!(channels(&events), vec!["visitor", "notLoggedIn"]);
        match &events[0] {
            SessionEvent::Visitor(value) => assert_eq!(value["uid"], json!("v-1")),
            other => panic!("expected visitor event, got {other:?}"),
        }
    }

    #[test]
    fn session_init_fires_at_most_once() {
        let mut state = DiffState::new();
        let previous = SessionState::default();
        let current = session(Some("u1"), None);

        let first = diff(&previous, &current, &mut state);
        assert!(channels(&first).contains(&"sessionInit"));

        // Logout then log back in: no second sessionInit
        let relogin = diff(&current, &previous, &mut state);
        assert!(!channels(&relogin).contains(&"sessionInit"));
        let second = diff(&previous, &current, &mut state);
        assert!(!channels(&second).contains(&"sessionInit"));
    }

    #[test]
    fn repeated_diff_is_idempotent_except_one_shot_events() {
        let mut state = DiffState::new();
        let previous = SessionState::default();
        let current = session(Some("u1"), Some("ok"));

        let first = diff(&previous, &current, &mut state);
        let second = diff(&previous, &current, &mut state);

        let expected: Vec<&str> = channels(&first)
            .into_iter()
            .filter(|c| *c != "sessionInit" && *c != "statusChange")
            .collect();
        assert_eq!(channels(&second), expected);
    }

    #[test]
    fn status_change_tracks_last_observed_status() {
        let mut state = DiffState::new();
        let a = session(Some("u1"), Some("ok"));
        let b = session(Some("u1"), Some("blocked"));

        let first = diff(&SessionState::default(), &a, &mut state);
        assert!(channels(&first).contains(&"statusChange"));

        // Same status again: no event
        let repeat = diff(&a, &a, &mut state);
        assert!(!channels(&repeat).contains(&"statusChange"));

        let changed = diff(&a, &b, &mut state);
        assert!(channels(&changed).contains(&"statusChange"));
    }

    #[test]
    fn absent_status_never_fires_status_change() {
        let mut state = DiffState::new();
        let current = session(Some("u1"), None);
        let events = diff(&SessionState::default(), &current, &mut state);
        assert!(!channels(&events).contains(&"statusChange"));
    }
}
