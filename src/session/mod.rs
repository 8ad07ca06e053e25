//! Session state and change detection.

mod diff;
mod state;

pub use diff::{DiffState, SessionEvent, diff};
pub use state::SessionState;
