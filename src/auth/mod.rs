//! Credential resolution and token types.

mod credentials;
mod tokens;

pub use credentials::{AuthOptions, Credentials, basic_auth_header, bearer_auth_header};
pub use tokens::{AccessToken, RefreshToken};
