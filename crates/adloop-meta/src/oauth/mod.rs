// ABOUTME: Meta OAuth authorization-code flow: token type, file cache, manager, and local callback server.
// ABOUTME: The manager doubles as the Graph client's AccessTokenSource.

mod callback;
mod manager;
mod token;

use std::time::Duration;

use thiserror::Error;

pub use callback::{CALLBACK_TIMEOUT, CallbackServer, CallbackStatus, DEFAULT_CALLBACK_PORT, PORT_ATTEMPTS, router};
pub use manager::{AUTH_DIALOG_URL, AUTH_SCOPE, OAuthConfig, OAuthManager, TOKEN_EXCHANGE_URL};
pub use token::{OAuthToken, TokenCache};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("META_APP_ID and META_APP_SECRET must be set to authenticate with Meta")]
    MissingAppCredentials,

    #[error("OAuth callback server is disabled (META_ADS_DISABLE_CALLBACK_SERVER)")]
    CallbackDisabled,

    #[error("no free callback port in {first}..={last}")]
    NoFreePort { first: u16, last: u16 },

    #[error("authorization denied: {0}")]
    Denied(String),

    #[error("timed out after {0:?} waiting for the OAuth callback")]
    Timeout(Duration),

    #[error("callback server stopped before an authorization code arrived")]
    CallbackClosed,

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
