// ABOUTME: OAuthManager: builds the Meta authorization URL, exchanges codes, and owns the cached token.
// ABOUTME: An explicit META_ACCESS_TOKEN always wins over the cache.

use std::sync::Mutex;

use reqwest::Url;
use serde_json::Value;
use ulid::Ulid;

use super::callback::{CALLBACK_TIMEOUT, CallbackServer, DEFAULT_CALLBACK_PORT};
use super::token::{OAuthToken, TokenCache};
use super::OAuthError;
use crate::client::AccessTokenSource;

pub const AUTH_DIALOG_URL: &str = "https://www.facebook.com/v22.0/dialog/oauth";
pub const TOKEN_EXCHANGE_URL: &str = "https://graph.facebook.com/v22.0/oauth/access_token";
pub const AUTH_SCOPE: &str = "business_management,public_profile,pages_show_list,pages_read_engagement";

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub app_id: String,
    pub app_secret: String,
    /// First port the callback server tries.
    pub callback_port: u16,
    /// A token supplied out of band, e.g. `META_ACCESS_TOKEN`.
    pub access_token: Option<String>,
    pub disable_callback_server: bool,
    pub token_exchange_url: String,
}

impl OAuthConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            callback_port: DEFAULT_CALLBACK_PORT,
            access_token: None,
            disable_callback_server: false,
            token_exchange_url: TOKEN_EXCHANGE_URL.to_string(),
        }
    }

    /// Take the callback port from a URL like `http://localhost:8080/`.
    pub fn with_callback_url(mut self, url: &str) -> Self {
        if let Some(port) = Url::parse(url).ok().and_then(|u| u.port_or_known_default()) {
            self.callback_port = port;
        }
        self
    }
}

pub struct OAuthManager {
    config: OAuthConfig,
    cache: TokenCache,
    http: reqwest::Client,
    token: Mutex<Option<OAuthToken>>,
}

impl OAuthManager {
    pub fn new(config: OAuthConfig, cache: TokenCache) -> Self {
        let token = cache.load();
        Self {
            config,
            cache,
            http: reqwest::Client::new(),
            token: Mutex::new(token),
        }
    }

    pub fn auth_url(&self, redirect_uri: &str, state: &str) -> String {
        let params = [
            ("client_id", self.config.app_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", AUTH_SCOPE),
            ("response_type", "code"),
            ("state", state),
        ];
        match Url::parse_with_params(AUTH_DIALOG_URL, &params) {
            Ok(url) => url.to_string(),
            Err(_) => AUTH_DIALOG_URL.to_string(),
        }
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<OAuthToken, OAuthError> {
        let form = [
            ("client_id", self.config.app_id.as_str()),
            ("client_secret", self.config.app_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
            ("code", code),
        ];
        let response = self
            .http
            .post(&self.config.token_exchange_url)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(OAuthError::Exchange(message));
        }
        let access_token = body
            .get("access_token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OAuthError::Exchange("response has no access_token".to_string()))?;

        let mut token = OAuthToken::new(access_token, body.get("expires_in").and_then(|e| e.as_i64()));
        token.token_type = body.get("token_type").and_then(|t| t.as_str()).map(String::from);
        token.user_id = body.get("user_id").and_then(|u| match u {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Ok(token)
    }

    /// Current usable token: configured token, then the cached one if still valid.
    pub fn current_token(&self) -> Option<String> {
        if let Some(token) = self.config.access_token.as_ref().filter(|t| !t.trim().is_empty()) {
            return Some(token.clone());
        }
        let mut guard = self.token.lock().ok()?;
        if guard.as_ref().is_some_and(|t| t.is_expired()) {
            tracing::info!("cached access token expired");
            *guard = None;
        }
        guard.as_ref().map(|t| t.access_token.clone())
    }

    /// Run the browser flow: start the callback server, show the URL, wait, exchange, persist.
    pub async fn authenticate(&self) -> Result<String, OAuthError> {
        if self.config.disable_callback_server {
            return Err(OAuthError::CallbackDisabled);
        }
        if self.config.app_id.is_empty() || self.config.app_secret.is_empty() {
            return Err(OAuthError::MissingAppCredentials);
        }

        let state = Ulid::new().to_string();
        let server = CallbackServer::start(self.config.callback_port, Some(state.clone())).await?;
        let redirect_uri = server.redirect_uri();
        let url = self.auth_url(&redirect_uri, &state);
        tracing::info!(%url, "waiting for Meta authorization");
        eprintln!("Open this URL in your browser to authorize adloop with Meta:\n\n  {}\n", url);

        let code = server.wait_for_code(CALLBACK_TIMEOUT).await?;
        let token = self.exchange_code(&code, &redirect_uri).await?;
        self.cache.save(&token)?;
        let access_token = token.access_token.clone();
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token);
        }
        tracing::info!("meta authentication complete");
        Ok(access_token)
    }

    /// A usable token, authenticating interactively when none is available.
    pub async fn ensure_token(&self) -> Result<String, OAuthError> {
        match self.current_token() {
            Some(token) => Ok(token),
            None => self.authenticate().await,
        }
    }

    /// Forget the cached token, in memory and on disk.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
        if let Err(e) = self.cache.clear() {
            tracing::warn!(error = %e, "failed to clear token cache");
        }
    }
}

impl AccessTokenSource for OAuthManager {
    fn access_token(&self) -> Option<String> {
        self.current_token()
    }

    fn invalidate(&self) {
        tracing::info!("invalidating meta access token");
        self.clear();
    }
}
