// ABOUTME: Meta OAuth access token with expiry, and its JSON file cache.
// ABOUTME: A corrupt cache file is logged and treated as if no token were cached.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::OAuthError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds from `created_at`. Absent means the token does not expire.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Unix seconds.
    #[serde(default = "now_secs")]
    pub created_at: i64,
}

fn now_secs() -> i64 {
    Utc::now().timestamp()
}

impl OAuthToken {
    pub fn new(access_token: impl Into<String>, expires_in: Option<i64>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            expires_in,
            user_id: None,
            created_at: now_secs(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_in {
            Some(secs) => now > self.created_at + secs,
            None => false,
        }
    }
}

/// On-disk token cache.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<OAuthToken> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read token cache");
                return None;
            }
        };
        match serde_json::from_str::<OAuthToken>(&text) {
            Ok(token) if !token.access_token.is_empty() => {
                tracing::debug!(path = %self.path.display(), "loaded cached token");
                Some(token)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt token cache");
                None
            }
        }
    }

    pub fn save(&self, token: &OAuthToken) -> Result<(), OAuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(token)?)?;
        tracing::info!(path = %self.path.display(), "saved access token");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), OAuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
