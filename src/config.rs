// ABOUTME: Configuration for the adloop binary, from environment variables and an optional YAML file.
// ABOUTME: Environment values win over the file; everything has a default except the Meta app credentials.

use std::path::{Path, PathBuf};

use adloop_meta::{DEFAULT_GRAPH_API_BASE, OAuthConfig};
use adloop_store::{CachePaths, StoreError};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_LLM_PROVIDER: &str = "gemini";
pub const DEFAULT_CALLBACK_URL: &str = "http://localhost:8080/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("ADLOOP_MAX_ITERATIONS must be a positive integer, got {0:?}")]
    InvalidMaxIterations(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Keys accepted in the YAML file named by `ADLOOP_CONFIG`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub cache_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub meta_app_id: Option<String>,
    pub meta_app_secret: Option<String>,
    pub meta_callback_url: Option<String>,
    pub meta_access_token: Option<String>,
    pub meta_graph_api_base: Option<String>,
    pub max_iterations: Option<usize>,
    pub disable_callback_server: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AdloopConfig {
    pub cache_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub llm_provider: String,
    pub llm_model: Option<String>,
    pub meta_app_id: String,
    pub meta_app_secret: String,
    pub meta_callback_url: String,
    pub meta_access_token: Option<String>,
    pub graph_api_base: String,
    pub max_iterations: usize,
    pub disable_callback_server: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl AdloopConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - ADLOOP_CONFIG: optional YAML file with the same settings
    /// - ADLOOP_CACHE_DIR: cache root (default: platform cache dir + /adloop)
    /// - ADLOOP_DB_PATH: history database (default: <cache>/adloop.db)
    /// - ADLOOP_LLM_PROVIDER: anthropic, openai, or gemini (default: gemini)
    /// - ADLOOP_LLM_MODEL: model name (default: per provider)
    /// - ADLOOP_MAX_ITERATIONS: tool-loop cap per agent (default: 20)
    /// - META_APP_ID, META_APP_SECRET: Meta app credentials for OAuth
    /// - META_CALLBACK_URL: OAuth redirect (default: http://localhost:8080/)
    /// - META_ACCESS_TOKEN: skip OAuth and use this token
    /// - META_GRAPH_API_BASE: Graph API base URL
    /// - META_ADS_DISABLE_CALLBACK_SERVER: never start the OAuth callback server
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match non_empty(std::env::var("ADLOOP_CONFIG").ok()) {
            Some(path) => ConfigFile::load(Path::new(&path))?,
            None => ConfigFile::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge a config file with variables from `env`, env first.
    pub fn resolve(
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| non_empty(env(key));

        let max_iterations = match var("ADLOOP_MAX_ITERATIONS") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidMaxIterations(raw)),
            },
            None => match file.max_iterations {
                Some(0) => return Err(ConfigError::InvalidMaxIterations("0".to_string())),
                Some(n) => n,
                None => adloop_agent::DEFAULT_MAX_ITERATIONS,
            },
        };

        Ok(Self {
            cache_dir: var("ADLOOP_CACHE_DIR").map(PathBuf::from).or(file.cache_dir),
            db_path: var("ADLOOP_DB_PATH").map(PathBuf::from).or(file.db_path),
            llm_provider: var("ADLOOP_LLM_PROVIDER")
                .or(non_empty(file.llm_provider))
                .unwrap_or_else(|| DEFAULT_LLM_PROVIDER.to_string()),
            llm_model: var("ADLOOP_LLM_MODEL").or(non_empty(file.llm_model)),
            meta_app_id: var("META_APP_ID").or(file.meta_app_id).unwrap_or_default(),
            meta_app_secret: var("META_APP_SECRET").or(file.meta_app_secret).unwrap_or_default(),
            meta_callback_url: var("META_CALLBACK_URL")
                .or(non_empty(file.meta_callback_url))
                .unwrap_or_else(|| DEFAULT_CALLBACK_URL.to_string()),
            meta_access_token: var("META_ACCESS_TOKEN").or(non_empty(file.meta_access_token)),
            graph_api_base: var("META_GRAPH_API_BASE")
                .or(non_empty(file.meta_graph_api_base))
                .unwrap_or_else(|| DEFAULT_GRAPH_API_BASE.to_string()),
            max_iterations,
            disable_callback_server: var("META_ADS_DISABLE_CALLBACK_SERVER")
                .map(|v| truthy(&v))
                .or(file.disable_callback_server)
                .unwrap_or(false),
        })
    }

    /// The cache layout, creating the directories if needed.
    pub fn cache_paths(&self) -> Result<CachePaths, ConfigError> {
        let paths = match &self.cache_dir {
            Some(dir) => CachePaths::new(dir.clone())?,
            None => CachePaths::from_env()?,
        };
        Ok(paths)
    }

    pub fn db_path(&self, paths: &CachePaths) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| paths.db_path())
    }

    pub fn oauth_config(&self) -> OAuthConfig {
        let mut config = OAuthConfig::new(&self.meta_app_id, &self.meta_app_secret)
            .with_callback_url(&self.meta_callback_url);
        config.access_token = self.meta_access_token.clone();
        config.disable_callback_server = self.disable_callback_server;
        config
    }
}
