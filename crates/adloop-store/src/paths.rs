// ABOUTME: Filesystem layout of the adloop cache directory.
// ABOUTME: Resolves the database, token cache, log file, and scheduler runtime file locations.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Everything adloop writes locally lives under one cache root:
///
/// ```text
/// <root>/adloop.db             history database
/// <root>/meta_ads_token.json   OAuth token cache
/// <root>/adloop.log            daemon log
/// <root>/run/<name>.pid        scheduler pid file
/// <root>/run/<name>.status.json
/// <root>/run/<name>.sock       control socket
/// ```
#[derive(Debug, Clone)]
pub struct CachePaths {
    root: PathBuf,
}

impl CachePaths {
    /// Use the given root, creating it and its `run/` subdirectory.
    pub fn new(root: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(root.join("run"))?;
        Ok(Self { root })
    }

    /// `ADLOOP_CACHE_DIR`, else the platform cache dir (`~/.cache/adloop` on Linux).
    pub fn from_env() -> Result<Self, StoreError> {
        let root = match std::env::var("ADLOOP_CACHE_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::cache_dir()
                .ok_or(StoreError::NoCacheDir)?
                .join("adloop"),
        };
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("adloop.db")
    }

    pub fn token_path(&self) -> PathBuf {
        self.root.join("meta_ads_token.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("adloop.log")
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.join("run")
    }

    pub fn pid_path(&self, name: &str) -> PathBuf {
        self.run_dir().join(format!("{}.pid", name))
    }

    pub fn status_path(&self, name: &str) -> PathBuf {
        self.run_dir().join(format!("{}.status.json", name))
    }

    pub fn socket_path(&self, name: &str) -> PathBuf {
        self.run_dir().join(format!("{}.sock", name))
    }
}
