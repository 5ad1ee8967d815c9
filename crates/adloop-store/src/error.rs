// ABOUTME: Error type for history store and cache layout operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid record: {0}")]
    Invalid(#[from] adloop_core::CoreError),

    #[error("plan {0} does not exist in history")]
    PlanNotFound(String),

    #[error("could not determine a cache directory; set ADLOOP_CACHE_DIR")]
    NoCacheDir,
}
