// ABOUTME: Persistence layer for adloop: the SQLite history table and the cache directory layout.
// ABOUTME: Exposes HistoryStore for plan CRUD, HistoryQuery for filtered reads, and CachePaths.

pub mod error;
pub mod history;
pub mod paths;
pub mod query;

pub use error::StoreError;
pub use history::{DEFAULT_HISTORY_LIMIT, HistoryStore};
pub use paths::CachePaths;
pub use query::{Combine, Field, HistoryQuery, Op, SortOrder, TimeFilter};
