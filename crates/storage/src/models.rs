//! Storage models.

use std::path::PathBuf;
use time::OffsetDateTime;

/// File metadata returned by [`stat`](crate::StorageBackend::stat).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Path relative to the backend root
    pub path: PathBuf,
    /// Creation timestamp. Platforms that do not record one report the
    /// modification time instead.
    pub created: OffsetDateTime,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileMeta {
    pub fn new(path: impl Into<PathBuf>, created: OffsetDateTime, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), created, modified }
    }
}
