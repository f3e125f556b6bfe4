//! Storage backend trait and implementations.
//!
//! The pipeline never talks to `std::fs` directly. Everything it needs from
//! the filesystem goes through [`StorageBackend`], which is rooted at the one
//! directory being organized.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::FileMeta;
use std::path::{Path, PathBuf};

/// Filesystem operations consumed by the pipeline.
///
/// All operations are blocking. Paths are relative to the backend root and
/// implementations must validate them with
/// [`validate_path`](crate::validate_path) before use.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use foldr_storage::{backend::StorageBackend, error::Result};
///
/// fn archive(backend: &dyn StorageBackend, name: &str) -> Result<()> {
///     let from = Path::new(name);
///     if backend.exists(from)? {
///         backend.rename(from, &Path::new("archive").join(name))?;
///     }
///     Ok(())
/// }
/// ```
pub trait StorageBackend {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// List the regular files directly inside the root, sorted by name.
    ///
    /// Directories are not descended into; the pipeline only ever works on
    /// one directory level.
    fn list(&self) -> Result<Vec<PathBuf>>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    fn stat(&self, path: &Path) -> Result<FileMeta>;

    /// Check if a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Move a file within the backend.
    ///
    /// # Notes
    /// - Implementations create parent directories as needed.
    /// - The destination must not already exist;
    ///   [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists) is returned
    ///   otherwise.
    /// - Where an atomic rename is not possible, a copy that is verified
    ///   before the source is deleted is acceptable.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Create a directory and all of its missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}
