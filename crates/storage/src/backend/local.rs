//! Local filesystem storage backend.
//!
//! Backed by blocking `std::fs` calls.

use crate::error::{ErrorKind, Result};
use crate::{FileMeta, StorageBackend, path::validate as validate_path};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Local filesystem storage backend.
///
/// All paths are relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use foldr_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/home/me/Downloads")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    /// The directory being organized
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if `root` is not
    /// absolute or is not a directory, and [`NotFound`](ErrorKind::NotFound)
    /// if it does not exist.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        let metadata = fs::metadata(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the absolute path for a relative storage path.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn metadata(path: &Path, metadata: &Metadata) -> Result<FileMeta> {
        let modified: OffsetDateTime = metadata.modified().map_err(|e| ErrorKind::from_io(e, path))?.into();
        let created = match metadata.created() {
            Ok(created) => created.into(),
            Err(_) => {
                tracing::trace!(path = %path.display(), "creation time unavailable; using modification time");
                modified
            },
        };
        Ok(FileMeta::new(path, created, modified))
    }

    /// Copy, verify the byte count, then delete the source. Used when a plain
    /// rename would cross a filesystem boundary.
    fn copy_then_delete(&self, from: &Path, to: &Path, abs_from: &Path, abs_to: &Path) -> Result<()> {
        let expected = fs::metadata(abs_from).map_err(|e| ErrorKind::from_io(e, from))?.len();
        let copied = fs::copy(abs_from, abs_to).map_err(|e| ErrorKind::from_io(e, to))?;
        let written = fs::metadata(abs_to).map_err(|e| ErrorKind::from_io(e, to))?.len();
        if copied != expected || written != expected {
            // Leave the source alone; the partial copy is the only thing to discard.
            _ = fs::remove_file(abs_to);
            exn::bail!(ErrorKind::VerifyFailed(to.to_path_buf()));
        }
        self.delete(from)
    }
}

impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root).map_err(|e| ErrorKind::from_io(e, &self.root))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ErrorKind::from_io(e, &self.root))?;
            // Follows symlinks, so a link to a file is listed and a broken
            // link is silently dropped.
            match fs::metadata(entry.path()) {
                Ok(metadata) if metadata.is_file() => files.push(PathBuf::from(entry.file_name())),
                Ok(_) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => exn::bail!(ErrorKind::from_io(e, entry.path())),
            }
        }
        files.sort();
        Ok(files)
    }

    fn stat(&self, path: &Path) -> Result<FileMeta> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).map_err(|e| ErrorKind::from_io(e, path))?;
        Self::metadata(path, &metadata)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(abs_path.try_exists().map_err(|e| ErrorKind::from_io(e, path))?)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let abs_from = self.absolute_path(from)?;
        let abs_to = self.absolute_path(to)?;
        // `fs::rename` silently replaces files on Unix.
        if abs_to.try_exists().map_err(|e| ErrorKind::from_io(e, to))? {
            exn::bail!(ErrorKind::AlreadyExists(to.to_path_buf()));
        }
        if let Some(parent) = abs_to.parent() {
            fs::create_dir_all(parent).map_err(|e| ErrorKind::from_io(e, to))?;
        }
        match fs::rename(&abs_from, &abs_to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
                tracing::warn!(from = %from.display(), to = %to.display(), "rename crosses devices; copying instead");
                self.copy_then_delete(from, to, &abs_from, &abs_to)
            },
            Err(e) => exn::bail!(ErrorKind::from_io(e, from)),
        }
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).map_err(|e| ErrorKind::from_io(e, path))?)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::create_dir_all(&abs_path).map_err(|e| ErrorKind::from_io(e, path))?)
    }
}
