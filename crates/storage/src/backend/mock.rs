//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::FileMeta;
use crate::path::validate as validate_path;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct MockFile {
    data: Vec<u8>,
    created: OffsetDateTime,
    modified: OffsetDateTime,
}

/// In-memory storage backend for testing.
///
/// Files live in a [`BTreeMap`] behind a [`RefCell`], so listing order is
/// deterministic and all trait methods operate on `&self`. Timestamps can be
/// pinned per file, and renames of chosen sources can be made to fail so
/// that partial `apply` runs can be exercised.
///
/// # Examples
///
/// ```
/// use foldr_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// let backend = MockBackend::with_files([("b.txt", "2"), ("a.txt", "1")]);
/// assert_eq!(backend.list().unwrap(), vec![Path::new("a.txt"), Path::new("b.txt")]);
/// backend.rename(Path::new("a.txt"), Path::new("A/a.txt")).unwrap();
/// assert!(backend.exists(Path::new("A")).unwrap());
/// ```
pub struct MockBackend {
    name: String,
    files: RefCell<BTreeMap<PathBuf, MockFile>>,
    dirs: RefCell<BTreeSet<PathBuf>>,
    failing: RefCell<BTreeSet<PathBuf>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut map = BTreeMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, MockFile { data: data.into(), created: now, modified: now });
        }
        Self {
            name: "mock".to_string(),
            files: RefCell::new(map),
            dirs: RefCell::new(BTreeSet::new()),
            failing: RefCell::new(BTreeSet::new()),
        }
    }

    /// Pin the creation and modification time of an existing file.
    pub fn with_times(self, path: impl AsRef<Path>, created: OffsetDateTime, modified: OffsetDateTime) -> Self {
        {
            let mut files = self.files.borrow_mut();
            let Some(file) = files.get_mut(path.as_ref()) else {
                panic!("MockBackend::with_times: unknown file {}", path.as_ref().display());
            };
            file.created = created;
            file.modified = modified;
        }
        self
    }

    /// Make every later [`rename`](StorageBackend::rename) of `path` fail.
    pub fn fail_rename_of(self, path: impl Into<PathBuf>) -> Self {
        self.failing.borrow_mut().insert(path.into());
        self
    }

    /// Every file path currently stored, nested ones included.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.borrow().keys().cloned().collect()
    }

    /// Contents of a stored file.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.borrow().get(path.as_ref()).map(|f| f.data.clone())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.borrow().contains(path) || self.files.borrow().keys().any(|f| f != path && f.starts_with(path))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.borrow().keys().filter(|path| path.components().count() == 1).cloned().collect())
    }

    fn stat(&self, path: &Path) -> Result<FileMeta> {
        let path = validate_path(path)?;
        let files = self.files.borrow();
        let file = files.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileMeta::new(&path, file.created, file.modified))
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.files.borrow().contains_key(&path) || self.is_dir(&path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        if self.failing.borrow().contains(&from) {
            exn::bail!(ErrorKind::PermissionDenied(from));
        }
        if self.files.borrow().contains_key(&to) || self.is_dir(&to) {
            exn::bail!(ErrorKind::AlreadyExists(to));
        }
        let mut files = self.files.borrow_mut();
        let file = files.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        files.insert(to, file);
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.files.borrow_mut().remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        if self.files.borrow().contains_key(&path) {
            exn::bail!(ErrorKind::AlreadyExists(path));
        }
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in path.ancestors().filter(|a| !a.as_os_str().is_empty()) {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_list_only_top_level() {
        let backend = MockBackend::with_files([("b.txt", "b"), ("a.txt", "a"), ("dir/c.txt", "c")]);
        assert_eq!(backend.list().unwrap(), vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[test]
    fn test_with_times() {
        let at = datetime!(2023-05-01 10:00 UTC);
        let backend = MockBackend::with_files([("a.txt", "a")]).with_times("a.txt", at, at);
        let meta = backend.stat(Path::new("a.txt")).unwrap();
        assert_eq!(meta.created, at);
        assert_eq!(meta.modified, at);
    }

    #[test]
    fn test_rename() {
        let backend = MockBackend::with_files([("old.txt", "data")]);
        backend.rename(Path::new("old.txt"), Path::new("X/new.txt")).unwrap();
        assert!(!backend.exists(Path::new("old.txt")).unwrap());
        assert!(backend.exists(Path::new("X")).unwrap());
        assert_eq!(backend.contents("X/new.txt").unwrap(), b"data");
    }

    #[test]
    fn test_rename_refuses_to_overwrite() {
        let backend = MockBackend::with_files([("a.txt", "a"), ("b.txt", "b")]);
        let err = backend.rename(Path::new("a.txt"), Path::new("b.txt")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
    }

    #[test]
    fn test_failing_rename() {
        let backend = MockBackend::with_files([("a.txt", "a")]).fail_rename_of("a.txt");
        let err = backend.rename(Path::new("a.txt"), Path::new("b.txt")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
        assert!(backend.exists(Path::new("a.txt")).unwrap());
    }

    #[test]
    fn test_create_dir_all() {
        let backend = MockBackend::default();
        backend.create_dir_all(Path::new("a/b")).unwrap();
        assert!(backend.exists(Path::new("a")).unwrap());
        assert!(backend.exists(Path::new("a/b")).unwrap());
        assert!(!backend.exists(Path::new("b")).unwrap());
    }

    #[test]
    fn test_delete() {
        let backend = MockBackend::with_files([("a.txt", "a")]);
        backend.delete(Path::new("a.txt")).unwrap();
        let err = backend.delete(Path::new("a.txt")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", "bad")]);
    }
}
