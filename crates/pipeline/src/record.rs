//! Working set records and their pending destination.

use crate::error::{ErrorKind, Result};
use crate::value::Value;
use exn::ResultExt;
use foldr_storage::{BackendRef, FileMeta};
use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Split a file name into stem and extension at the first dot.
///
/// A leading dot belongs to the stem, so `.bashrc` has no extension and
/// `archive.tar.gz` has the extension `tar.gz`.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.char_indices().skip(1).find(|(_, c)| *c == '.') {
        Some((at, _)) => (&name[..at], Some(&name[at + 1..])),
        None => (name, None),
    }
}

/// The last dot-separated part of a file name, if there is one.
pub fn last_extension(name: &str) -> Option<&str> {
    split_name(name).1.map(|ext| ext.rsplit('.').next().unwrap_or(ext))
}

/// Rebuild a file name from a stem and an optional extension.
pub fn join_name(stem: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Where a record will land once the plan is applied.
///
/// Names are kept as the filesystem reported them, so a name that is not
/// valid UTF-8 survives untouched until a rename rewrites it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPath {
    pub filename: OsString,
    /// Folder chain relative to the working directory, outermost first
    pub folders: Vec<OsString>,
}
impl PendingPath {
    pub fn target(&self) -> PathBuf {
        let mut path: PathBuf = self.folders.iter().collect();
        path.push(&self.filename);
        path
    }

    /// The pending file name as text, for templates and rename operations.
    pub fn name(&self) -> Cow<'_, str> {
        self.filename.to_string_lossy()
    }

    /// Take `name` as the new file name. A result that reads the same as the
    /// current name keeps the current bytes.
    pub(crate) fn rename_to(&mut self, name: String) {
        if self.name() != name {
            self.filename = name.into();
        }
    }
}

/// Position of a record inside the live grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSlot {
    /// Rank of the group, in order of first appearance
    pub index: usize,
    /// Rank of the record inside its group
    pub subindex: usize,
    pub key: Vec<Value>,
}

/// One selected file.
#[derive(Clone, Debug)]
pub struct FileRecord {
    path: PathBuf,
    pub(crate) values: Vec<Value>,
    pub(crate) slot: Option<GroupSlot>,
    pub(crate) pending: PendingPath,
    meta: Option<FileMeta>,
}
impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let pending = Self::pending_for(&path);
        Self {
            path,
            values: Vec::new(),
            slot: None,
            pending,
            meta: None,
        }
    }

    fn pending_for(path: &Path) -> PendingPath {
        let filename = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        let folders = path.parent().map(|p| p.iter().map(ToOwned::to_owned).collect()).unwrap_or_default();
        PendingPath { filename, folders }
    }

    /// Current location relative to the working directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file name, unaffected by pending renames. Bytes that are not
    /// valid UTF-8 are replaced.
    pub fn name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn slot(&self) -> Option<&GroupSlot> {
        self.slot.as_ref()
    }

    pub fn pending(&self) -> &PendingPath {
        &self.pending
    }

    /// File metadata, fetched from the backend on first use.
    pub(crate) fn meta(&mut self, backend: BackendRef<'_>) -> Result<&FileMeta> {
        let meta = match self.meta.take() {
            Some(meta) => meta,
            None => backend.stat(&self.path).or_raise(|| ErrorKind::Filesystem(self.path.clone()))?,
        };
        Ok(self.meta.insert(meta))
    }

    /// Record that the file now lives at `path`; the plan restarts from there.
    pub(crate) fn moved_to(&mut self, path: PathBuf) {
        self.pending = Self::pending_for(&path);
        if let Some(meta) = self.meta.as_mut() {
            meta.path = path.clone();
        }
        self.path = path;
    }
}
