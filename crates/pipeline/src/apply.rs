//! Materializing the plan.
//!
//! Applying happens in three steps:
//!
//! 1. Every record's target (folder chain + pending name) is computed and
//!    validated. Records that would not move are left out of the plan.
//! 2. The plan is checked for collisions: two records sharing a target, or a
//!    target already taken by a file that is not about to move away. Any
//!    collision fails the whole plan before anything is touched.
//! 3. Destination folders are created. Files whose current location is
//!    another move's target are parked under a temporary name, so chains and
//!    swaps work, then every move runs in selection order.
//!
//! The first failing move stops the batch. Files already moved stay where
//! they are and the error lists what was done and what is left.

use crate::error::{ApplyFailure, Collision, Collisions, Error, ErrorKind, Move, Result};
use crate::record::FileRecord;
use exn::ResultExt;
use foldr_storage::{BackendRef, validate_path};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::instrument;

const STAGING_PREFIX: &str = ".foldr-staged";

/// Moves needed to bring the working set to its pending paths.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    /// In selection order
    pub moves: Vec<Move>,
    /// Records already at their target
    pub unchanged: usize,
    /// Index of the record behind each move
    records: Vec<usize>,
}
impl Plan {
    #[instrument(skip_all, fields(records = records.len()))]
    pub(crate) fn new(records: &[FileRecord]) -> Result<Self> {
        let mut plan = Self::default();
        for (index, record) in records.iter().enumerate() {
            let target = record.pending().target();
            let target = validate_path(&target)
                .or_raise(|| ErrorKind::InvalidName(target.display().to_string()))?;
            if target == record.path() {
                plan.unchanged += 1;
                continue;
            }
            plan.moves.push(Move { from: record.path().to_path_buf(), to: target });
            plan.records.push(index);
        }
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Fail with [`TargetCollision`](ErrorKind::TargetCollision) if any two
    /// records would end up at the same path, or a target is occupied by a
    /// file that stays put.
    #[instrument(skip_all, fields(moves = self.moves.len()))]
    pub(crate) fn check(&self, records: &[FileRecord], backend: BackendRef<'_>) -> Result<()> {
        let planned: HashMap<usize, &Move> = self.records.iter().copied().zip(&self.moves).collect();
        let mut claims: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            let target = match planned.get(&index) {
                Some(planned) => planned.to.clone(),
                None => record.path().to_path_buf(),
            };
            claims.entry(target).or_default().push(record.path().to_path_buf());
        }
        let vacated: HashSet<&Path> = self.moves.iter().map(|m| m.from.as_path()).collect();
        let mut collisions = Vec::new();
        for (target, sources) in claims {
            let moving_in = self.moves.iter().any(|m| m.to == target);
            let occupied = moving_in
                && !vacated.contains(target.as_path())
                && !records.iter().any(|r| r.path() == target)
                && backend.exists(&target).or_raise(|| ErrorKind::Filesystem(target.clone()))?;
            if sources.len() > 1 || occupied {
                collisions.push(Collision { target, sources, occupied });
            }
        }
        if !collisions.is_empty() {
            for collision in &collisions {
                tracing::warn!(
                    target = %collision.target.display(),
                    sources = collision.sources.len(),
                    occupied = collision.occupied,
                    "target collision"
                );
            }
            exn::bail!(ErrorKind::TargetCollision(Collisions(collisions)));
        }
        Ok(())
    }

    /// Run every move against the backend and update the records to their
    /// new locations.
    #[instrument(skip_all, fields(backend = backend.name(), moves = self.moves.len()))]
    pub(crate) fn execute(&self, records: &mut [FileRecord], backend: BackendRef<'_>) -> Result<Report> {
        let mut pending = self.moves.clone();
        let mut completed = Vec::new();
        let targets: HashSet<&Path> = self.moves.iter().map(|m| m.to.as_path()).collect();

        // A folder in place of a file that is about to move away is left to
        // the rename itself.
        let folders: BTreeSet<&Path> = self
            .moves
            .iter()
            .filter_map(|m| m.to.parent())
            .filter(|folder| !folder.as_os_str().is_empty())
            .filter(|folder| !self.moves.iter().any(|m| folder.starts_with(&m.from)))
            .collect();
        for folder in folders {
            backend.create_dir_all(folder).or_raise(|| ErrorKind::Filesystem(folder.to_path_buf()))?;
            tracing::debug!(folder = %folder.display(), "created folder");
        }

        // Park files sitting on someone else's target.
        let mut staged = 0;
        for n in 0..pending.len() {
            if !targets.contains(pending[n].from.as_path()) {
                continue;
            }
            let parked = Self::staging_path(&pending[n].from, backend)?;
            let step = Move { from: pending[n].from.clone(), to: parked.clone() };
            if let Err(err) = backend.rename(&step.from, &step.to) {
                return Err(Self::failure(err, step, completed, pending));
            }
            tracing::debug!(from = %step.from.display(), to = %step.to.display(), "parked");
            completed.push(step);
            pending[n].from = parked;
            staged += 1;
        }

        for n in 0..pending.len() {
            let step = pending[n].clone();
            if let Err(err) = backend.rename(&step.from, &step.to) {
                return Err(Self::failure(err, step, completed, pending.split_off(n + 1)));
            }
            tracing::info!(from = %self.moves[n].from.display(), to = %step.to.display(), "moved");
            completed.push(step.clone());
            records[self.records[n]].moved_to(step.to);
        }

        Ok(Report { moves: self.moves.clone(), unchanged: self.unchanged, staged, dry_run: false })
    }

    #[track_caller]
    fn failure(
        err: foldr_storage::error::Error,
        failed: Move,
        completed: Vec<Move>,
        remaining: Vec<Move>,
    ) -> Error {
        tracing::warn!(from = %failed.from.display(), to = %failed.to.display(), "move failed; stopping");
        err.raise(ErrorKind::Apply(Box::new(ApplyFailure { failed, completed, remaining })))
    }

    /// A free name next to `path` to park it under.
    fn staging_path(path: &Path, backend: BackendRef<'_>) -> Result<PathBuf> {
        let name = path.file_name().unwrap_or_default();
        for n in 0.. {
            let mut parked = OsString::from(format!("{STAGING_PREFIX}-{n}-"));
            parked.push(name);
            let candidate = path.with_file_name(parked);
            if !backend.exists(&candidate).or_raise(|| ErrorKind::Filesystem(candidate.clone()))? {
                return Ok(candidate);
            }
        }
        exn::bail!(ErrorKind::Filesystem(path.to_path_buf()))
    }
}

/// Outcome of one `apply`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    /// Moves from each file's location before the apply to its final path
    pub moves: Vec<Move>,
    pub unchanged: usize,
    /// Files that went through a temporary name
    pub staged: usize,
    /// Nothing was touched
    pub dry_run: bool,
}
impl Report {
    pub(crate) fn planned(plan: &Plan) -> Self {
        Self { moves: plan.moves.clone(), unchanged: plan.unchanged, staged: 0, dry_run: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldr_storage::StorageBackend;
    use foldr_storage::backend::MockBackend;

    /// Records for every file in `backend`, each renamed as given.
    fn records(backend: &MockBackend, targets: &[(&str, &str)]) -> Vec<FileRecord> {
        backend
            .list()
            .unwrap()
            .into_iter()
            .map(|path| {
                let mut record = FileRecord::new(path);
                if let Some((_, to)) = targets.iter().find(|(from, _)| record.name() == *from) {
                    let to = Path::new(to);
                    record.pending.filename = to.file_name().unwrap().to_owned();
                    record.pending.folders = to.parent().unwrap().iter().map(ToOwned::to_owned).collect();
                }
                record
            })
            .collect()
    }

    fn apply(backend: &MockBackend, records: &mut [FileRecord]) -> Result<Report> {
        let plan = Plan::new(records)?;
        plan.check(records, backend)?;
        plan.execute(records, backend)
    }

    #[test]
    fn test_moves_into_folders() {
        let backend = MockBackend::with_files([("a.txt", "a"), ("b.txt", "b")]);
        let mut records = records(&backend, &[("a.txt", "A/B/a.txt"), ("b.txt", "A/B/b.txt")]);
        let report = apply(&backend, &mut records).unwrap();
        assert_eq!(report.moves.len(), 2);
        assert_eq!(backend.paths(), [PathBuf::from("A/B/a.txt"), PathBuf::from("A/B/b.txt")]);
        assert_eq!(records[0].path(), Path::new("A/B/a.txt"));
        assert_eq!(records[0].pending().target(), PathBuf::from("A/B/a.txt"));
    }

    #[test]
    fn test_unchanged_records_are_skipped() {
        let backend = MockBackend::with_files([("a.txt", "a"), ("b.txt", "b")]);
        let mut records = records(&backend, &[("b.txt", "c.txt")]);
        let report = apply(&backend, &mut records).unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.moves, [Move { from: "b.txt".into(), to: "c.txt".into() }]);
    }

    #[test]
    fn test_swap_goes_through_staging() {
        let backend = MockBackend::with_files([("a.txt", "a"), ("b.txt", "b")]);
        let mut records = records(&backend, &[("a.txt", "b.txt"), ("b.txt", "a.txt")]);
        let report = apply(&backend, &mut records).unwrap();
        assert_eq!(report.staged, 2);
        assert_eq!(backend.contents("a.txt").unwrap(), b"b");
        assert_eq!(backend.contents("b.txt").unwrap(), b"a");
        assert_eq!(backend.paths().len(), 2);
    }

    #[test]
    fn test_collision_between_records() {
        let backend = MockBackend::with_files([("a.txt", "a"), ("b.txt", "b")]);
        let mut records = records(&backend, &[("a.txt", "X/same.txt"), ("b.txt", "X/same.txt")]);
        let err = apply(&backend, &mut records).unwrap_err();
        let ErrorKind::TargetCollision(Collisions(collisions)) = &*err else {
            panic!("expected a collision, got {err:?}");
        };
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].sources.len(), 2);
        assert_eq!(backend.paths(), [PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[test]
    fn test_collision_with_record_that_stays() {
        let backend = MockBackend::with_files([("a.txt", "a"), ("b.txt", "b")]);
        let mut records = records(&backend, &[("a.txt", "b.txt")]);
        let err = apply(&backend, &mut records).unwrap_err();
        assert!(matches!(&*err, ErrorKind::TargetCollision(_)));
    }

    #[test]
    fn test_collision_with_unselected_file() {
        let backend = MockBackend::with_files([("a.txt", "a"), ("taken.txt", "t")]);
        let mut records = records(&backend, &[("a.txt", "taken.txt")]);
        records.retain(|r| r.name() == "a.txt");
        let err = apply(&backend, &mut records).unwrap_err();
        let ErrorKind::TargetCollision(Collisions(collisions)) = &*err else {
            panic!("expected a collision, got {err:?}");
        };
        assert!(collisions[0].occupied);
        assert_eq!(backend.contents("taken.txt").unwrap(), b"t");
    }

    #[test]
    fn test_partial_failure_reports_progress() {
        let backend =
            MockBackend::with_files([("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c")]).fail_rename_of("b.txt");
        let mut records = records(&backend, &[("a.txt", "D/a.txt"), ("b.txt", "D/b.txt"), ("c.txt", "D/c.txt")]);
        let err = apply(&backend, &mut records).unwrap_err();
        let ErrorKind::Apply(failure) = &*err else {
            panic!("expected an apply failure, got {err:?}");
        };
        assert_eq!(failure.failed, Move { from: "b.txt".into(), to: "D/b.txt".into() });
        assert_eq!(failure.completed, [Move { from: "a.txt".into(), to: "D/a.txt".into() }]);
        assert_eq!(failure.remaining, [Move { from: "c.txt".into(), to: "D/c.txt".into() }]);
        // Completed moves are not rolled back.
        assert!(backend.exists(Path::new("D/a.txt")).unwrap());
        assert!(backend.exists(Path::new("b.txt")).unwrap());
        assert!(backend.exists(Path::new("c.txt")).unwrap());
        assert_eq!(records[0].path(), Path::new("D/a.txt"));
    }

    #[test]
    fn test_folders_exist_before_first_move() {
        let backend = MockBackend::with_files([("a.txt", "a")]).fail_rename_of("a.txt");
        let mut records = records(&backend, &[("a.txt", "A/B/a.txt")]);
        let err = apply(&backend, &mut records).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Apply(_)));
        assert!(backend.exists(Path::new("A/B")).unwrap());
        assert_eq!(backend.paths(), [PathBuf::from("a.txt")]);
    }

    #[test]
    fn test_staging_avoids_existing_names() {
        let backend = MockBackend::with_files([("x", ""), (".foldr-staged-0-x", "")]);
        assert_eq!(Plan::staging_path(Path::new("x"), &backend).unwrap(), PathBuf::from(".foldr-staged-1-x"));
    }
}
