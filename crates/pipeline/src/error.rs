//! Pipeline Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Storage failures are attached as
//! children of a [`Filesystem`](ErrorKind::Filesystem) or
//! [`Apply`](ErrorKind::Apply) frame, so the full chain survives up to the
//! invocation report.

use derive_more::{Display, Error};
use std::fmt;
use std::path::PathBuf;

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Malformed command line or template syntax
    #[display("parse error: {_0}")]
    Parse(#[error(not(source))] String),
    /// A regular expression, glob or date format that does not compile
    #[display("invalid pattern: {_0}")]
    Pattern(#[error(not(source))] String),
    #[display("unknown predicate: {_0}")]
    UnknownPredicate(#[error(not(source))] String),
    /// `and`/`or`/`xor`/`not` at the end of a selection expression
    #[display("connector '{_0}' is not followed by a predicate")]
    DanglingConnector(#[error(not(source))] String),
    #[display("no such field: {_0}")]
    MissingField(#[error(not(source))] String),
    #[display("field name already in use: {_0}")]
    DuplicateFieldName(#[error(not(source))] String),
    /// A folder or file name that cannot be used as a single path segment
    #[display("invalid name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// Two records would land on the same target, or a target is occupied
    #[display("{_0}")]
    TargetCollision(#[error(not(source))] Collisions),
    /// A filesystem call failed outside of the move batch
    #[display("filesystem error on {}", _0.display())]
    Filesystem(#[error(not(source))] PathBuf),
    /// A move failed part way through `apply`
    #[display("{_0}")]
    Apply(#[error(not(source))] Box<ApplyFailure>),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Filesystem(_))
    }
}

/// A single planned target claimed more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub target: PathBuf,
    /// Every record planned to land on `target`
    pub sources: Vec<PathBuf>,
    /// Whether a file outside the selection already sits at `target`
    pub occupied: bool,
}

/// Every collision found while validating a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collisions(pub Vec<Collision>);
impl fmt::Display for Collisions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} target collision(s)", self.0.len())?;
        for collision in &self.0 {
            let sources: Vec<_> = collision.sources.iter().map(|s| s.display().to_string()).collect();
            write!(f, "\n  {} <- {}", collision.target.display(), sources.join(", "))?;
            if collision.occupied {
                write!(f, " (already exists)")?;
            }
        }
        Ok(())
    }
}

/// One move of a plan, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub from: PathBuf,
    pub to: PathBuf,
}
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from.display(), self.to.display())
    }
}

/// Where a partially applied plan stopped.
///
/// `remaining` lists moves in the order they would have run, starting from
/// the current location of each file; a file parked under a temporary name
/// appears there with that name as its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub failed: Move,
    pub completed: Vec<Move>,
    pub remaining: Vec<Move>,
}
impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to move {} ({} moved, {} not attempted)",
            self.failed,
            self.completed.len(),
            self.remaining.len()
        )?;
        for pending in &self.remaining {
            write!(f, "\n  pending: {pending}")?;
        }
        Ok(())
    }
}
