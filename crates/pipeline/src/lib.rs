//! Selection, field extraction, ordering, grouping and renaming of the files
//! in one directory.
//!
//! A [`Pipeline`] holds the working set of an invocation. Commands parsed by
//! [`CommandParser`] run against it in order; only `apply` touches the
//! filesystem, through the [`StorageBackend`](foldr_storage::StorageBackend)
//! the pipeline was built with.

pub mod apply;
pub mod command;
pub mod error;
pub mod extract;
pub mod fields;
pub mod group;
pub mod infold;
pub mod pipeline;
pub mod record;
pub mod rename;
pub mod select;
mod sort;
pub mod template;
pub mod value;

pub use crate::apply::{Plan, Report};
pub use crate::command::{Command, CommandParser, Script};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::pipeline::{Options, Pipeline};
pub use crate::value::Precision;
