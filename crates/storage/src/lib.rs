pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::FileMeta;
pub use crate::path::{validate as validate_path, validate_segment};

/// Borrowed handle to whichever backend the pipeline was constructed with.
pub type BackendRef<'a> = &'a dyn StorageBackend;
