//! Path validation for paths relative to the working directory.
//!
//! Every path handed to a [`StorageBackend`](crate::StorageBackend) is relative
//! to the directory being organized. Planned targets are computed from user
//! templates, so they must be checked before anything touches the disk.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a relative path and returns its normalized form.
///
/// `.` components and duplicate separators are dropped, `..` is resolved
/// against the components seen so far and must never climb above the root.
/// Absolute prefixes (Windows drive letters, UNC) and NUL bytes are rejected,
/// as is anything that normalizes to the empty path.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use foldr_storage::validate_path;
/// assert!(validate_path("A/B/file.txt").is_ok());
/// assert!(validate_path("A/../file.txt").is_ok());
/// assert!(validate_path("../outside.txt").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(validate_path("A/./B//x.txt/").unwrap(), Path::new("A/B/x.txt"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Validates a single folder or file name.
///
/// Unlike [`validate`], a segment must stay one component: separators, `.`
/// and `..` are refused outright instead of being resolved. The name is
/// never rewritten, so surrounding whitespace is kept as it is.
///
/// ```
/// use foldr_storage::validate_segment;
/// assert!(validate_segment(" Holidays ").is_ok());
/// assert!(validate_segment("a/b").is_err());
/// assert!(validate_segment("..").is_err());
/// assert!(validate_segment("   ").is_err());
/// ```
pub fn validate_segment(segment: &str) -> Result<()> {
    let invalid = segment.trim().is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0']);
    if invalid {
        exn::bail!(ErrorKind::InvalidPath(PathBuf::from(segment)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("photo.jpg", "photo.jpg")]
    #[case("2024/01/photo.jpg", "2024/01/photo.jpg")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("a/b/..", "a")]
    #[case("A/B/", "A/B")]
    fn test_valid_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    #[case("a\0b")]
    fn test_invalid_paths(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[rstest]
    #[case("Holidays")]
    #[case("  2024 - 01 ")]
    #[case(" a.txt")]
    #[case(".hidden")]
    #[case(". .")]
    fn test_valid_segments(#[case] input: &str) {
        assert!(validate_segment(input).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case(" ")]
    #[case(".")]
    #[case("..")]
    #[case("\t\n")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("nul\0")]
    fn test_invalid_segments(#[case] input: &str) {
        assert!(validate_segment(input).is_err());
    }
}
