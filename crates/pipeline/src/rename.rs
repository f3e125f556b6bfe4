//! Pending file name rewrites.
//!
//! All operations except [`Format`](RenameOp::Format) rewrite the part of
//! the pending name before its first dot and leave the extension alone.
//! Nothing here touches the disk.

use crate::error::{ErrorKind, Result};
use crate::record::{join_name, split_name};
use crate::template::{Lookup, Template};
use foldr_storage::validate_segment;
use regex::Regex;

#[derive(Clone, Debug)]
pub enum RenameOp {
    /// Literal replacement, all occurrences unless `count` is given
    Replace { old: String, new: String, count: Option<usize> },
    /// Regular expression substitution; `count` 0 replaces every match.
    /// The replacement may use `$1` or `${name}` to refer to captures.
    Substitute { regex: Regex, replacement: String, count: usize },
    /// Upper-case the first letter of each word
    Capitalise { separator: String, count: Option<usize>, keep_start: bool },
    Upper,
    Lower,
    /// Replace the whole file name, extension included
    Format(Template),
}
impl RenameOp {
    /// Compute the new pending name from the current one.
    pub(crate) fn apply(&self, pending: &str, scope: &impl Lookup) -> Result<String> {
        let (stem, extension) = split_name(pending);
        let renamed = match self {
            Self::Replace { old, new, count } => {
                let stem = match count {
                    Some(count) => stem.replacen(old.as_str(), new, *count),
                    None => stem.replace(old.as_str(), new),
                };
                join_name(&stem, extension)
            },
            Self::Substitute { regex, replacement, count } => {
                join_name(&regex.replacen(stem, *count, replacement.as_str()), extension)
            },
            Self::Capitalise { separator, count, keep_start } => {
                join_name(&capitalise(stem, separator, *count, *keep_start), extension)
            },
            Self::Upper => join_name(&stem.to_uppercase(), extension),
            Self::Lower => join_name(&stem.to_lowercase(), extension),
            Self::Format(template) => template.render(scope)?,
        };
        // The pending name must stay a single, non-empty path segment.
        match validate_segment(&renamed) {
            Ok(()) => Ok(renamed),
            Err(_) => exn::bail!(ErrorKind::InvalidName(renamed)),
        }
    }
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Capitalise the words of `stem` split on `separator`. The first word is
/// left alone with `keep_start`; at most `count` further words are touched.
fn capitalise(stem: &str, separator: &str, count: Option<usize>, keep_start: bool) -> String {
    if separator.is_empty() {
        return match keep_start {
            true => stem.to_string(),
            false => upper_first(stem),
        };
    }
    let limit = count.unwrap_or(usize::MAX);
    stem.split(separator)
        .enumerate()
        .map(|(n, word)| match n {
            0 if keep_start => word.to_string(),
            0 => upper_first(word),
            n if n <= limit => upper_first(word),
            _ => word.to_string(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}
