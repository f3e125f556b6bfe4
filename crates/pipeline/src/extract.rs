//! Field extraction.
//!
//! Each extraction computes one value per selected record (or several, for a
//! regular expression with more than one capture group) and is appended to
//! the field table as new columns. Existing columns are never touched.

use crate::error::{ErrorKind, Result};
use crate::record::{FileRecord, last_extension, split_name};
use crate::select::TimeAttribute;
use crate::value::{Precision, Value};
use foldr_storage::BackendRef;
use regex::{Captures, Regex};
use time::UtcOffset;

/// Running counter settings shared by the index extractions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Counter {
    pub start: i64,
    pub step: i64,
    pub reverse: bool,
}
impl Default for Counter {
    fn default() -> Self {
        Self { start: 0, step: 1, reverse: false }
    }
}
impl Counter {
    /// Value at `rank`; fails when it does not fit in an `i64`.
    fn nth(&self, rank: usize, total: usize) -> Result<Value> {
        let rank = match self.reverse {
            true => total.saturating_sub(rank + 1),
            false => rank,
        };
        i64::try_from(rank)
            .ok()
            .and_then(|rank| self.step.checked_mul(rank))
            .and_then(|offset| self.start.checked_add(offset))
            .map(Value::Integer)
            .ok_or_else(|| {
                exn::Exn::from(ErrorKind::Parse(format!(
                    "counter overflows at rank {rank} (start {}, step {})",
                    self.start, self.step
                )))
            })
    }
}

#[derive(Clone, Debug)]
pub enum Extraction {
    /// File name without its extension
    Name,
    /// Last extension
    Extension,
    Time(TimeAttribute, Precision),
    /// Characters of the full file name
    Letters { start: usize, span: usize },
    /// Trailing characters of the name without its extension
    LastLetters { span: usize },
    /// Space separated words of the name without its extension, rejoined
    Words { start: usize, span: usize },
    /// A regular expression capture. `anchored` matches at the start of the
    /// name only; `group` picks one capture group (0 is the whole match).
    Capture { regex: Regex, group: Option<usize>, anchored: bool },
    /// Rank in the current ordering
    Position(Counter),
    /// Rank of the record's group
    GroupIndex(Counter),
    /// Rank of the record inside its group
    SubIndex(Counter),
}
impl Extraction {
    /// Names of the columns this extraction appends.
    ///
    /// A capture without a chosen group whose expression has several groups
    /// produces one column per group. Named groups keep their own name, the
    /// others are called `<name>.<n>` or stay unnamed.
    pub fn columns(&self, name: Option<&str>) -> Vec<Option<String>> {
        match self {
            Self::Capture { regex, group: None, .. } if regex.captures_len() > 2 => regex
                .capture_names()
                .enumerate()
                .skip(1)
                .map(|(n, group)| match group {
                    Some(group) => Some(group.to_string()),
                    None => name.map(|name| format!("{name}.{n}")),
                })
                .collect(),
            _ => vec![name.map(str::to_string)],
        }
    }

    /// Compute the row of new values for every record, in record order.
    pub(crate) fn rows(
        &self,
        records: &mut [FileRecord],
        backend: BackendRef<'_>,
        offset: UtcOffset,
    ) -> Result<Vec<Vec<Value>>> {
        let total = records.len();
        let groups = records.iter().filter_map(|r| r.slot().map(|s| s.index + 1)).max().unwrap_or(0);
        let mut rows = Vec::with_capacity(total);
        for (rank, record) in records.iter_mut().enumerate() {
            let name = record.name();
            let row = match self {
                Self::Name => vec![Value::from(split_name(&name).0)],
                Self::Extension => vec![Value::from(last_extension(&name).unwrap_or_default())],
                Self::Time(attribute, precision) => {
                    let meta = record.meta(backend)?;
                    let at = match attribute {
                        TimeAttribute::Created => meta.created,
                        TimeAttribute::Modified => meta.modified,
                    };
                    vec![Value::timestamp(at, offset, *precision)]
                },
                Self::Letters { start, span } => vec![Value::Text(name.chars().skip(*start).take(*span).collect())],
                Self::LastLetters { span } => {
                    let stem: Vec<char> = split_name(&name).0.chars().collect();
                    vec![Value::Text(stem[stem.len().saturating_sub(*span)..].iter().collect())]
                },
                Self::Words { start, span } => {
                    let words: Vec<&str> = split_name(&name).0.split(' ').skip(*start).take(*span).collect();
                    vec![Value::Text(words.join(" "))]
                },
                Self::Capture { regex, group, anchored } => {
                    let captures = regex
                        .captures(&name)
                        .filter(|c| !anchored || c.get(0).is_some_and(|m| m.start() == 0));
                    Self::captured(regex, captures.as_ref(), *group)?
                },
                Self::Position(counter) => vec![counter.nth(rank, total)?],
                Self::GroupIndex(counter) => vec![counter.nth(Self::slot(record)?.index, groups)?],
                Self::SubIndex(counter) => vec![counter.nth(Self::slot(record)?.subindex, 0)?],
            };
            rows.push(row);
        }
        Ok(rows)
    }

    fn slot(record: &FileRecord) -> Result<&crate::record::GroupSlot> {
        record
            .slot()
            .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField("group-index (run `group using` first)".into())))
    }

    fn captured(regex: &Regex, captures: Option<&Captures<'_>>, group: Option<usize>) -> Result<Vec<Value>> {
        let text = |n: usize| {
            let matched = captures.and_then(|c| c.get(n)).map(|m| m.as_str());
            Value::Text(matched.unwrap_or_default().into())
        };
        match group {
            Some(n) if n < regex.captures_len() => Ok(vec![text(n)]),
            Some(n) => exn::bail!(ErrorKind::Pattern(format!("'{regex}' has no capture group {n}"))),
            None if regex.captures_len() > 2 => Ok((1..regex.captures_len()).map(text).collect()),
            None if regex.captures_len() == 2 => Ok(vec![text(1)]),
            None => Ok(vec![text(0)]),
        }
    }
}
