//! The field table and field references.
//!
//! Every record carries the same columns in the same order: an extraction
//! appends one column (or several, for multi-group regular expressions) to
//! all of them at once. The table here only holds the column names; values
//! live on the records.

use crate::error::{ErrorKind, Result};
use crate::record::FileRecord;
use crate::value::Value;
use std::fmt;

pub const GROUP: &str = "group";
pub const GROUP_INDEX: &str = "group-index";
pub const SUBINDEX: &str = "subindex";

/// Names understood by templates without being extracted first.
pub const BUILTINS: [&str; 7] = ["filename", "basename", "extension", "original", GROUP, GROUP_INDEX, SUBINDEX];

const UNNAMED_PREFIX: &str = "data_";

/// Reference to one or more columns, shared by sorting, grouping and
/// templating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldRef {
    Name(String),
    Index(usize),
    /// Both ends inclusive
    Slice { start: usize, end: usize },
    /// Every extracted column, in extraction order
    All,
}
impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
            Self::Slice { start, end } => write!(f, "{start}..={end}"),
            Self::All => f.write_str("*"),
        }
    }
}

/// A resolved column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Field(usize),
    Group,
    GroupIndex,
    Subindex,
}

#[derive(Clone, Debug, Default)]
pub struct FieldTable {
    names: Vec<Option<String>>,
}
impl FieldTable {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of a column as templates see it: its own name, or `data_<n>` for
    /// the n-th unnamed column.
    pub fn label(&self, index: usize) -> String {
        match self.names.get(index) {
            Some(Some(name)) => name.clone(),
            _ => {
                let n = self.names.iter().take(index).filter(|n| n.is_none()).count();
                format!("{UNNAMED_PREFIX}{n}")
            },
        }
    }

    pub fn labels(&self) -> Vec<String> {
        (0..self.len()).map(|index| self.label(index)).collect()
    }

    /// Check that `name` is free without adding it.
    pub(crate) fn check_name(&self, name: &str) -> Result<()> {
        let taken = name.is_empty()
            || name.starts_with(UNNAMED_PREFIX)
            || name.parse::<usize>().is_ok()
            || BUILTINS.contains(&name)
            || self.names.iter().flatten().any(|n| n == name);
        if taken {
            exn::bail!(ErrorKind::DuplicateFieldName(name.to_string()));
        }
        Ok(())
    }

    /// Append a column and return its index.
    pub(crate) fn push(&mut self, name: Option<String>) -> Result<usize> {
        if let Some(name) = &name {
            self.check_name(name)?;
        }
        self.names.push(name);
        Ok(self.names.len() - 1)
    }

    /// Index of the column called `name`, `data_<n>` included.
    pub fn position(&self, name: &str) -> Option<usize> {
        if let Some(index) = self.names.iter().position(|n| n.as_deref() == Some(name)) {
            return Some(index);
        }
        let n: usize = name.strip_prefix(UNNAMED_PREFIX)?.parse().ok()?;
        self.names.iter().enumerate().filter(|(_, name)| name.is_none()).nth(n).map(|(index, _)| index)
    }

    fn column(&self, name: &str) -> Result<Column> {
        match name {
            GROUP => Ok(Column::Group),
            GROUP_INDEX => Ok(Column::GroupIndex),
            SUBINDEX => Ok(Column::Subindex),
            _ => self
                .position(name)
                .map(Column::Field)
                .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField(name.to_string()))),
        }
    }

    fn index(&self, index: usize) -> Result<Column> {
        match index < self.len() {
            true => Ok(Column::Field(index)),
            false => exn::bail!(ErrorKind::MissingField(index.to_string())),
        }
    }

    /// Resolve references into a flat list of columns, in the given order.
    pub fn resolve(&self, refs: &[FieldRef]) -> Result<Vec<Column>> {
        let mut columns = Vec::new();
        for reference in refs {
            match reference {
                FieldRef::Name(name) => columns.push(self.column(name)?),
                FieldRef::Index(index) => columns.push(self.index(*index)?),
                FieldRef::Slice { start, end } => {
                    if start > end {
                        exn::bail!(ErrorKind::Parse(format!("empty slice {reference}")));
                    }
                    for index in *start..=*end {
                        columns.push(self.index(index)?);
                    }
                },
                FieldRef::All => columns.extend((0..self.len()).map(Column::Field)),
            }
        }
        if columns.is_empty() {
            exn::bail!(ErrorKind::MissingField(
                refs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ));
        }
        Ok(columns)
    }

    /// Value of a resolved column on one record.
    ///
    /// `separator` joins the key parts of the record's group.
    pub(crate) fn value(&self, record: &FileRecord, column: Column, separator: &str) -> Result<Value> {
        let slot = || {
            record
                .slot()
                .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField(format!("{column} (no grouping)"))))
        };
        match column {
            Column::Field(index) => record
                .values()
                .get(index)
                .cloned()
                .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField(self.label(index)))),
            Column::Group => Ok(Value::Text(
                slot()?.key.iter().map(ToString::to_string).collect::<Vec<_>>().join(separator),
            )),
            Column::GroupIndex => Ok(Value::Integer(slot()?.index as i64)),
            Column::Subindex => Ok(Value::Integer(slot()?.subindex as i64)),
        }
    }
}
impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(index) => write!(f, "{index}"),
            Self::Group => f.write_str(GROUP),
            Self::GroupIndex => f.write_str(GROUP_INDEX),
            Self::Subindex => f.write_str(SUBINDEX),
        }
    }
}
