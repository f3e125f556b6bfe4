//! Selection expressions.
//!
//! An expression is a flat list of predicates and connectors evaluated
//! strictly left to right, with no precedence and no grouping. Evaluation
//! starts from "every file" and folds each predicate into the running result
//! with whichever connector was seen last (AND until told otherwise):
//!
//! ```text
//! contains a  contains b  or contains c  not contains d
//! ((((all ∧ a) ∧ b) ∨ c) ∧ ¬d)
//! ```

use crate::error::{ErrorKind, Result};
use crate::record::{FileRecord, last_extension, split_name};
use crate::value::{Precision, local};
use foldr_storage::BackendRef;
use regex::Regex;
use time::{PrimitiveDateTime, UtcOffset};
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
    Xor,
    AndNot,
}
impl Connector {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "xor" => Some(Self::Xor),
            "not" => Some(Self::AndNot),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::AndNot => "not",
        }
    }

    fn combine(self, acc: bool, hit: bool) -> bool {
        match self {
            Self::And => acc && hit,
            Self::Or => acc || hit,
            Self::Xor => acc ^ hit,
            Self::AndNot => acc && !hit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeAttribute {
    Created,
    Modified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Before,
    After,
    Equal,
}

/// A test on a single file. Name tests are case sensitive.
#[derive(Clone, Debug)]
pub enum Predicate {
    Exact(String),
    Contains(String),
    StartsWith(String),
    /// Tests the name without its last extension
    EndsWith(String),
    ExtensionExact(String),
    ExtensionContains(String),
    Glob(glob::Pattern),
    /// Regular expression that must match at the start of the name
    Match(Regex),
    /// Regular expression that may match anywhere in the name
    Search(Regex),
    Date {
        attribute: TimeAttribute,
        relation: Relation,
        date: PrimitiveDateTime,
        precision: Precision,
    },
}
impl Predicate {
    /// Every predicate keyword accepted after `select`.
    pub const NAMES: [&'static str; 15] = [
        "exact",
        "contains",
        "startswith",
        "endswith",
        "extension-exact",
        "extension-contains",
        "glob",
        "match",
        "search",
        "created-before",
        "created-after",
        "created-equal",
        "modified-before",
        "modified-after",
        "modified-equal",
    ];

    /// Date predicate for a keyword such as `created-before`.
    pub fn date(keyword: &str, date: PrimitiveDateTime, precision: Precision) -> Option<Self> {
        let (attribute, relation) = keyword.split_once('-')?;
        let attribute = match attribute {
            "created" => TimeAttribute::Created,
            "modified" => TimeAttribute::Modified,
            _ => return None,
        };
        let relation = match relation {
            "before" => Relation::Before,
            "after" => Relation::After,
            "equal" => Relation::Equal,
            _ => return None,
        };
        Some(Self::Date { attribute, relation, date, precision })
    }

    fn test(&self, record: &mut FileRecord, backend: BackendRef<'_>, offset: UtcOffset) -> Result<bool> {
        let name = record.name();
        let hit = match self {
            Self::Exact(word) => name == *word,
            Self::Contains(word) => name.contains(word.as_str()),
            Self::StartsWith(word) => name.starts_with(word.as_str()),
            Self::EndsWith(word) => {
                let stem = match last_extension(&name) {
                    Some(ext) => &name[..name.len() - ext.len() - 1],
                    None => split_name(&name).0,
                };
                stem.ends_with(word.as_str())
            },
            Self::ExtensionExact(word) => last_extension(&name) == Some(word.as_str()),
            Self::ExtensionContains(word) => last_extension(&name).is_some_and(|ext| ext.contains(word.as_str())),
            Self::Glob(pattern) => pattern.matches(&name),
            Self::Match(regex) => regex.find(&name).is_some_and(|m| m.start() == 0),
            Self::Search(regex) => regex.is_match(&name),
            Self::Date { attribute, relation, date, precision } => {
                let meta = record.meta(backend)?;
                let at = match attribute {
                    TimeAttribute::Created => meta.created,
                    TimeAttribute::Modified => meta.modified,
                };
                let at = precision.truncate(local(at, offset));
                let date = precision.truncate(*date);
                match relation {
                    Relation::Before => at < date,
                    Relation::After => at > date,
                    Relation::Equal => at == date,
                }
            },
        };
        Ok(hit)
    }
}

#[derive(Clone, Debug)]
pub enum Instruction {
    Connect(Connector),
    Test(Predicate),
}

/// A validated selection expression.
#[derive(Clone, Debug, Default)]
pub struct Expression {
    instructions: Vec<Instruction>,
}
impl Expression {
    /// Returns [`DanglingConnector`](ErrorKind::DanglingConnector) when the
    /// last instruction is a connector.
    pub fn new(instructions: Vec<Instruction>) -> Result<Self> {
        if let Some(Instruction::Connect(connector)) = instructions.last() {
            exn::bail!(ErrorKind::DanglingConnector(connector.keyword().to_string()));
        }
        Ok(Self { instructions })
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    fn matches(&self, record: &mut FileRecord, backend: BackendRef<'_>, offset: UtcOffset) -> Result<bool> {
        let mut acc = true;
        let mut connector = Connector::And;
        for instruction in &self.instructions {
            match instruction {
                Instruction::Connect(next) => connector = *next,
                Instruction::Test(predicate) => acc = connector.combine(acc, predicate.test(record, backend, offset)?),
            }
        }
        Ok(acc)
    }

    /// Keep the records the expression holds for, preserving their order.
    #[instrument(skip_all, fields(candidates = records.len()))]
    pub(crate) fn filter(
        &self,
        records: Vec<FileRecord>,
        backend: BackendRef<'_>,
        offset: UtcOffset,
    ) -> Result<Vec<FileRecord>> {
        let mut selected = Vec::with_capacity(records.len());
        for mut record in records {
            if self.matches(&mut record, backend, offset)? {
                selected.push(record);
            } else {
                tracing::trace!(file = %record.path().display(), "not selected");
            }
        }
        tracing::debug!(selected = selected.len(), "selection evaluated");
        Ok(selected)
    }
}
