//! Name and folder templates.
//!
//! A template is literal text with `{reference}` placeholders. A reference is
//! a field name, a column index, `data_<n>` for the n-th unnamed column, or
//! one of the built-ins:
//!
//! | Reference     | Value                                              |
//! |---------------|----------------------------------------------------|
//! | `filename`    | Pending file name, extension included              |
//! | `basename`    | Pending file name up to its first dot              |
//! | `extension`   | Everything after that dot (empty if there is none) |
//! | `original`    | File name at selection time                        |
//! | `group`       | Key of the record's group, joined by the separator |
//! | `group-index` | Rank of the record's group                         |
//! | `subindex`    | Rank of the record inside its group                |
//!
//! Placeholders can be piped through modifiers, applied left to right:
//! `slug`, `upper`, `lower`, `trim`, `truncate:N` (characters) and `pad:N`
//! (left pad with zeros). `{{` and `}}` produce literal braces.
//!
//! ```
//! use foldr_pipeline::template::{Lookup, Reference, Template};
//! # use foldr_pipeline::error::Result;
//!
//! struct Fixed;
//! impl Lookup for Fixed {
//!     fn lookup(&self, reference: &Reference) -> Result<String> {
//!         Ok(match reference {
//!             Reference::Name(name) => format!("{name} value"),
//!             Reference::Index(index) => index.to_string(),
//!         })
//!     }
//! }
//!
//! let template: Template = "{title|slug}-{0|pad:3} {{x}}".parse().unwrap();
//! assert_eq!(template.render(&Fixed).unwrap(), "title-value-000 {x}");
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::fields::{Column, FieldTable, GROUP, GROUP_INDEX, SUBINDEX};
use crate::record::{FileRecord, split_name};
use rslug::slugify;
use std::fmt;
use std::str::FromStr;

/// What a placeholder points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reference {
    Name(String),
    Index(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modifier {
    Slug,
    Upper,
    Lower,
    Trim,
    Truncate(usize),
    Pad(usize),
}
impl FromStr for Modifier {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (s.trim(), None),
        };
        let width = || -> Result<usize> {
            let Some(arg) = arg else {
                exn::bail!(ErrorKind::Parse(format!("modifier '{name}' needs a width, e.g. {name}:3")));
            };
            arg.parse().map_err(|_| exn::Exn::from(ErrorKind::Parse(format!("invalid width '{arg}' for '{name}'"))))
        };
        match name {
            "slug" => Ok(Self::Slug),
            "upper" => Ok(Self::Upper),
            "lower" => Ok(Self::Lower),
            "trim" => Ok(Self::Trim),
            "truncate" => Ok(Self::Truncate(width()?)),
            "pad" => Ok(Self::Pad(width()?)),
            _ => exn::bail!(ErrorKind::Parse(format!("unknown template modifier '{name}'"))),
        }
    }
}
impl Modifier {
    fn apply(self, value: String) -> String {
        match self {
            Self::Slug => {
                // Quotation marks would otherwise turn into stray hyphens.
                let marks = ['\'', '"', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '`', '«', '»'];
                let stripped: String = value.chars().filter(|c| !marks.contains(c)).collect();
                slugify!(&stripped)
            },
            Self::Upper => value.to_uppercase(),
            Self::Lower => value.to_lowercase(),
            Self::Trim => value.trim().to_string(),
            Self::Truncate(max) => value.chars().take(max).collect(),
            Self::Pad(width) => format!("{value:0>width$}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { reference: Reference, modifiers: Vec<Modifier> },
}

/// Resolves placeholder references while rendering.
pub trait Lookup {
    /// Returns [`MissingField`](ErrorKind::MissingField) for references it
    /// does not know.
    fn lookup(&self, reference: &Reference) -> Result<String>;
}

/// A parsed template, reusable across records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}
impl FromStr for Template {
    type Err = Error;

    /// Parse eagerly so syntax errors surface before any record is touched.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                },
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                },
                '}' => exn::bail!(ErrorKind::Parse(format!("unmatched '}}' in template '{s}'"))),
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                exn::bail!(ErrorKind::Parse(format!("unterminated placeholder in template '{s}'")))
                            },
                            Some(c) => inner.push(c),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Self::placeholder(&inner)?);
                },
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { source: s.to_string(), segments })
    }
}
impl Template {
    fn placeholder(inner: &str) -> Result<Segment> {
        let mut parts = inner.split('|');
        let reference = parts.next().unwrap_or_default().trim();
        if reference.is_empty() {
            exn::bail!(ErrorKind::Parse("empty placeholder '{}'".to_string()));
        }
        let reference = match reference.parse::<usize>() {
            Ok(index) => Reference::Index(index),
            Err(_) => Reference::Name(reference.to_string()),
        };
        let modifiers = parts.map(str::parse).collect::<Result<Vec<Modifier>>>()?;
        Ok(Segment::Placeholder { reference, modifiers })
    }

    pub fn render(&self, lookup: &impl Lookup) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { reference, modifiers } => {
                    let value = lookup.lookup(reference)?;
                    out.push_str(&modifiers.iter().fold(value, |value, modifier| modifier.apply(value)));
                },
            }
        }
        Ok(out)
    }
}
impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Resolves references against one record of the working set.
pub(crate) struct RecordScope<'a> {
    pub table: &'a FieldTable,
    pub record: &'a FileRecord,
    /// Joins the parts of a composite `{group}` key
    pub separator: &'a str,
}
impl Lookup for RecordScope<'_> {
    fn lookup(&self, reference: &Reference) -> Result<String> {
        let column = match reference {
            Reference::Index(index) => Column::Field(*index),
            Reference::Name(name) => {
                let pending = self.record.pending().name();
                match name.as_str() {
                    "filename" => return Ok(pending.into_owned()),
                    "basename" => return Ok(split_name(&pending).0.to_string()),
                    "extension" => return Ok(split_name(&pending).1.unwrap_or_default().to_string()),
                    "original" => return Ok(self.record.name()),
                    GROUP => Column::Group,
                    GROUP_INDEX => Column::GroupIndex,
                    SUBINDEX => Column::Subindex,
                    _ => Column::Field(
                        self.table
                            .position(name)
                            .ok_or_else(|| exn::Exn::from(ErrorKind::MissingField(name.clone())))?,
                    ),
                }
            },
        };
        Ok(self.table.value(self.record, column, self.separator)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GroupSlot;
    use crate::value::Value;
    use rstest::rstest;

    fn scope_fixture() -> (FieldTable, FileRecord) {
        let mut table = FieldTable::default();
        table.push(Some("title".into())).unwrap();
        table.push(None).unwrap();
        let mut record = FileRecord::new("My Song.final.mp3");
        record.values = vec![Value::from("It's \u{201C}Quoted\u{201D} "), Value::Integer(7)];
        record.slot = Some(GroupSlot {
            index: 2,
            subindex: 0,
            key: vec![Value::from("rock"), Value::Integer(1999)],
        });
        (table, record)
    }

    fn render(template: &str) -> Result<String> {
        let (table, record) = scope_fixture();
        let scope = RecordScope { table: &table, record: &record, separator: "_" };
        template.parse::<Template>()?.render(&scope)
    }

    #[rstest]
    #[case("{filename}", "My Song.final.mp3")]
    #[case("{basename}", "My Song")]
    #[case("{extension}", "final.mp3")]
    #[case("{original|upper}", "MY SONG.FINAL.MP3")]
    #[case("{title|trim}", "It's \u{201C}Quoted\u{201D}")]
    #[case("{title|slug}", "its-quoted")]
    #[case("{title|slug|truncate:3}", "its")]
    #[case("{1|pad:3}", "007")]
    #[case("{data_0}", "7")]
    #[case("{group} #{group-index}.{subindex}", "rock_1999 #2.0")]
    #[case("{{{basename|lower}}}", "{my song}")]
    #[case("no placeholders", "no placeholders")]
    fn test_render(#[case] template: &str, #[case] expected: &str) {
        assert_eq!(render(template).unwrap(), expected);
    }

    #[rstest]
    #[case("{basename")]
    #[case("{a{b}}")]
    #[case("oops}")]
    #[case("{}")]
    #[case("{ | upper}")]
    #[case("{title|shout}")]
    #[case("{title|pad}")]
    #[case("{title|truncate:x}")]
    fn test_parse_errors(#[case] template: &str) {
        let err = template.parse::<Template>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Parse(_)));
    }

    #[rstest]
    #[case("{nope}")]
    #[case("{5}")]
    #[case("{data_1}")]
    fn test_missing_references(#[case] template: &str) {
        let err = render(template).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingField(_)));
    }

    #[test]
    fn test_group_without_grouping_is_missing() {
        let table = FieldTable::default();
        let record = FileRecord::new("a.txt");
        let scope = RecordScope { table: &table, record: &record, separator: " " };
        let err = "{group}".parse::<Template>().unwrap().render(&scope).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingField(_)));
    }

    #[test]
    fn test_displays_source() {
        let template: Template = "{a}-{0}{{b}}".parse().unwrap();
        assert_eq!(template.to_string(), "{a}-{0}{{b}}");
    }
}
