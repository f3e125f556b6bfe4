//! Pending destination folders.

use crate::error::{ErrorKind, Result};
use crate::template::{Lookup, Template};
use foldr_storage::validate_segment;

/// One folder segment appended to every record's pending folder chain.
#[derive(Clone, Debug)]
pub enum Folder {
    /// Literal name, surrounding whitespace trimmed
    Name(String),
    /// Rendered per record; `joinchar` overrides the configured separator
    /// for `{group}`.
    Template { template: Template, joinchar: Option<String> },
}
impl Folder {
    /// Render the segment for one record and check that it is usable as a
    /// single directory name.
    pub(crate) fn segment(&self, scope: &impl Lookup) -> Result<String> {
        let segment = match self {
            Self::Name(name) => name.trim().to_string(),
            Self::Template { template, .. } => template.render(scope)?,
        };
        match validate_segment(&segment) {
            Ok(()) => Ok(segment),
            Err(_) => exn::bail!(ErrorKind::InvalidName(segment)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Reference;
    use rstest::rstest;

    struct Year;
    impl Lookup for Year {
        fn lookup(&self, _: &Reference) -> Result<String> {
            Ok("2024".to_string())
        }
    }

    #[rstest]
    #[case(Folder::Name("Photos".into()), "Photos")]
    #[case(Folder::Name(" padded ".into()), "padded")]
    #[case(Folder::Template { template: "Y{year}".parse().unwrap(), joinchar: None }, "Y2024")]
    #[case(Folder::Template { template: " {year}".parse().unwrap(), joinchar: None }, " 2024")]
    fn test_segment(#[case] folder: Folder, #[case] expected: &str) {
        assert_eq!(folder.segment(&Year).unwrap(), expected);
    }

    #[rstest]
    #[case(Folder::Name("a/b".into()))]
    #[case(Folder::Name("..".into()))]
    #[case(Folder::Template { template: "{x}/..".parse().unwrap(), joinchar: None })]
    fn test_invalid_segment(#[case] folder: Folder) {
        let err = folder.segment(&Year).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(_)));
    }
}
