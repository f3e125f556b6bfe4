//! Field values and their ordering.

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, format_description};

/// How much of a timestamp is kept when it is extracted or compared.
///
/// Two timestamps that agree down to the precision are equal, which is what
/// makes "same day" grouping and `created-equal` work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precision {
    Seconds,
    Minutes,
    Hours,
    #[default]
    Days,
}
impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hour" | "hours" => Ok(Self::Hours),
            "d" | "day" | "days" => Ok(Self::Days),
            other => exn::bail!(ErrorKind::Parse(format!("unknown precision '{other}', expected s, m, h or d"))),
        }
    }
}
impl Precision {
    /// Zero every component finer than this precision.
    pub fn truncate(self, at: PrimitiveDateTime) -> PrimitiveDateTime {
        let (hour, minute, second) = at.time().as_hms();
        let kept = match self {
            Self::Days => Duration::ZERO,
            Self::Hours => Duration::hours(hour.into()),
            Self::Minutes => Duration::hours(hour.into()) + Duration::minutes(minute.into()),
            Self::Seconds => {
                Duration::hours(hour.into()) + Duration::minutes(minute.into()) + Duration::seconds(second.into())
            },
        };
        at.replace_time(Time::MIDNIGHT + kept)
    }

    /// Render a timestamp as `YYYY-MM-DD`, extended with `-HH`, `-MM` and
    /// `-SS` as precision allows. The output is safe to use in a file name.
    pub fn render(self, at: PrimitiveDateTime) -> String {
        let mut out = format!("{:04}-{:02}-{:02}", at.year(), u8::from(at.month()), at.day());
        if self <= Self::Hours {
            out.push_str(&format!("-{:02}", at.hour()));
        }
        if self <= Self::Minutes {
            out.push_str(&format!("-{:02}", at.minute()));
        }
        if self == Self::Seconds {
            out.push_str(&format!("-{:02}", at.second()));
        }
        out
    }
}

/// Convert a file timestamp to wall-clock time in `offset`.
pub(crate) fn local(at: OffsetDateTime, offset: UtcOffset) -> PrimitiveDateTime {
    let at = at.checked_to_offset(offset).unwrap_or(at);
    PrimitiveDateTime::new(at.date(), at.time())
}

/// Parse a user supplied date with a `time` format description.
///
/// Formats without a time component parse to midnight.
pub fn parse_date(input: &str, format: &str) -> Result<PrimitiveDateTime> {
    let items = format_description::parse_borrowed::<2>(format)
        .or_raise(|| ErrorKind::Pattern(format!("invalid date format '{format}'")))?;
    if let Ok(at) = PrimitiveDateTime::parse(input, &items) {
        return Ok(at);
    }
    let date = Date::parse(input, &items)
        .or_raise(|| ErrorKind::Parse(format!("'{input}' does not match date format '{format}'")))?;
    Ok(date.midnight())
}

/// A single extracted value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Text(String),
    Integer(i64),
    /// Wall-clock time, already truncated to its precision
    Timestamp(PrimitiveDateTime, Precision),
}
impl Value {
    pub fn timestamp(at: OffsetDateTime, offset: UtcOffset, precision: Precision) -> Self {
        Self::Timestamp(precision.truncate(local(at, offset)), precision)
    }

    fn sort_key(&self) -> SortKey<'_> {
        match self {
            Self::Integer(n) => SortKey::Number(*n as f64),
            Self::Timestamp(at, _) => SortKey::Time(*at),
            Self::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => SortKey::Number(n),
                _ => SortKey::Text(s),
            },
        }
    }

    /// Total ordering used by sorting.
    ///
    /// Numbers (including numeric-looking text) sort before timestamps, which
    /// sort before other text. Within each class the natural order applies.
    /// Values that are equal in that order but spelled differently, like
    /// `01` and `1`, are ordered by their text, so only values that group
    /// together compare as equal.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Timestamp(at, precision) => f.write_str(&precision.render(*at)),
        }
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

enum SortKey<'a> {
    Number(f64),
    Time(PrimitiveDateTime),
    Text(&'a str),
}
impl SortKey<'_> {
    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Time(_) => 1,
            Self::Text(_) => 2,
        }
    }
}
impl PartialEq for SortKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for SortKey<'_> {}
impl PartialOrd for SortKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    #[rstest]
    #[case(Precision::Days, "2024-03-09")]
    #[case(Precision::Hours, "2024-03-09-14")]
    #[case(Precision::Minutes, "2024-03-09-14-05")]
    #[case(Precision::Seconds, "2024-03-09-14-05-59")]
    fn test_truncate_and_render(#[case] precision: Precision, #[case] expected: &str) {
        let at = datetime!(2024-03-09 14:05:59.25);
        assert_eq!(precision.render(precision.truncate(at)), expected);
    }

    #[test]
    fn test_same_day_timestamps_are_equal() {
        let morning = Value::timestamp(datetime!(2024-03-09 08:00 UTC), UtcOffset::UTC, Precision::Days);
        let evening = Value::timestamp(datetime!(2024-03-09 21:30 UTC), UtcOffset::UTC, Precision::Days);
        let hourly = Value::timestamp(datetime!(2024-03-09 21:30 UTC), UtcOffset::UTC, Precision::Hours);
        assert_eq!(morning, evening);
        assert_ne!(evening, hourly);
    }

    #[rstest]
    #[case("s", Precision::Seconds)]
    #[case("min", Precision::Minutes)]
    #[case("H", Precision::Hours)]
    #[case(" d ", Precision::Days)]
    fn test_precision_from_str(#[case] input: &str, #[case] expected: Precision) {
        assert_eq!(input.parse::<Precision>().unwrap(), expected);
    }

    #[test]
    fn test_precision_rejects_unknown() {
        let err = "fortnight".parse::<Precision>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Parse(_)));
    }

    #[rstest]
    #[case("09/03/2024", "[day]/[month]/[year]", datetime!(2024-03-09 0:00))]
    #[case("2024-03-09 14:05", "[year]-[month]-[day] [hour]:[minute]", datetime!(2024-03-09 14:05))]
    fn test_parse_date(#[case] input: &str, #[case] format: &str, #[case] expected: PrimitiveDateTime) {
        assert_eq!(parse_date(input, format).unwrap(), expected);
    }

    #[test]
    fn test_parse_date_errors() {
        let err = parse_date("09/03/2024", "[day").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Pattern(_)));
        let err = parse_date("yesterday", "[day]/[month]/[year]").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Parse(_)));
    }

    #[test]
    fn test_numeric_text_sorts_numerically() {
        let mut values: Vec<Value> = ["10", "9", "b", "a", "100"].into_iter().map(Value::from).collect();
        values.push(Value::Integer(50));
        values.sort_by(Value::compare);
        let rendered: Vec<_> = values.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["9", "10", "50", "100", "a", "b"]);
    }

    #[rstest]
    #[case(Value::from("01"), Value::from("1"), Ordering::Less)]
    #[case(Value::from("1.0"), Value::from("1"), Ordering::Greater)]
    #[case(Value::from("1"), Value::Integer(1), Ordering::Equal)]
    #[case(Value::from("09"), Value::from("10"), Ordering::Less)]
    fn test_numeric_spellings(#[case] a: Value, #[case] b: Value, #[case] expected: Ordering) {
        assert_eq!(a.compare(&b), expected);
    }

    #[test]
    fn test_timestamps_sort_chronologically() {
        let early = Value::timestamp(datetime!(2020-01-02 0:00 UTC), UtcOffset::UTC, Precision::Days);
        let late = Value::timestamp(datetime!(2021-01-01 0:00 UTC), UtcOffset::UTC, Precision::Days);
        assert_eq!(early.compare(&late), Ordering::Less);
        assert_eq!(Value::from("zzz").compare(&early), Ordering::Greater);
    }
}
