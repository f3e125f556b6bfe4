//! Parsing the chained command line into typed commands.
//!
//! A pipeline is one flat token stream:
//!
//! ```text
//! select contains IMG extract ctime -v day group using -v day infold folder-template {day} apply
//! ```
//!
//! A verb (`select`, `extract`, `sort`, `group`, `rename`, `infold`) switches
//! mode; every following token up to the next verb is a sub-command of that
//! mode with its arguments. After `select` the sub-commands are predicates
//! and connectors. Each sub-command's arguments are declared as a clap
//! struct; how many tokens belong to it is read off that declaration
//! (positionals first-come, then any recognised option with its values), and
//! the slice is then handed to clap for the actual parsing.
//!
//! The whole stream is parsed before anything runs, so a typo anywhere aborts
//! the invocation before a single file is touched.

use crate::error::{ErrorKind, Result};
use crate::extract::{Counter, Extraction};
use crate::fields::FieldRef;
use crate::infold::Folder;
use crate::rename::RenameOp;
use crate::select::{Connector, Expression, Instruction, Predicate, TimeAttribute};
use crate::template::Template;
use crate::value::{Precision, parse_date};
use clap::{Arg, ArgMatches, Parser};
use exn::ResultExt;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One step of the pipeline.
#[derive(Clone, Debug)]
pub enum Command {
    Select(Expression),
    Extract { extraction: Extraction, name: Option<String> },
    Sort { keys: Vec<FieldRef>, reverse: bool },
    Group { keys: Vec<FieldRef> },
    Rename(RenameOp),
    Infold(Folder),
    Apply,
}

/// A parsed command line.
#[derive(Clone, Debug, Default)]
pub struct Script {
    /// Directory given with `select --dir`
    pub dir: Option<PathBuf>,
    pub commands: Vec<Command>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Select,
    Extract,
    Sort,
    Group,
    Rename,
    Infold,
}
impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "select" => Ok(Self::Select),
            "extract" => Ok(Self::Extract),
            "sort" => Ok(Self::Sort),
            "group" => Ok(Self::Group),
            "rename" => Ok(Self::Rename),
            "infold" => Ok(Self::Infold),
            _ => Err(()),
        }
    }
}
impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Select => "select",
            Self::Extract => "extract",
            Self::Sort => "sort",
            Self::Group => "group",
            Self::Rename => "rename",
            Self::Infold => "infold",
        })
    }
}

/// Argument declarations of every sub-command.
mod args {
    use clap::{Args, Parser};
    use std::path::PathBuf;

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Select {
        /// Directory to organize instead of the current one
        #[arg(short, long)]
        pub dir: Option<PathBuf>,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Word {
        #[arg(allow_hyphen_values = true)]
        pub word: String,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Date {
        pub date: String,
        /// Format of DATE, e.g. "[day]/[month]/[year]"
        #[arg(long)]
        pub date_format: Option<String>,
        /// Precision of the comparison: s, m, h or d
        #[arg(short, long)]
        pub sensibility: Option<String>,
    }

    #[derive(Debug, Args)]
    pub struct Var {
        /// Name of the new field
        #[arg(short = 'v', long = "var")]
        pub var: Option<String>,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Plain {
        #[command(flatten)]
        pub var: Var,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Time {
        #[arg(short, long)]
        pub sensibility: Option<String>,
        #[command(flatten)]
        pub var: Var,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Span {
        /// Index of the first letter or word
        pub start: usize,
        #[arg(long, default_value_t = 1)]
        pub span: usize,
        #[command(flatten)]
        pub var: Var,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct LastLetter {
        #[arg(long, default_value_t = 1)]
        pub span: usize,
        #[command(flatten)]
        pub var: Var,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Capture {
        #[arg(allow_hyphen_values = true)]
        pub expr: String,
        /// Capture group to keep, 0 being the whole match
        #[arg(short, long)]
        pub group: Option<usize>,
        #[command(flatten)]
        pub var: Var,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Counter {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        pub start: i64,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        pub step: i64,
        #[arg(short, long)]
        pub reverse: bool,
        #[command(flatten)]
        pub var: Var,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct SubIndex {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        pub start: i64,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        pub step: i64,
        #[command(flatten)]
        pub var: Var,
    }

    #[derive(Debug, Args)]
    pub struct Keys {
        /// Every extracted field, in extraction order
        #[arg(short, long)]
        pub all: bool,
        #[arg(short = 'v', long = "var")]
        pub vars: Vec<String>,
        #[arg(short = 'i', long = "index")]
        pub indices: Vec<usize>,
        /// Inclusive range of field indices
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        pub slice: Vec<usize>,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct SortBy {
        #[command(flatten)]
        pub keys: Keys,
        #[arg(short, long)]
        pub reverse: bool,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct GroupUsing {
        #[command(flatten)]
        pub keys: Keys,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Replace {
        #[arg(allow_hyphen_values = true)]
        pub old: String,
        #[arg(short, long, default_value = "", allow_hyphen_values = true)]
        pub replacement: String,
        #[arg(short, long)]
        pub count: Option<usize>,
        /// Replace with a space
        #[arg(short, long)]
        pub space: bool,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Sub {
        #[arg(allow_hyphen_values = true)]
        pub expr: String,
        #[arg(short, long, default_value = "", allow_hyphen_values = true)]
        pub replacement: String,
        /// Maximum number of substitutions, 0 for all
        #[arg(short, long, default_value_t = 0)]
        pub count: usize,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Capitalise {
        /// Character that separates words
        #[arg(long = "char", default_value = " ")]
        pub separator: String,
        #[arg(long)]
        pub count: Option<usize>,
        /// Leave the first word alone
        #[arg(short, long)]
        pub keep_start: bool,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Bare {}

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct Template {
        #[arg(allow_hyphen_values = true)]
        pub template: String,
    }

    #[derive(Debug, Parser)]
    #[command(disable_help_flag = true)]
    pub struct FolderTemplate {
        #[arg(allow_hyphen_values = true)]
        pub template: String,
        /// Joins the parts of `{group}`
        #[arg(long)]
        pub joinchar: Option<String>,
    }
}

/// Number of values an option consumes after its flag.
fn arity(arg: &Arg) -> usize {
    match arg.get_action().takes_values() {
        true => arg.get_num_args().map(|range| range.min_values()).unwrap_or(1).max(1),
        false => 0,
    }
}

/// How many of `tokens` belong to a sub-command declared as `command`.
///
/// Positionals are taken in order until all are filled; options are taken
/// with their values wherever they appear. The first token that is neither
/// ends the sub-command.
fn extent(name: &str, command: &clap::Command, tokens: &[String]) -> Result<usize> {
    let mut positionals = command.get_positionals().count();
    let mut taken = 0;
    while let Some(token) = tokens.get(taken) {
        let option = if let Some(long) = token.strip_prefix("--") {
            let (flag, inline) = match long.split_once('=') {
                Some((flag, _)) => (flag, true),
                None => (long, false),
            };
            command.get_arguments().find(|a| a.get_long() == Some(flag)).map(|a| (a, inline))
        } else {
            let mut chars = token.chars();
            match (chars.next(), chars.next(), chars.next()) {
                (Some('-'), Some(short), None) => {
                    command.get_arguments().find(|a| a.get_short() == Some(short)).map(|a| (a, false))
                },
                _ => None,
            }
        };
        match option {
            Some((arg, inline)) => {
                taken += 1;
                if !inline {
                    taken += arity(arg);
                }
            },
            None if positionals > 0 => {
                positionals -= 1;
                taken += 1;
            },
            None if token.len() > 1 && token.starts_with('-') && token[1..].parse::<f64>().is_err() => {
                exn::bail!(ErrorKind::Parse(format!("unknown option '{token}' for '{name}'")));
            },
            None => break,
        }
    }
    if taken > tokens.len() {
        exn::bail!(ErrorKind::Parse(format!("'{name}' is missing an option value")));
    }
    Ok(taken)
}

/// Parse the arguments of the sub-command `name` from the head of `rest`.
fn take<T: Parser>(name: &str, rest: &[String]) -> Result<(T, usize)> {
    let (parsed, _, taken) = take_matches(name, rest)?;
    Ok((parsed, taken))
}

/// Like [`take`], also returning the raw matches so that the order of the
/// given options can be read back.
fn take_matches<T: Parser>(name: &str, rest: &[String]) -> Result<(T, ArgMatches, usize)> {
    let invalid = || ErrorKind::Parse(format!("invalid arguments for '{name}'"));
    let taken = extent(name, &T::command(), rest)?;
    let argv = std::iter::once(name).chain(rest[..taken].iter().map(String::as_str));
    let matches = T::command().try_get_matches_from(argv).or_raise(invalid)?;
    let parsed = T::from_arg_matches(&matches).or_raise(invalid)?;
    Ok((parsed, matches, taken))
}

fn regex(expr: &str) -> Result<Regex> {
    Regex::new(expr).or_raise(|| ErrorKind::Pattern(format!("invalid regular expression '{expr}'")))
}

fn template(source: &str) -> Result<Template> {
    source.parse()
}

/// Key references in the order they were given; the first one is primary.
fn keys(keys: args::Keys, matches: &ArgMatches) -> Result<Vec<FieldRef>> {
    if keys.all {
        return Ok(vec![FieldRef::All]);
    }
    let positions = |id: &str| matches.indices_of(id).into_iter().flatten();
    let mut refs: Vec<(usize, FieldRef)> =
        positions("vars").zip(keys.vars).map(|(at, name)| (at, FieldRef::Name(name))).collect();
    refs.extend(positions("indices").zip(keys.indices).map(|(at, index)| (at, FieldRef::Index(index))));
    refs.extend(
        positions("slice")
            .step_by(2)
            .zip(keys.slice.chunks(2))
            .map(|(at, pair)| (at, FieldRef::Slice { start: pair[0], end: pair[pair.len() - 1] })),
    );
    if refs.is_empty() {
        exn::bail!(ErrorKind::Parse("no key given; use --all, -v NAME, -i INDEX or --slice START END".into()));
    }
    refs.sort_by_key(|(at, _)| *at);
    Ok(refs.into_iter().map(|(_, key)| key).collect())
}

/// Turns the token stream into a [`Script`].
///
/// Date predicates fall back to `date_format` and `precision` when their own
/// options are absent, and so do the timestamp extractions for precision.
#[derive(Clone, Debug)]
pub struct CommandParser {
    pub date_format: String,
    pub precision: Precision,
}
impl Default for CommandParser {
    fn default() -> Self {
        Self {
            date_format: "[day]/[month]/[year]".to_string(),
            precision: Precision::Days,
        }
    }
}
impl CommandParser {
    pub fn parse<I, S>(&self, tokens: I) -> Result<Script>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut script = Script::default();
        let mut verb: Option<Verb> = None;
        let mut selection: Option<Vec<Instruction>> = None;
        let mut selected = false;
        let mut at = 0;
        while let Some(token) = tokens.get(at) {
            let rest = &tokens[at + 1..];
            if let Ok(next) = token.parse::<Verb>() {
                if let Some(instructions) = selection.take() {
                    script.commands.push(Command::Select(Expression::new(instructions)?));
                }
                at += 1;
                if next == Verb::Select {
                    if selected || !script.commands.is_empty() {
                        exn::bail!(ErrorKind::Parse("'select' must come first and only once".into()));
                    }
                    let (args, taken): (args::Select, _) = take("select", rest)?;
                    script.dir = args.dir;
                    selection = Some(Vec::new());
                    selected = true;
                    at += taken;
                }
                verb = Some(next);
                continue;
            }
            let taken = match (verb, selection.as_mut()) {
                (None, _) => exn::bail!(ErrorKind::Parse(format!(
                    "expected select, extract, sort, group, rename or infold, found '{token}'"
                ))),
                (Some(Verb::Select), Some(instructions)) => self.select(token, rest, instructions)?,
                (Some(verb), _) => {
                    let (command, taken) = self.command(verb, token, rest)?;
                    script.commands.push(command);
                    taken
                },
            };
            at += 1 + taken;
        }
        if let Some(instructions) = selection.take() {
            script.commands.push(Command::Select(Expression::new(instructions)?));
        }
        Ok(script)
    }

    fn select(&self, token: &str, rest: &[String], instructions: &mut Vec<Instruction>) -> Result<usize> {
        if let Some(connector) = Connector::from_keyword(token) {
            instructions.push(Instruction::Connect(connector));
            return Ok(0);
        }
        let (predicate, taken) = match token {
            "exact" | "contains" | "startswith" | "endswith" | "extension-exact" | "extension-contains" => {
                let (args::Word { word }, taken) = take(token, rest)?;
                let predicate = match token {
                    "exact" => Predicate::Exact(word),
                    "contains" => Predicate::Contains(word),
                    "startswith" => Predicate::StartsWith(word),
                    "endswith" => Predicate::EndsWith(word),
                    "extension-exact" => Predicate::ExtensionExact(word),
                    _ => Predicate::ExtensionContains(word),
                };
                (predicate, taken)
            },
            "glob" => {
                let (args::Word { word }, taken) = take(token, rest)?;
                let pattern = glob::Pattern::new(&word)
                    .or_raise(|| ErrorKind::Pattern(format!("invalid glob '{word}'")))?;
                (Predicate::Glob(pattern), taken)
            },
            "match" | "search" => {
                let (args::Word { word }, taken) = take(token, rest)?;
                let regex = regex(&word)?;
                match token {
                    "match" => (Predicate::Match(regex), taken),
                    _ => (Predicate::Search(regex), taken),
                }
            },
            _ if Predicate::NAMES.contains(&token) => {
                let (args, taken): (args::Date, _) = take(token, rest)?;
                let format = args.date_format.as_deref().unwrap_or(&self.date_format);
                let precision = self.precision(args.sensibility.as_deref())?;
                let date = parse_date(&args.date, format)?;
                let predicate = Predicate::date(token, date, precision)
                    .ok_or_else(|| exn::Exn::from(ErrorKind::UnknownPredicate(token.to_string())))?;
                (predicate, taken)
            },
            _ => exn::bail!(ErrorKind::UnknownPredicate(token.to_string())),
        };
        instructions.push(Instruction::Test(predicate));
        Ok(taken)
    }

    fn precision(&self, given: Option<&str>) -> Result<Precision> {
        given.map_or(Ok(self.precision), str::parse)
    }

    fn command(&self, verb: Verb, token: &str, rest: &[String]) -> Result<(Command, usize)> {
        let unknown = || exn::Exn::from(ErrorKind::Parse(format!("unknown {verb} command '{token}'")));
        let extract = |extraction: Extraction, var: args::Var| Command::Extract { extraction, name: var.var };
        let parsed = match (verb, token) {
            (Verb::Extract, "name" | "extension" | "first-letter") => {
                let (args::Plain { var }, taken) = take(token, rest)?;
                let extraction = match token {
                    "name" => Extraction::Name,
                    "extension" => Extraction::Extension,
                    _ => Extraction::Letters { start: 0, span: 1 },
                };
                (extract(extraction, var), taken)
            },
            (Verb::Extract, "ctime" | "mtime") => {
                let (args::Time { sensibility, var }, taken) = take(token, rest)?;
                let attribute = match token {
                    "ctime" => TimeAttribute::Created,
                    _ => TimeAttribute::Modified,
                };
                let precision = self.precision(sensibility.as_deref())?;
                (extract(Extraction::Time(attribute, precision), var), taken)
            },
            (Verb::Extract, "nth-letter" | "words") => {
                let (args::Span { start, span, var }, taken) = take(token, rest)?;
                let extraction = match token {
                    "nth-letter" => Extraction::Letters { start, span },
                    _ => Extraction::Words { start, span },
                };
                (extract(extraction, var), taken)
            },
            (Verb::Extract, "last-letter") => {
                let (args::LastLetter { span, var }, taken) = take(token, rest)?;
                (extract(Extraction::LastLetters { span }, var), taken)
            },
            (Verb::Extract, "matching" | "searching") => {
                let (args::Capture { expr, group, var }, taken) = take(token, rest)?;
                let extraction = Extraction::Capture { regex: regex(&expr)?, group, anchored: token == "matching" };
                (extract(extraction, var), taken)
            },
            (Verb::Extract, "position" | "group-index") => {
                let (args::Counter { start, step, reverse, var }, taken) = take(token, rest)?;
                let counter = Counter { start, step, reverse };
                let extraction = match token {
                    "position" => Extraction::Position(counter),
                    _ => Extraction::GroupIndex(counter),
                };
                (extract(extraction, var), taken)
            },
            (Verb::Extract, "sub-index") => {
                let (args::SubIndex { start, step, var }, taken) = take(token, rest)?;
                (extract(Extraction::SubIndex(Counter { start, step, reverse: false }), var), taken)
            },
            (Verb::Sort, "by") => {
                let (args::SortBy { keys: k, reverse }, matches, taken) = take_matches(token, rest)?;
                (Command::Sort { keys: keys(k, &matches)?, reverse }, taken)
            },
            (Verb::Group, "using") => {
                let (args::GroupUsing { keys: k }, matches, taken) = take_matches(token, rest)?;
                (Command::Group { keys: keys(k, &matches)? }, taken)
            },
            (Verb::Rename, "replace") => {
                let (args, taken): (args::Replace, _) = take(token, rest)?;
                let new = match args.space {
                    true => " ".to_string(),
                    false => args.replacement,
                };
                (Command::Rename(RenameOp::Replace { old: args.old, new, count: args.count }), taken)
            },
            (Verb::Rename, "sub") => {
                let (args::Sub { expr, replacement, count }, taken) = take(token, rest)?;
                (Command::Rename(RenameOp::Substitute { regex: regex(&expr)?, replacement, count }), taken)
            },
            (Verb::Rename, "capitalise" | "capitalize") => {
                let (args::Capitalise { separator, count, keep_start }, taken) = take(token, rest)?;
                (Command::Rename(RenameOp::Capitalise { separator, count, keep_start }), taken)
            },
            (Verb::Rename, "upper" | "lower") => {
                let (args::Bare {}, taken) = take(token, rest)?;
                let op = match token {
                    "upper" => RenameOp::Upper,
                    _ => RenameOp::Lower,
                };
                (Command::Rename(op), taken)
            },
            (Verb::Rename, "format") => {
                let (args::Template { template: source }, taken) = take(token, rest)?;
                (Command::Rename(RenameOp::Format(template(&source)?)), taken)
            },
            (Verb::Infold, "folder-name") => {
                let (args::Word { word }, taken) = take(token, rest)?;
                (Command::Infold(Folder::Name(word)), taken)
            },
            (Verb::Infold, "folder-template") => {
                let (args::FolderTemplate { template: source, joinchar }, taken) = take(token, rest)?;
                (Command::Infold(Folder::Template { template: template(&source)?, joinchar }), taken)
            },
            (Verb::Infold, "apply") => {
                let (args::Bare {}, taken) = take(token, rest)?;
                (Command::Apply, taken)
            },
            _ => return Err(unknown()),
        };
        Ok(parsed)
    }
}
