//! Command-line surface of the `foldr` binary.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Foldr - organize the files of a directory with a chained pipeline
///
/// Select files, extract fields from their names and timestamps, sort and
/// group them, then rename them and move them into folders:
///
///   foldr select extension-exact jpg extract ctime -v day group using -v day
///   infold folder-template {day} apply
#[derive(Parser, Debug, Clone)]
#[command(name = "foldr")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    ///
    /// Also prints the final selection, its fields and pending paths.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Directory to organize, instead of the current one
    #[arg(short = 'C', long = "directory")]
    pub directory: Option<PathBuf>,

    /// Read configuration from this file as well
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Print the moves `apply` would make without touching any file
    #[arg(short = 'n', long = "dry-run", action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Character joining the parts of a composite `{group}` key
    #[arg(long = "separator")]
    pub separator: Option<String>,

    /// The pipeline: select, extract, sort, group, rename and infold commands
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub tokens: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_tokens_keep_their_own_options() {
        let args = Args::try_parse_from(["foldr", "-vv", "-n", "extract", "name", "-v", "n", "--dry-run"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(args.dry_run);
        assert_eq!(args.tokens, ["extract", "name", "-v", "n", "--dry-run"]);
    }

    #[rstest]
    #[case(&["foldr", "-C", "/tmp", "select"], Some("/tmp"), None)]
    #[case(&["foldr", "--separator", "_", "--config", "a.toml", "select"], None, Some("_"))]
    fn test_global_options(#[case] argv: &[&str], #[case] directory: Option<&str>, #[case] separator: Option<&str>) {
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.directory, directory.map(PathBuf::from));
        assert_eq!(args.separator.as_deref(), separator);
        assert_eq!(args.tokens, ["select"]);
    }

    #[test]
    fn test_pipeline_is_required() {
        assert!(Args::try_parse_from(["foldr", "-v"]).is_err());
    }
}
