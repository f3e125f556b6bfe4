mod cli;
mod error;
mod logging;
mod report;

use crate::cli::Args;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use foldr_config::Config;
use foldr_pipeline::{CommandParser, Options, Pipeline};
use foldr_storage::backend::LocalBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use time::UtcOffset;

fn main() -> ExitCode {
    // Must run before any thread is spawned.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let args = Args::parse();
    match run(args, offset) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn run(args: Args, offset: UtcOffset) -> Result<()> {
    let config = Config::load(args.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    logging::init(args.verbose, &config.log);
    tracing::debug!(?config, "configuration loaded");

    let parser = CommandParser {
        date_format: config.date_format.clone(),
        precision: config.precision().or_raise(|| ErrorKind::Config)?,
    };
    let script = parser.parse(&args.tokens).or_raise(|| ErrorKind::Parse)?;

    let directory = args.directory.or(script.dir).unwrap_or_else(|| PathBuf::from("."));
    let root = std::path::absolute(&directory).or_raise(|| ErrorKind::Directory(directory.clone()))?;
    let backend = LocalBackend::new("local", &root).or_raise(|| ErrorKind::Directory(root.clone()))?;
    tracing::info!(root = %root.display(), "organizing");

    let options = Options {
        separator: args.separator.unwrap_or(config.separator),
        offset,
        dry_run: args.dry_run,
    };
    let mut pipeline = Pipeline::new(&backend, options);
    let result = pipeline.run(&script.commands).map(<[_]>::len);
    for report in pipeline.reports() {
        print!("{}", report::moves(report));
    }
    if args.verbose > 0 {
        print!("{}", report::selection(&pipeline));
    }
    result.or_raise(|| ErrorKind::Pipeline)?;
    Ok(())
}
