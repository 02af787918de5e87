//! Command line surface
//!
//! ```text
//! picsave [--config FILE] [--json] get <SOURCE>... [--out DIR] [--name NAME] ...
//! picsave [--config FILE] [--json] zip <SOURCE>... --name ARCHIVE [--dir SUBDIR] ...
//! ```
//!
//! Flags override the values loaded from `--config`.

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use picsave_core::{
    AcquisitionPreference, BatchOptions, ConvertFormat, DownloadOptions, DownloaderConfig,
    SourceValue,
};
use std::path::PathBuf;
use std::time::Duration;

/// Build the `picsave` command
#[must_use]
pub fn command() -> Command {
    Command::new("picsave")
        .version(crate::VERSION)
        .about("Download images and bundle them into ZIP archives")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML file with downloader defaults"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            acquisition_args(Command::new("get").about("Save each source as its own file"))
                .arg(
                    Arg::new("filename")
                        .long("name")
                        .help("Output file name; the extension is inferred when missing"),
                ),
        )
        .subcommand(
            acquisition_args(Command::new("zip").about("Collect sources into one ZIP archive"))
                .arg(
                    Arg::new("name")
                        .long("name")
                        .required(true)
                        .help("Archive name; '.zip' is appended"),
                )
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .help("Directory inside the archive to place images under"),
                ),
        )
}

fn acquisition_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("sources")
                .value_name("SOURCE")
                .num_args(1..)
                .required(true)
                .help("Image URLs or data: URLs"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .short('o')
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Directory to write files into"),
        )
        .arg(
            Arg::new("convert")
                .long("convert")
                .value_parser(|s: &str| s.parse::<ConvertFormat>())
                .help("Re-encode as webp, avif or jpg"),
        )
        .arg(
            Arg::new("prefer-network")
                .long("prefer-network")
                .action(ArgAction::SetTrue)
                .conflicts_with("prefer-canvas")
                .help("Try the original bytes first"),
        )
        .arg(
            Arg::new("prefer-canvas")
                .long("prefer-canvas")
                .action(ArgAction::SetTrue)
                .help("Try decoding and re-encoding first"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_parser(value_parser!(u64))
                .help("Upper bound on loading one image for rendering"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_parser(value_parser!(usize))
                .help("Images acquired concurrently per batch"),
        )
        .arg(
            Arg::new("delay-ms")
                .long("delay-ms")
                .value_parser(value_parser!(u64))
                .help("Pause between batches"),
        )
}

/// Configuration from `--config`, or the defaults
///
/// # Errors
/// Returns error if the file cannot be read, parsed or validated
pub fn load_config(matches: &ArgMatches) -> anyhow::Result<DownloaderConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => DownloaderConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(DownloaderConfig::default()),
    }
}

/// Per-image options for a `get` or `zip` invocation
#[must_use]
pub fn download_options(args: &ArgMatches, config: &DownloaderConfig) -> DownloadOptions {
    let mut options = config.download_options();

    if let Some(format) = args.get_one::<ConvertFormat>("convert") {
        options = options.with_convert_format(*format);
    }
    if args.get_flag("prefer-network") {
        options = options.with_prefer(AcquisitionPreference::Network);
    } else if args.get_flag("prefer-canvas") {
        options = options.with_prefer(AcquisitionPreference::Canvas);
    }
    if let Some(ms) = args.get_one::<u64>("timeout-ms") {
        options = options.with_timeout(Duration::from_millis(*ms));
    }
    // "filename" only exists on `get`, "dir" only on `zip`
    if let Some(name) = args.try_get_one::<String>("filename").ok().flatten() {
        options = options.with_filename(name.clone());
    }
    if let Some(dir) = args.try_get_one::<String>("dir").ok().flatten() {
        options = options.with_directory(dir.clone());
    }
    options
}

/// Batch shape: flags over config
#[must_use]
pub fn batch_options(args: &ArgMatches, config: &DownloaderConfig) -> BatchOptions {
    let mut batch = config.batch;
    if let Some(size) = args.get_one::<usize>("batch-size") {
        batch = batch.with_batch_size(*size);
    }
    if let Some(ms) = args.get_one::<u64>("delay-ms") {
        batch = batch.with_delay(Duration::from_millis(*ms));
    }
    batch
}

#[must_use]
pub fn sources(args: &ArgMatches) -> Vec<SourceValue> {
    args.get_many::<String>("sources")
        .into_iter()
        .flatten()
        .map(|s| SourceValue::from(s.as_str()))
        .collect()
}
