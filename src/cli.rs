//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

/// Download quran.com reference data and consolidate it into static JSON files.
///
/// Raw API responses are cached under `<DST>/.cache/qurancom`; rerunning
/// only fetches what is missing from the cache.
#[derive(Parser, Debug, Clone)]
#[command(name = "qurancom-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Destination directory for artifacts and the cache
    #[arg(short = 'd', long, default_value = ".")]
    pub dst: PathBuf,

    /// Clear the download cache before planning
    #[arg(long = "clear-cache", visible_alias = "cc")]
    pub clear_cache: bool,

    /// Maximum concurrent fetches (1-100)
    #[arg(short = 'c', long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Total attempts per resource, including the first (1-10)
    #[arg(short = 'r', long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff in milliseconds (max 60000)
    #[arg(long = "backoff-ms", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub backoff_ms: u64,

    /// Minimum delay between requests to the same host in milliseconds (0 to disable, max 60000)
    #[arg(long = "request-delay-ms", default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub request_delay_ms: u64,

    /// Upstream API root
    #[arg(long)]
    pub api_url: Option<String>,

    /// Only process these language codes (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub languages: Vec<String>,

    /// Show what would be fetched without fetching or writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Which options were given on the command line (and so beat the config file).
#[derive(Debug, Clone, Copy, Default)]
pub struct CliValueSources {
    pub dst: bool,
    pub concurrency: bool,
    pub max_retries: bool,
    pub backoff_ms: bool,
    pub request_delay_ms: bool,
    pub api_url: bool,
    pub languages: bool,
}

impl CliValueSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            dst: is_commandline_value(matches, "dst"),
            concurrency: is_commandline_value(matches, "concurrency"),
            max_retries: is_commandline_value(matches, "max_retries"),
            backoff_ms: is_commandline_value(matches, "backoff_ms"),
            request_delay_ms: is_commandline_value(matches, "request_delay_ms"),
            api_url: is_commandline_value(matches, "api_url"),
            languages: is_commandline_value(matches, "languages"),
        }
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Parses process arguments, exiting with clap's message on error.
pub fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = CliValueSources::from_matches(&matches);
    (args, sources)
}

/// Parses an explicit argument list; used by tests.
#[cfg(test)]
pub fn try_parse_with_sources<I, T>(itr: I) -> Result<(Args, CliValueSources), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = Args::command().try_get_matches_from(itr)?;
    let args = Args::from_arg_matches(&matches)?;
    let sources = CliValueSources::from_matches(&matches);
    Ok((args, sources))
}
