//! CLI entry point for qurancom-dl.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use qurancom_core::{FetchPlan, HttpClient, Pipeline, PipelineError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use cli::Args;

/// Process outcome mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    Failure,
    Interrupted,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Interrupted => 130,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(exit) => exit.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, sources) = cli::parse_cli_with_sources();
    init_tracing(default_log_level(&args), no_color_env_requested());
    debug!(?args, "CLI arguments parsed");

    let file_config = app_config::load_default_file_config()?;
    let config = app_config::resolve_pipeline_config(&args, &sources, file_config.as_ref())?;
    let catalog = config.catalog()?;
    info!(dst = %config.destination.display(), "qurancom-dl starting");

    let client = HttpClient::new().context("Failed to initialise HTTP client")?;
    let pipeline = Pipeline::new(config, catalog, Arc::new(client));

    if args.dry_run {
        let plan = pipeline.plan_only()?;
        print_plan(&plan);
        return Ok(ProcessExit::Success);
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping fetches");
            signal_cancel.cancel();
        }
    });

    match pipeline.run(&cancel).await {
        Ok(report) => {
            info!(
                catalog = report.catalog_size,
                cached = report.cached,
                fetched = report.fetched,
                retried = report.retried,
                artifacts = report.artifacts.len(),
                "Done"
            );
            Ok(ProcessExit::Success)
        }
        Err(e) if e.is_cancelled() => {
            warn!(error = %e, "Interrupted. Run again to resume from the cache.");
            Ok(ProcessExit::Interrupted)
        }
        Err(e) => Err(stage_error(e)),
    }
}

fn stage_error(e: PipelineError) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("Run failed before reaching stage '{stage}'"))
}

fn print_plan(plan: &FetchPlan) {
    println!(
        "catalog: {}  cached: {}  pending: {}",
        plan.catalog_size,
        plan.cached(),
        plan.pending.len()
    );
    for resource in &plan.pending {
        println!("{}\t{}\t{}", resource.kind, resource.file_name, resource.url);
    }
}

/// Default filter when `RUST_LOG` is unset.
fn default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

fn init_tracing(default_level: &str, no_color: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .try_init();
}
