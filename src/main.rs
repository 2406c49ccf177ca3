//! # mensa_export
//!
//! Exports university cafeteria menus as one JSON file per cafeteria and day.
//!
//! ## Usage
//!
//! ```sh
//! mensa_export export -o ./menus
//! mensa_export menu -m kmac -d next
//! mensa_export list
//! mensa_export schema
//! ```
//!
//! ## Pipeline
//!
//! 1. **Registry**: the cafeteria list comes from the built-in YAML or `--registry`
//! 2. **Fetching**: provider payloads are downloaded with retry and backoff
//! 3. **Parsing**: each payload is normalized into a daily menu
//! 4. **Output**: every day is written atomically to `<dir>/<cafeteria>/<YYYYMMDD>.json`
//!
//! Cafeterias are exported in parallel (4 at a time by default) and fail
//! independently of each other.
//!
//! ## Exit codes
//!
//! - `0`: everything exported
//! - `1`: some day or cafeteria failed, or the run was stopped
//! - `2`: the registry or selection is invalid, or nothing can be written

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod export;
mod fetch;
mod models;
mod outputs;
mod parse;
mod runner;
mod transport;
mod utils;

use cli::{Cli, Command};
use config::Registry;
use export::Exporter;
use fetch::Fetcher;
use outputs::{json, summary};
use transport::{HttpTransport, RetryPolicy, RetryTransport, RunControl};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    debug!(?args, "Parsed CLI arguments");

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Fatal error");
            ExitCode::from(2)
        }
    };

    info!(elapsed_ms = start_time.elapsed().as_millis() as u64, "mensa_export finished");
    code
}

/// Errors returned from here are fatal and end the process with exit code 2.
async fn run(args: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let Cli { registry, command, .. } = args;

    match command {
        Command::Schema => {
            print!("{}", json::day_schema()?);
            Ok(ExitCode::SUCCESS)
        }

        Command::List => {
            for cafeteria in load_registry(registry.as_deref())?.iter() {
                println!("{}\t{}\t{}", cafeteria.id, cafeteria.name, cafeteria.output_dir_name());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Menu {
            mensa,
            date,
            day,
            only,
        } => {
            let registry = Arc::new(load_registry(registry.as_deref())?.select(std::slice::from_ref(&mensa))?);
            let control = RunControl::default();
            let exporter = exporter(registry, control)?;
            let date = date.unwrap_or_else(|| day.resolve(exporter.fetcher().today()));

            match exporter.menu_for_day(&mensa, date).await {
                Ok(mut menu) => {
                    if let Some(category) = only {
                        menu.retain_category(category);
                    }
                    print!("{}", json::render_daily_menu(&menu)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    error!(cafeteria = %mensa, %date, error = %e, "No menu");
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Command::Export {
            mensa,
            output_dir,
            concurrency,
            timeout,
        } => {
            let registry = Arc::new(load_registry(registry.as_deref())?.select(&mensa)?);
            let control = RunControl::new(timeout.map(Duration::from_secs));
            spawn_ctrl_c_handler(control.clone());

            let exporter = exporter(Arc::clone(&registry), control)?;
            export_all(&exporter, &registry, &output_dir, concurrency).await
        }
    }
}

fn load_registry(path: Option<&Path>) -> Result<Registry, Box<dyn Error>> {
    let registry = match path {
        Some(path) => Registry::load(path)?,
        None => Registry::builtin()?,
    };
    Ok(registry)
}

async fn export_all(
    exporter: &Exporter<HttpTransport>,
    registry: &Registry,
    output_dir: &Path,
    concurrency: usize,
) -> Result<ExitCode, Box<dyn Error>> {
    let reports = runner::run_all(exporter, registry, output_dir, concurrency).await?;

    summary::log_reports(&reports);
    print!("{}", summary::render_summary(&reports));

    if reports.iter().any(|r| r.cancelled() > 0) {
        warn!("Run was stopped before all days were exported");
    }
    if runner::all_succeeded(&reports) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn exporter(registry: Arc<Registry>, control: RunControl) -> Result<Exporter<HttpTransport>, Box<dyn Error>> {
    let http = HttpTransport::new(REQUEST_TIMEOUT)?;
    let transport = RetryTransport::new(http, RetryPolicy::default(), control);
    Ok(Exporter::new(Fetcher::new(transport, registry)))
}

fn spawn_ctrl_c_handler(control: RunControl) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted; no new requests will be sent");
                control.cancel();
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });
}
