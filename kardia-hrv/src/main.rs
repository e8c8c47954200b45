//! kardia-hrv - batch HRV processing of Kardia ECG recordings
//!
//! Locates raw `.atc` recordings, runs the external conversion and HRV calculation
//! pipeline for each, reconciles detector output with the device-app metadata store and
//! writes one `;`-delimited report.
//!
//! **Exit codes:** 0 success, 1 partial, 2 fatal configuration/store error,
//! 130 interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use kardia_common::config::{load_toml_config, resolve_config_path};
use kardia_hrv::config::{HrvToml, PipelineConfig, RunOverrides, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use kardia_hrv::workflow::{run_batch, EXIT_FATAL};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "kardia-hrv")]
#[command(about = "Convert Kardia recordings, compute HRV and write a reconciled report")]
#[command(version)]
struct Args {
    /// Directory searched recursively for raw recordings
    #[arg(short = 'd', long, env = "KARDIA_INPUT_DIR")]
    input_dir: PathBuf,

    /// Report file (replaced if it exists)
    #[arg(short, long, env = "KARDIA_OUTPUT")]
    output: Option<PathBuf>,

    /// Device-app SQLite export holding recording metadata
    #[arg(short = 'a', long, env = "KARDIA_METADATA_DB")]
    metadata_db: Option<PathBuf>,

    /// Extract phase, role and subject id from recording comments
    #[arg(short = 'c', long)]
    interpret_comments: bool,

    /// Detector bitmask: 1 = GQRS, 2 = ECGPU, 3 = both
    #[arg(long, env = "KARDIA_ALGORITHMS")]
    algorithms: Option<u8>,

    /// Reconcile existing work files without running the external pipeline
    #[arg(long)]
    skip_driver: bool,

    /// Concurrent recordings in the external pipeline
    #[arg(short, long, env = "KARDIA_JOBS")]
    jobs: Option<usize>,

    /// Timeout per external step, in seconds
    #[arg(long, env = "KARDIA_STEP_TIMEOUT")]
    step_timeout: Option<u64>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            input_dir: self.input_dir.clone(),
            output: self.output.clone(),
            metadata_db: self.metadata_db.clone(),
            interpret_comments: self.interpret_comments,
            algorithms: self.algorithms,
            skip_driver: self.skip_driver,
            jobs: self.jobs,
            step_timeout_secs: self.step_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("kardia-hrv: {:#}", e);
            ExitCode::from(EXIT_FATAL as u8)
        }
    }
}

async fn run(args: Args) -> Result<i32> {
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, CONFIG_FILE_NAME);
    let (toml, config_source): (HrvToml, _) =
        load_toml_config(config_path.as_deref()).context("Loading config file")?;

    kardia_common::logging::init(&toml.logging, args.verbose).context("Initializing logging")?;
    kardia_hrv::build_info::log("kardia-hrv");
    config_source.log();

    let config = PipelineConfig::resolve(args.overrides(), toml)?;
    info!("Input directory: {}", config.input_dir.display());
    info!("Report: {}", config.output.display());
    if let Some(db) = &config.metadata_db {
        info!("Metadata store: {}", db.display());
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let summary = run_batch(&config, cancel).await?;
    if summary.interrupted {
        warn!("Interrupted, no report written");
    }
    Ok(summary.exit_code())
}

/// Cancel the run on Ctrl+C or SIGTERM
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, stopping"),
        _ = terminate => warn!("Received terminate signal, stopping"),
    }
    cancel.cancel();
}
