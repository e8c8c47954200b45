//! kardia-atc2edf - convert one Kardia recording to EDF
//!
//! The raw file is piped through an external decoder that prints the decoded recording
//! as JSON; `--json` reads an already decoded file instead.

use anyhow::{Context, Result};
use clap::Parser;
use kardia_common::config::LoggingConfig;
use kardia_hrv::convert::{decode_file, load_decoded, to_edf, write_edf};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kardia-atc2edf")]
#[command(about = "Convert a Kardia .atc recording to EDF")]
#[command(version)]
struct Args {
    /// Raw recording
    #[arg(short, long, required_unless_present = "json")]
    input: Option<PathBuf>,

    /// EDF file to write
    #[arg(short, long)]
    output: PathBuf,

    /// Decoder command; receives the raw file on stdin
    #[arg(long, env = "KARDIA_DECODER", default_value = "atc2json")]
    decoder: String,

    /// Read the decoded recording from this JSON file instead of running the decoder
    #[arg(long, conflicts_with = "input")]
    json: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    kardia_common::logging::init(&LoggingConfig::default(), args.verbose)?;
    kardia_hrv::build_info::log("kardia-atc2edf");

    let decoded = match (&args.json, &args.input) {
        (Some(json), _) => load_decoded(json)
            .with_context(|| format!("Reading decoded recording {}", json.display()))?,
        (None, Some(input)) => decode_file(&args.decoder, input)
            .await
            .with_context(|| format!("Decoding {}", input.display()))?,
        (None, None) => anyhow::bail!("either --input or --json is required"),
    };

    let edf = to_edf(&decoded).context("Mapping recording to EDF")?;
    write_edf(&edf, &args.output)?;

    info!(
        "Wrote {} ({} channels: {})",
        args.output.display(),
        edf.signals.len(),
        edf.signals
            .iter()
            .map(|s| s.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}
