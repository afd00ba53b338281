//! Run the interface find routine against the simulated stage and camera.
//!
//! ```text
//! interface_finder --interface-z 310 --decisions fine,exit --json
//! ```
//!
//! Without `--decisions` the operator is asked on the terminal after every pass.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use interface_finder::config::{FinderConfig, DEFAULT_CONFIG_PATH};
use interface_finder::decision::{ConsoleDecisions, DecisionSource, ScriptedDecisions};
use interface_finder::diagnostics::MemoryDiagnostics;
use interface_finder::finder::InterfaceFinder;
use interface_finder::hardware::{MockCamera, MockStage, SyntheticInterface};

/// Coarse-to-fine search for the glass/photoresist interface.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// TOML configuration file. Missing files fall back to built-in defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Comma separated decisions to replay instead of prompting, e.g. "repeat,fine,exit".
    #[arg(long)]
    decisions: Option<String>,

    /// Where the simulated interface is in focus.
    #[arg(long, default_value_t = 250.0)]
    interface_z: f64,

    /// Stage position at start-up.
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Print the report and per-pass diagnostics as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match FinderConfig::load_from(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.application.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args, &config).await {
        error!(error = %e, "find routine failed");
        std::process::exit(1);
    }
}

async fn run(args: &Args, config: &FinderConfig) -> Result<()> {
    info!(
        app = %config.application.name,
        config = %args.config.display(),
        interface_z = args.interface_z,
        start = args.start,
        "starting interface finder"
    );

    let stage = MockStage::at(args.start);
    let camera = MockCamera::new(
        stage.position_handle(),
        SyntheticInterface::new(args.interface_z),
    );

    let mut decisions: Box<dyn DecisionSource> = match &args.decisions {
        Some(script) => Box::new(ScriptedDecisions::parse(script)?),
        None => Box::new(ConsoleDecisions::stdio()),
    };
    let mut diagnostics = MemoryDiagnostics::new();

    let mut finder = InterfaceFinder::new(config, &stage, &camera)?;
    let report = finder.run(&mut decisions, &mut diagnostics).await?;

    if args.json {
        let output = serde_json::json!({
            "report": report,
            "passes": diagnostics.records(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(best) = report.best() {
        println!(
            "interface at z = {:.3} (offset {:+.3}) after {} coarse / {} fine passes, exposure {:?}",
            best.position, best.offset, report.coarse_passes, report.fine_passes, report.final_exposure
        );
    }

    info!(
        position = report.final_position,
        sweeps = report.sweeps,
        "find routine finished"
    );
    Ok(())
}
