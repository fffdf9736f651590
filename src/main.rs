use anyhow::Context;
use clap::Parser;
use tokio::runtime::Runtime;

use level_scope::{Cli, run_cli};

fn main() -> anyhow::Result<()> {
    // A. Init Logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // B. Parse Args
    let args = Cli::parse();
    #[cfg(debug_assertions)]
    log::info!("Parsed arguments: {:?}", args);

    // C. Analyze (Blocking)
    let rt = Runtime::new().context("Failed to create Tokio runtime")?;
    let report = rt.block_on(run_cli(&args))?;

    // D. Report
    let json = report.to_json().context("Failed to serialize results")?;
    let text = if args.pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{}", text);

    if report.failure_count() > 0 {
        log::warn!(
            "{} of {} symbols failed",
            report.failure_count(),
            report.results.len()
        );
    }
    Ok(())
}
