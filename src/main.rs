use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use basic_cleaning::cli::Args;
use basic_cleaning::config::StoreSettings;
use basic_cleaning::{logging, pipeline, store};

fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the guard alive so file logs are flushed on exit
    let _log_guard = logging::init_logging();

    let settings = StoreSettings::load().context("Failed to load artifact store settings")?;
    let store = store::open_store(&settings).context("Failed to open artifact store")?;
    let work_dir = std::env::current_dir().context("Failed to resolve working directory")?;

    let version = pipeline::go(&args, &*store, &settings, &work_dir)
        .with_context(|| format!("Cleaning of '{}' failed", args.input_artifact))?;

    info!(artifact = %version.qualified_name(), "Basic cleaning finished");
    Ok(())
}
