use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use basic_cleaning::config::StoreSettings;
use basic_cleaning::logging;
use basic_cleaning::run::Run;
use basic_cleaning::store::{self, Artifact};

/// Upload a local file as a new version of an artifact, e.g. to seed the raw dataset.
#[derive(Parser, Debug)]
#[command(name = "log-artifact", version, about = "Log a local file as a new artifact version")]
struct Cli {
    /// Path to the file to upload
    #[arg(long)]
    path: PathBuf,

    /// Artifact name, e.g. sample.csv
    #[arg(long)]
    name: String,

    /// Artifact type, e.g. raw_data
    #[arg(long = "type")]
    artifact_type: String,

    #[arg(long, default_value = "")]
    description: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging();

    let settings = StoreSettings::load().context("Failed to load artifact store settings")?;
    let store = store::open_store(&settings).context("Failed to open artifact store")?;

    let mut run = Run::init(&*store, &settings.project, "upload", &settings.download_dir)?;

    let mut artifact = Artifact::new(&cli.name, &cli.artifact_type, &cli.description);
    artifact
        .add_file(&cli.path)
        .with_context(|| format!("Failed to attach {}", cli.path.display()))?;

    let version = run.log_artifact(&artifact)?;
    run.finish()?;

    info!(artifact = %version.qualified_name(), "Artifact uploaded");
    println!("{}", version.qualified_name());
    Ok(())
}
