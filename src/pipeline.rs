//! The cleaning step end to end: fetch the input artifact, clean it, publish
//! the result as a new artifact version.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::cleaning::clean;
use crate::cli::Args;
use crate::config::StoreSettings;
use crate::constants::{JOB_TYPE, PROCESSED_FILENAME};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::run::Run;
use crate::store::{Artifact, ArtifactStore, ArtifactVersion};

/// A local file removed when the guard goes out of scope, on success and
/// error paths alike.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(file = %self.path.display(), "Failed to remove scratch file: {}", e);
        }
    }
}

/// Metadata for the artifact a run publishes
#[derive(Debug, Clone)]
pub struct OutputArtifact<'a> {
    pub name: &'a str,
    pub artifact_type: &'a str,
    pub description: &'a str,
}

impl<'a> From<&'a Args> for OutputArtifact<'a> {
    fn from(args: &'a Args) -> Self {
        Self {
            name: &args.artifact_name,
            artifact_type: &args.artifact_type,
            description: &args.artifact_description,
        }
    }
}

/// Runs the whole step under a tracked run. The run is marked failed before
/// any error is returned.
pub fn go(
    args: &Args,
    store: &dyn ArtifactStore,
    settings: &StoreSettings,
    work_dir: &Path,
) -> Result<ArtifactVersion> {
    let mut run = Run::init(store, &settings.project, JOB_TYPE, &settings.download_dir)?;
    run.update_config(args)?;

    match execute(&mut run, args, work_dir) {
        Ok(version) => {
            run.finish()?;
            Ok(version)
        }
        Err(err) => {
            if let Err(e) = run.fail(&err.to_string()) {
                warn!("Could not mark run as failed: {}", e);
            }
            Err(err)
        }
    }
}

fn execute(run: &mut Run<'_>, args: &Args, work_dir: &Path) -> Result<ArtifactVersion> {
    let input_path = fetch(run, &args.input_artifact)?;
    let dataset = Dataset::read_csv(&input_path)?;
    info!(rows = dataset.height(), columns = dataset.headers().len(), "Loaded input dataset");

    let cleaned = clean(dataset, &args.price_range())?;

    publish(run, &cleaned, &OutputArtifact::from(args), work_dir)
}

/// Resolves and downloads the input artifact, returning its local path.
#[instrument(skip(run))]
pub fn fetch(run: &mut Run<'_>, reference: &str) -> Result<PathBuf> {
    info!("Downloading artifact");
    run.use_artifact(reference)?.file()
}

/// Writes `dataset` to the scratch CSV in `work_dir`, logs it as a new
/// artifact version and removes the scratch file.
#[instrument(skip(run, dataset, output), fields(artifact = output.name))]
pub fn publish(
    run: &mut Run<'_>,
    dataset: &Dataset,
    output: &OutputArtifact<'_>,
    work_dir: &Path,
) -> Result<ArtifactVersion> {
    let scratch = ScratchFile::new(work_dir.join(PROCESSED_FILENAME));
    dataset.write_csv(scratch.path())?;

    let mut artifact = Artifact::new(output.name, output.artifact_type, output.description);
    artifact.metadata.insert("rows".to_string(), dataset.height().into());
    artifact.metadata.insert("columns".to_string(), dataset.headers().into());
    artifact.add_file(scratch.path())?;

    info!("Logging artifact");
    run.log_artifact(&artifact)
}
