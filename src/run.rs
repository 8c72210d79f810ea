use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{CleaningError, Result};
use crate::store::{Artifact, ArtifactRef, ArtifactStore, ArtifactVersion, RunRecord, RunStatus};

/// One tracked execution against an artifact store.
///
/// Every state change is written through to the store, so a crash leaves a
/// `running` record behind rather than nothing.
pub struct Run<'a> {
    store: &'a dyn ArtifactStore,
    record: RunRecord,
    download_root: PathBuf,
}

/// An input artifact the run has declared it uses
pub struct UsedArtifact<'a> {
    store: &'a dyn ArtifactStore,
    version: ArtifactVersion,
    download_root: PathBuf,
}

impl<'a> UsedArtifact<'a> {
    /// Downloads the artifact and returns the path of its single file.
    pub fn file(&self) -> Result<PathBuf> {
        let dest = self.version.download_dir(&self.download_root);
        let mut paths = self.store.download(&self.version, &dest)?;
        match paths.len() {
            0 => Err(CleaningError::EmptyArtifact(self.version.qualified_name())),
            1 => Ok(paths.remove(0)),
            n => {
                warn!(
                    artifact = %self.version.qualified_name(),
                    files = n,
                    "artifact has several files, using the first"
                );
                Ok(paths.remove(0))
            }
        }
    }
}

impl<'a> Run<'a> {
    /// Starts a run and registers it with the store.
    pub fn init(
        store: &'a dyn ArtifactStore,
        project: &str,
        job_type: &str,
        download_root: &Path,
    ) -> Result<Self> {
        let record = RunRecord::new(project, job_type);
        store.save_run(&record)?;
        info!(run_id = %record.id, job_type, store = %store.describe(), "Run started");
        Ok(Self {
            store,
            record,
            download_root: download_root.to_path_buf(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    /// Merges the fields of `config` into the run's configuration.
    pub fn update_config<T: Serialize>(&mut self, config: &T) -> Result<()> {
        let value = serde_json::to_value(config)?;
        match (&mut self.record.config, value) {
            (serde_json::Value::Object(current), serde_json::Value::Object(update)) => {
                current.extend(update);
            }
            (current, other) => *current = other,
        }
        self.store.save_run(&self.record)
    }

    /// Resolves `reference` and records it as an input of this run.
    #[instrument(skip(self), fields(run_id = %self.record.id))]
    pub fn use_artifact(&mut self, reference: &str) -> Result<UsedArtifact<'a>> {
        let parsed: ArtifactRef = reference.parse()?;
        let version = self.store.resolve(&parsed)?;
        self.record.inputs.push(version.qualified_name());
        self.store.save_run(&self.record)?;
        Ok(UsedArtifact {
            store: self.store,
            version,
            download_root: self.download_root.clone(),
        })
    }

    /// Registers `artifact` as a new version produced by this run.
    #[instrument(skip(self, artifact), fields(run_id = %self.record.id, artifact = %artifact.name))]
    pub fn log_artifact(&mut self, artifact: &Artifact) -> Result<ArtifactVersion> {
        let version = self.store.log_artifact(artifact, self.record.id)?;
        self.record.outputs.push(version.qualified_name());
        self.store.save_run(&self.record)?;
        info!(artifact = %version.qualified_name(), "Artifact logged");
        Ok(version)
    }

    pub fn finish(mut self) -> Result<RunRecord> {
        self.record.status = RunStatus::Finished;
        self.record.finished_at = Some(Utc::now());
        self.store.save_run(&self.record)?;
        info!(run_id = %self.record.id, "Run finished");
        Ok(self.record)
    }

    pub fn fail(mut self, error: &str) -> Result<RunRecord> {
        self.record.status = RunStatus::Failed;
        self.record.finished_at = Some(Utc::now());
        self.record.error = Some(error.to_string());
        self.store.save_run(&self.record)?;
        Ok(self.record)
    }
}
