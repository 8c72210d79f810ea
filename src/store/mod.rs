//! Versioned artifact storage.
//!
//! A store resolves references to immutable artifact versions, materialises
//! their files locally, registers new versions and keeps run records.

pub mod artifact;
pub mod cas;
pub mod local;
pub mod reference;
pub mod supabase;

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::{StoreBackend, StoreSettings};
use crate::error::Result;

pub use artifact::{Artifact, ArtifactFile, ArtifactVersion, RunRecord, RunStatus};
pub use local::LocalArtifactStore;
pub use reference::{Alias, ArtifactRef};
pub use supabase::SupabaseArtifactStore;

pub trait ArtifactStore {
    /// Resolves a reference to a concrete version; unknown names or versions are errors.
    fn resolve(&self, reference: &ArtifactRef) -> Result<ArtifactVersion>;

    /// Writes the version's files into `dest_dir` and returns their paths.
    fn download(&self, version: &ArtifactVersion, dest_dir: &Path) -> Result<Vec<PathBuf>>;

    /// Registers `artifact` as the next version of its name.
    fn log_artifact(&self, artifact: &Artifact, run_id: Uuid) -> Result<ArtifactVersion>;

    /// Inserts or replaces a run record.
    fn save_run(&self, run: &RunRecord) -> Result<()>;

    /// Human readable location, for logs
    fn describe(&self) -> String;
}

/// Opens the store selected by `settings`.
pub fn open_store(settings: &StoreSettings) -> Result<Box<dyn ArtifactStore>> {
    match settings.backend {
        StoreBackend::Local => Ok(Box::new(LocalArtifactStore::open(&settings.root)?)),
        StoreBackend::Supabase => Ok(Box::new(SupabaseArtifactStore::from_settings(
            &settings.supabase,
        )?)),
    }
}
