use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{CleaningError, Result};

/// An artifact being assembled locally, not yet logged to a store
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub artifact_type: String,
    pub description: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
    files: Vec<PathBuf>,
}

impl Artifact {
    pub fn new(name: &str, artifact_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            description: description.to_string(),
            metadata: BTreeMap::new(),
            files: Vec::new(),
        }
    }

    /// Attaches a local file. The file is read when the artifact is logged.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(CleaningError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("artifact file not found: {}", path.display()),
            )));
        }
        self.files.push(path.to_path_buf());
        Ok(())
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// A file stored under a logged artifact version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactFile {
    pub name: String,
    /// Hex sha256 of the content, also its content address
    pub sha256: String,
    pub size_bytes: u64,
}

/// A logged, immutable artifact version as recorded by a store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactVersion {
    pub name: String,
    pub artifact_type: String,
    pub description: String,
    pub version: u32,
    pub files: Vec<ArtifactFile>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub logged_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ArtifactVersion {
    /// `name:vN`
    pub fn qualified_name(&self) -> String {
        format!("{}:v{}", self.name, self.version)
    }

    /// Directory a version is materialised into below a download root
    pub fn download_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name).join(format!("v{}", self.version))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// What a store keeps about one execution of the step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub id: Uuid,
    pub project: String,
    pub job_type: String,
    pub config: serde_json::Value,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Qualified names of the artifacts the run consumed
    pub inputs: Vec<String>,
    /// Qualified names of the artifacts the run produced
    pub outputs: Vec<String>,
}

impl RunRecord {
    pub fn new(project: &str, job_type: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            project: project.to_string(),
            job_type: job_type.to_string(),
            config: serde_json::Value::Object(serde_json::Map::new()),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}
