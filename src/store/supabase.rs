use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::artifact::{Artifact, ArtifactFile, ArtifactVersion, RunRecord};
use super::cas::{cas_key, sha256_hex, verify};
use super::reference::{validate_name, Alias, ArtifactRef};
use super::ArtifactStore;
use crate::config::SupabaseSettings;
use crate::error::{CleaningError, Result};

/// Store backed by a Supabase Storage bucket.
///
/// Layout inside the bucket (below the optional prefix):
/// - `sha256/<ab>/<cd>/<hex>`: file content, addressed by digest
/// - `artifacts/<name>/index.json`: every version of `name`, oldest first
/// - `runs/<id>.json`: run records
pub struct SupabaseArtifactStore {
    client: Client,
    base_url: String,
    key: String,
    bucket: String,
    prefix: String,
}

impl SupabaseArtifactStore {
    pub fn new(base_url: &str, key: &str, bucket: &str, prefix: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            bucket: bucket.to_string(),
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &SupabaseSettings) -> Result<Self> {
        let missing = |what: &str| CleaningError::Config(format!("supabase store requires {}", what));
        let url = settings.url.as_deref().ok_or_else(|| missing("SUPABASE_URL"))?;
        let key = settings
            .service_role_key
            .as_deref()
            .ok_or_else(|| missing("SUPABASE_SERVICE_ROLE_KEY"))?;
        let bucket = settings.bucket.as_deref().ok_or_else(|| missing("SUPABASE_BUCKET"))?;
        Ok(Self::new(url, key, bucket, &settings.prefix))
    }

    /// Object key inside the bucket, with the prefix applied
    fn object_path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            self.object_path(key)
        )
    }

    fn index_key(name: &str) -> String {
        format!("artifacts/{}/index.json", name)
    }

    /// Fetches an object; a missing object is `None`.
    fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let resp = self
            .client
            .get(self.object_url(key))
            .header("Authorization", format!("Bearer {}", self.key))
            .header("apikey", self.key.clone())
            .send()?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            // Storage answers 400 with a 404 body for unknown objects; other
            // 400s (auth, bucket) are errors
            if status == StatusCode::BAD_REQUEST && is_not_found_body(&body) {
                return Ok(None);
            }
            return Err(CleaningError::Store { status: status.as_u16(), message: body });
        }
        Ok(Some(resp.bytes()?.to_vec()))
    }

    /// Uploads with upsert=true, so rewriting the same key replaces it.
    fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let resp = self
            .client
            .put(self.object_url(key))
            .header("Authorization", format!("Bearer {}", self.key))
            .header("apikey", self.key.clone())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .query(&[("upsert", "true")])
            .body(bytes)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(CleaningError::Store { status: status.as_u16(), message: body });
        }
        Ok(())
    }

    fn load_index(&self, name: &str) -> Result<Vec<ArtifactVersion>> {
        match self.get_object(&Self::index_key(name))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }
}

/// True for a Storage error body describing a missing object,
/// e.g. `{"statusCode":"404","error":"not_found"}`.
fn is_not_found_body(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };
    let status_404 = match &value["statusCode"] {
        serde_json::Value::String(code) => code == "404",
        serde_json::Value::Number(code) => code.as_u64() == Some(404),
        _ => false,
    };
    let error_not_found = value["error"]
        .as_str()
        .is_some_and(|e| e.eq_ignore_ascii_case("not_found") || e.eq_ignore_ascii_case("not found"));
    status_404 || error_not_found
}

impl ArtifactStore for SupabaseArtifactStore {
    fn resolve(&self, reference: &ArtifactRef) -> Result<ArtifactVersion> {
        let index = self.load_index(&reference.name)?;
        let found = match reference.alias {
            Alias::Latest => index.into_iter().max_by_key(|v| v.version),
            Alias::Version(n) => index.into_iter().find(|v| v.version == n),
        };
        found.ok_or_else(|| CleaningError::ArtifactNotFound(reference.to_string()))
    }

    fn download(&self, version: &ArtifactVersion, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dest_dir)?;
        let mut paths = Vec::with_capacity(version.files.len());
        for file in &version.files {
            validate_name(&file.name)?;
            let bytes = self
                .get_object(&cas_key(&file.sha256)?)?
                .ok_or_else(|| CleaningError::ArtifactNotFound(format!(
                    "{} ({})",
                    version.qualified_name(),
                    file.name
                )))?;
            verify(&file.name, &bytes, &file.sha256)?;
            let out = dest_dir.join(&file.name);
            fs::write(&out, &bytes)?;
            debug!(file = %out.display(), bytes = bytes.len(), "downloaded artifact file");
            paths.push(out);
        }
        Ok(paths)
    }

    fn log_artifact(&self, artifact: &Artifact, run_id: Uuid) -> Result<ArtifactVersion> {
        validate_name(&artifact.name)?;
        if artifact.files().is_empty() {
            return Err(CleaningError::EmptyArtifact(artifact.name.clone()));
        }

        let mut files = Vec::with_capacity(artifact.files().len());
        for path in artifact.files() {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| CleaningError::InvalidName(path.display().to_string()))?;
            validate_name(file_name)?;
            let bytes = fs::read(path)?;
            let sha256 = sha256_hex(&bytes);
            let size_bytes = bytes.len() as u64;
            self.put_object(&cas_key(&sha256)?, bytes, "application/octet-stream")?;
            files.push(ArtifactFile { name: file_name.to_string(), sha256, size_bytes });
        }

        // Not atomic: two concurrent writers of the same name can race on the index
        let mut index = self.load_index(&artifact.name)?;
        let next = index.iter().map(|v| v.version + 1).max().unwrap_or(0);
        let version = ArtifactVersion {
            name: artifact.name.clone(),
            artifact_type: artifact.artifact_type.clone(),
            description: artifact.description.clone(),
            version: next,
            files,
            metadata: artifact.metadata.clone(),
            logged_by: Some(run_id),
            created_at: Utc::now(),
        };
        index.push(version.clone());
        self.put_object(
            &Self::index_key(&artifact.name),
            serde_json::to_vec_pretty(&index)?,
            "application/json",
        )?;
        info!(artifact = %version.qualified_name(), "uploaded artifact to supabase");
        Ok(version)
    }

    fn save_run(&self, run: &RunRecord) -> Result<()> {
        self.put_object(
            &format!("runs/{}.json", run.id),
            serde_json::to_vec_pretty(run)?,
            "application/json",
        )
    }

    fn describe(&self) -> String {
        format!("supabase bucket {} at {}", self.bucket, self.base_url)
    }
}
