use chrono::Utc;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::artifact::{Artifact, ArtifactFile, ArtifactVersion, RunRecord};
use super::cas::{cas_path, verify, write_cas};
use super::reference::{validate_name, Alias, ArtifactRef};
use super::ArtifactStore;
use crate::error::{CleaningError, Result};

/// Filesystem store: content-addressed blobs under `<root>/cas` and a SQLite
/// registry of artifact versions and runs in `<root>/registry.db`.
pub struct LocalArtifactStore {
    root: PathBuf,
    conn: Connection,
}

impl LocalArtifactStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let conn = Connection::open(root.join("registry.db"))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS artifacts (
                name           TEXT    NOT NULL,
                version        INTEGER NOT NULL,
                artifact_type  TEXT    NOT NULL,
                record         TEXT    NOT NULL,
                PRIMARY KEY (name, version)
            );
            CREATE TABLE IF NOT EXISTS runs (
                id      TEXT PRIMARY KEY,
                record  TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { root, conn })
    }

    fn blobs_dir(&self) -> PathBuf {
        self.root.join("cas")
    }

    pub fn latest_version(&self, name: &str) -> Result<Option<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT MAX(version) FROM artifacts WHERE name = ?1")?;
        let mut rows = stmt.query(params![name])?;
        if let Some(row) = rows.next()? {
            let v: Option<i64> = row.get(0)?;
            Ok(v.map(|v| v as u32))
        } else {
            Ok(None)
        }
    }

    pub fn load_version(&self, name: &str, version: u32) -> Result<Option<ArtifactVersion>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record FROM artifacts WHERE name = ?1 AND version = ?2")?;
        let mut rows = stmt.query(params![name, version as i64])?;
        if let Some(row) = rows.next()? {
            let record: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&record)?))
        } else {
            Ok(None)
        }
    }

    /// Every version of `name`, oldest first
    pub fn list_versions(&self, name: &str) -> Result<Vec<ArtifactVersion>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record FROM artifacts WHERE name = ?1 ORDER BY version")?;
        let mut rows = stmt.query(params![name])?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next()? {
            let record: String = row.get(0)?;
            versions.push(serde_json::from_str(&record)?);
        }
        Ok(versions)
    }

    pub fn load_run(&self, id: Uuid) -> Result<Option<RunRecord>> {
        let mut stmt = self.conn.prepare("SELECT record FROM runs WHERE id = ?1")?;
        let mut rows = stmt.query(params![id.to_string()])?;
        if let Some(row) = rows.next()? {
            let record: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&record)?))
        } else {
            Ok(None)
        }
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn resolve(&self, reference: &ArtifactRef) -> Result<ArtifactVersion> {
        let version = match reference.alias {
            Alias::Latest => self.latest_version(&reference.name)?,
            Alias::Version(v) => Some(v),
        };
        let found = match version {
            Some(v) => self.load_version(&reference.name, v)?,
            None => None,
        };
        found.ok_or_else(|| CleaningError::ArtifactNotFound(reference.to_string()))
    }

    fn download(&self, version: &ArtifactVersion, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dest_dir)?;
        let mut paths = Vec::with_capacity(version.files.len());
        for file in &version.files {
            validate_name(&file.name)?;
            let bytes = fs::read(cas_path(&self.blobs_dir(), &file.sha256)?)?;
            verify(&file.name, &bytes, &file.sha256)?;
            let out = dest_dir.join(&file.name);
            fs::write(&out, &bytes)?;
            debug!(file = %out.display(), bytes = bytes.len(), "materialised artifact file");
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
            let sha256 = write_cas(&self.blobs_dir(), &bytes)?;
            files.push(ArtifactFile {
                name: file_name.to_string(),
                sha256,
                size_bytes: bytes.len() as u64,
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(version) + 1, 0) FROM artifacts WHERE name = ?1",
            params![artifact.name],
            |row| row.get(0),
        )?;
        let version = ArtifactVersion {
            name: artifact.name.clone(),
            artifact_type: artifact.artifact_type.clone(),
            description: artifact.description.clone(),
            version: next as u32,
            files,
            metadata: artifact.metadata.clone(),
            logged_by: Some(run_id),
            created_at: Utc::now(),
        };
        tx.execute(
            "INSERT INTO artifacts (name, version, artifact_type, record) VALUES (?1, ?2, ?3, ?4)",
            params![
                version.name,
                next,
                version.artifact_type,
                serde_json::to_string(&version)?
            ],
        )?;
        tx.commit()?;
        Ok(version)
    }

    fn save_run(&self, run: &RunRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO runs (id, record) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET record=excluded.record",
            params![run.id.to_string(), serde_json::to_string(run)?],
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local store at {}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact_with(dir: &Path, file: &str, body: &str) -> Artifact {
        let path = dir.join(file);
        fs::write(&path, body).unwrap();
        let mut artifact = Artifact::new("sample.csv", "raw_data", "raw listings");
        artifact.add_file(&path).unwrap();
        artifact
    }

    #[test]
    fn versions_increase_per_name_and_latest_follows() {
        let root = tempdir().unwrap();
        let work = tempdir().unwrap();
        let store = LocalArtifactStore::open(root.path()).unwrap();
        let run = Uuid::new_v4();

        let v0 = store.log_artifact(&artifact_with(work.path(), "a.csv", "x\n1\n"), run).unwrap();
        let v1 = store.log_artifact(&artifact_with(work.path(), "a.csv", "x\n2\n"), run).unwrap();
        assert_eq!((v0.version, v1.version), (0, 1));

        let latest = store.resolve(&"sample.csv".parse().unwrap()).unwrap();
        assert_eq!(latest.qualified_name(), "sample.csv:v1");
        let pinned = store.resolve(&"sample.csv:v0".parse().unwrap()).unwrap();
        assert_eq!(pinned, v0);
        assert_eq!(store.list_versions("sample.csv").unwrap().len(), 2);
    }

    #[test]
    fn download_returns_logged_bytes() {
        let root = tempdir().unwrap();
        let work = tempdir().unwrap();
        let store = LocalArtifactStore::open(root.path()).unwrap();
        let logged = store
            .log_artifact(&artifact_with(work.path(), "listings.csv", "price\n50\n"), Uuid::new_v4())
            .unwrap();

        let dest = work.path().join("downloads");
        let paths = store.download(&logged, &dest).unwrap();
        assert_eq!(paths, vec![dest.join("listings.csv")]);
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "price\n50\n");
    }

    #[test]
    fn unknown_references_are_not_found() {
        let root = tempdir().unwrap();
        let store = LocalArtifactStore::open(root.path()).unwrap();
        let err = store.resolve(&"missing.csv:latest".parse().unwrap()).unwrap_err();
        assert!(matches!(err, CleaningError::ArtifactNotFound(_)));
        let err = store.resolve(&"missing.csv:v4".parse().unwrap()).unwrap_err();
        assert!(matches!(err, CleaningError::ArtifactNotFound(_)));
    }

    #[test]
    fn artifacts_without_files_are_rejected() {
        let root = tempdir().unwrap();
        let store = LocalArtifactStore::open(root.path()).unwrap();
        let artifact = Artifact::new("clean.csv", "clean_data", "nothing attached");
        assert!(matches!(
            store.log_artifact(&artifact, Uuid::new_v4()),
            Err(CleaningError::EmptyArtifact(_))
        ));
    }

    #[test]
    fn run_records_are_upserted() {
        let root = tempdir().unwrap();
        let store = LocalArtifactStore::open(root.path()).unwrap();
        let mut run = RunRecord::new("nyc_airbnb", "basic_cleaning");
        store.save_run(&run).unwrap();
        run.outputs.push("clean_sample.csv:v0".to_string());
        store.save_run(&run).unwrap();
        assert_eq!(store.load_run(run.id).unwrap(), Some(run));
    }
}
