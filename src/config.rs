use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CleaningError, Result};

pub const CONFIG_PATH_ENV: &str = "BASIC_CLEANING_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "basic_cleaning.toml";

/// Which artifact store implementation a run talks to
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Local,
    Supabase,
}

impl std::str::FromStr for StoreBackend {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StoreBackend::Local),
            "supabase" => Ok(StoreBackend::Supabase),
            other => Err(CleaningError::Config(format!("unknown artifact store backend '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SupabaseSettings {
    /// Full project URL, e.g. https://xyzcompany.supabase.co
    pub url: Option<String>,
    pub service_role_key: Option<String>,
    pub bucket: Option<String>,
    /// Optional path prefix inside the bucket
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Root directory of the local store (blobs and registry database)
    pub root: PathBuf,
    /// Where fetched artifacts are materialised
    pub download_dir: PathBuf,
    /// Project the runs are grouped under
    pub project: String,
    pub supabase: SupabaseSettings,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Local,
            root: PathBuf::from("artifacts"),
            download_dir: PathBuf::from("artifacts").join("downloads"),
            project: "nyc_airbnb".to_string(),
            supabase: SupabaseSettings::default(),
        }
    }
}

impl StoreSettings {
    /// Loads `.env`, the optional TOML settings file, then applies environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut settings = Self::from_file_if_present(&config_path)?;
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file_if_present(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            CleaningError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("ARTIFACT_STORE") {
            self.backend = backend.parse()?;
        }
        if let Some(root) = lookup("ARTIFACT_STORE_ROOT") {
            // Only a download dir still derived from the old root follows it
            if self.download_dir == self.root.join("downloads") {
                self.download_dir = PathBuf::from(&root).join("downloads");
            }
            self.root = PathBuf::from(root);
        }
        if let Some(dir) = lookup("ARTIFACT_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(project) = lookup("ARTIFACT_PROJECT") {
            self.project = project;
        }

        // Allow either a full URL or a project ref
        if let Some(url) = lookup("SUPABASE_URL") {
            self.supabase.url = Some(url);
        } else if let Some(project_ref) = lookup("SUPABASE_PROJECT_REF") {
            self.supabase.url = Some(format!("https://{}.supabase.co", project_ref));
        }
        if let Some(key) = lookup("SUPABASE_SERVICE_ROLE_KEY") {
            self.supabase.service_role_key = Some(key);
        }
        if let Some(bucket) = lookup("SUPABASE_BUCKET") {
            self.supabase.bucket = Some(bucket);
        }
        if let Some(prefix) = lookup("SUPABASE_PREFIX") {
            self.supabase.prefix = prefix;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend == StoreBackend::Supabase {
            let missing: Vec<&str> = [
                ("SUPABASE_URL", self.supabase.url.is_none()),
                ("SUPABASE_SERVICE_ROLE_KEY", self.supabase.service_role_key.is_none()),
                ("SUPABASE_BUCKET", self.supabase.bucket.is_none()),
            ]
            .iter()
            .filter(|(_, absent)| *absent)
            .map(|(name, _)| *name)
            .collect();
            if !missing.is_empty() {
                return Err(CleaningError::Config(format!(
                    "supabase store requires {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}
