use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Malformed row at line {line}: expected {expected} fields, found {found}")]
    MalformedRow { line: u64, expected: usize, found: usize },

    #[error("Column '{column}' needs {expected} values, got {found}")]
    ColumnLength { column: String, expected: usize, found: usize },

    #[error("Invalid artifact reference '{0}'")]
    InvalidReference(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Artifact {0} has no files attached")]
    EmptyArtifact(String),

    #[error("Invalid artifact name '{0}': use letters, digits, '-', '_' or '.'")]
    InvalidName(String),

    #[error("Digest mismatch for {file}: expected {expected}, got {actual}")]
    DigestMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Artifact store error: {status} - {message}")]
    Store { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, CleaningError>;
