use std::fmt;
use std::str::FromStr;

use crate::error::{CleaningError, Result};

/// Which version of an artifact a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alias {
    Latest,
    Version(u32),
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alias::Latest => write!(f, "latest"),
            Alias::Version(v) => write!(f, "v{}", v),
        }
    }
}

impl FromStr for Alias {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "latest" {
            return Ok(Alias::Latest);
        }
        s.strip_prefix('v')
            .filter(|digits| !digits.is_empty())
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(Alias::Version)
            .ok_or_else(|| CleaningError::InvalidReference(s.to_string()))
    }
}

/// A fully-qualified artifact reference: `[entity/][project/]name[:alias]`.
///
/// Only `name` and `alias` take part in resolution, the leading scope
/// segments are kept so the reference can be echoed back as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub scope: Vec<String>,
    pub name: String,
    pub alias: Alias,
}

impl ArtifactRef {
    pub fn latest(name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self { scope: Vec::new(), name: name.to_string(), alias: Alias::Latest })
    }
}

impl FromStr for ArtifactRef {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CleaningError::InvalidReference(s.to_string());
        let trimmed = s.trim();

        let (path, alias) = match trimmed.split_once(':') {
            Some((path, alias)) => (path, alias.parse::<Alias>().map_err(|_| invalid())?),
            None => (trimmed, Alias::Latest),
        };

        let mut segments: Vec<String> = path.split('/').map(str::to_string).collect();
        if segments.len() > 3 || segments.iter().any(|seg| validate_name(seg).is_err()) {
            return Err(invalid());
        }
        let name = segments.pop().ok_or_else(invalid)?;

        Ok(Self { scope: segments, name, alias })
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.scope {
            write!(f, "{}/", seg)?;
        }
        write!(f, "{}:{}", self.name, self.alias)
    }
}

/// Artifact names end up in storage paths, so keep them to a safe alphabet.
pub fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(CleaningError::InvalidName(name.to_string()))
    }
}
