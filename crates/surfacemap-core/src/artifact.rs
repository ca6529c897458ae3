//! Persisted scan artifacts
//!
//! Every artifact is a JSON document under the session's output directory:
//! - `endpoints.json`: discovered endpoints plus the engine's alerts
//! - `subdomains.json`: hostnames that answered an HTTPS probe
//! - `structure.json`: the form catalog
//!
//! Writes go to a temporary file in the destination directory and are renamed
//! into place, so a reader never observes a half-written document.

use crate::error::{Error, Result};
use crate::model::{AttackSurface, Extra, Form};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENDPOINTS_FILE: &str = "endpoints.json";
pub const SUBDOMAINS_FILE: &str = "subdomains.json";
pub const STRUCTURE_FILE: &str = "structure.json";
pub const SCAN_LOG_FILE: &str = "scan.log";

/// Contents of `endpoints.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointsArtifact {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub attack_surfaces: Vec<AttackSurface>,
}

/// Contents of `structure.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureArtifact {
    #[serde(default)]
    pub forms: Vec<Form>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Contents of `subdomains.json`
pub type SubdomainsArtifact = Vec<String>;

/// Read and decode a JSON document
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Serialize `value` with four-space indentation and atomically replace `path`
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(tmp.as_file_mut(), formatter);
        value.serialize(&mut ser)?;
    }
    tmp.as_file_mut().write_all(b"\n")?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Output directory of one scan session
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the output directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn endpoints_path(&self) -> PathBuf {
        self.path(ENDPOINTS_FILE)
    }

    pub fn structure_path(&self) -> PathBuf {
        self.path(STRUCTURE_FILE)
    }

    pub fn subdomains_path(&self) -> PathBuf {
        self.path(SUBDOMAINS_FILE)
    }

    pub fn scan_log_path(&self) -> PathBuf {
        self.path(SCAN_LOG_FILE)
    }

    pub fn write_endpoints(&self, artifact: &EndpointsArtifact) -> Result<()> {
        write_json(self.endpoints_path(), artifact)
    }

    pub fn write_structure(&self, artifact: &StructureArtifact) -> Result<()> {
        write_json(self.structure_path(), artifact)
    }

    pub fn write_subdomains(&self, subdomains: &[String]) -> Result<()> {
        write_json(self.subdomains_path(), subdomains)
    }
}
