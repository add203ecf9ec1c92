use std::fs;
use std::path::{Path, PathBuf};

use csmc_core::errors::ErrorInfo;
use csmc_core::CsmcError;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;

/// Provenance of the sequences a run was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProvenance {
    /// SHA-256 digest of the labelled sequences.
    pub alignment_sha256: String,
    /// Number of alignment columns.
    pub site_count: usize,
}

/// Structured manifest describing a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Master seed used to derive every substream.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Input provenance, when the run used an alignment.
    pub input: Option<InputProvenance>,
    /// Number of tips in every tree.
    pub tip_count: usize,
    /// RFC 3339 timestamp taken when the manifest was built.
    pub created_at: String,
    /// Tree list written during the run (relative to the run directory).
    pub trees_file: Option<PathBuf>,
    /// Metrics file written during the run (relative to the run directory).
    pub metrics_file: Option<PathBuf>,
    /// Summary file written during the run (relative to the run directory).
    pub summary_file: Option<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), CsmcError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                CsmcError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            CsmcError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            CsmcError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, CsmcError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CsmcError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            CsmcError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
