// Model bundles: a single file packaging a generator id with the trained
// tables the generator samples from.
//
// The bundle is a JSON manifest. `generator_details.id` selects the model
// configuration (see `config.rs`); `checkpoint` holds the pianoroll tables.
// A bundle without a checkpoint is valid and falls back to the built-in
// tables, which is useful for smoke-testing a deployment.

use crate::error::{ModelError, Result};
use crate::pianoroll::PianorollCheckpoint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Identifies which model configuration a bundle was trained with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorDetails {
    pub id: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BundleDetails {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub generator_details: GeneratorDetails,
    #[serde(default)]
    pub bundle_details: Option<BundleDetails>,
    #[serde(default)]
    pub checkpoint: Option<PianorollCheckpoint>,
}

impl Bundle {
    /// Read a bundle manifest. A leading `~` in `path` expands to `$HOME`.
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_home(path);
        let data = std::fs::read_to_string(&path).map_err(|source| ModelError::BundleIo {
            path: path.clone(),
            source,
        })?;
        let bundle: Bundle =
            serde_json::from_str(&data).map_err(|source| ModelError::BundleFormat {
                path: path.clone(),
                source,
            })?;
        info!(
            path = %path.display(),
            generator_id = %bundle.generator_details.id,
            has_checkpoint = bundle.checkpoint.is_some(),
            "loaded bundle"
        );
        Ok(bundle)
    }
}

/// Replace a leading `~` path component with the user's home directory.
/// Paths without one, or environments without `$HOME`, are returned as-is.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
