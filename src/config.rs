//! Restoration settings
//!
//! Loaded from a JSON file; any field left out takes its default.

use crate::restoration::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Overrides `save_directory` when set
pub const SAVE_DIR_ENV: &str = "NOVA_SAVE_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestorationConfig {
    pub save_directory: PathBuf,
    pub duplicate_policy: DuplicatePolicy,
    /// Seconds; used when a pose change does not name a duration
    pub fade_duration: f32,
    pub video_folder: String,
    pub image_folder: String,
}

impl RestorationConfig {
    /// Reads a JSON config; a missing file yields the defaults
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: RestorationConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Defaults with `NOVA_SAVE_DIR` applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        if let Some(dir) = std::env::var_os(SAVE_DIR_ENV) {
            self.save_directory = PathBuf::from(dir);
        }
    }
}

impl Default for RestorationConfig {
    fn default() -> Self {
        RestorationConfig {
            save_directory: default_save_directory(),
            duplicate_policy: DuplicatePolicy::Reject,
            fade_duration: 0.1,
            video_folder: "Videos".to_string(),
            image_folder: "Standings".to_string(),
        }
    }
}

fn default_save_directory() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".nova/saves"))
        .unwrap_or_else(|| PathBuf::from("./saves"))
}
