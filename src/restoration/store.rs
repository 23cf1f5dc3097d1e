//! Bundle stores for persisting snapshot bundles
//!
//! This module provides:
//! - `BundleStore`: the persistence boundary the coordinator talks to
//! - `MemoryBundleStore`: keeps bundles in a map, for tests and disk-less sessions
//! - `JsonBundleStore`: one pretty-printed JSON file per position in a directory

use super::error::StoreError;
use super::types::*;
use chrono::{DateTime, Utc};
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Persistence boundary for snapshot bundles
///
/// Implementations must hand back the position and every entry exactly as
/// they were saved.
pub trait BundleStore {
    fn save(&mut self, bundle: &SnapshotBundle) -> Result<(), StoreError>;

    fn load(&self, position: &PositionLocator) -> Result<SnapshotBundle, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryBundleStore {
    bundles: HashMap<PositionLocator, SnapshotBundle>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Direct access for callers that need to edit stored bundles
    pub fn get_mut(&mut self, position: &PositionLocator) -> Option<&mut SnapshotBundle> {
        self.bundles.get_mut(position)
    }
}

impl BundleStore for MemoryBundleStore {
    fn save(&mut self, bundle: &SnapshotBundle) -> Result<(), StoreError> {
        self.bundles.insert(bundle.position.clone(), bundle.clone());
        Ok(())
    }

    fn load(&self, position: &PositionLocator) -> Result<SnapshotBundle, StoreError> {
        self.bundles
            .get(position)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(position.clone()))
    }
}

/// Directory of JSON bundle files
pub struct JsonBundleStore {
    directory: PathBuf,
}

impl JsonBundleStore {
    /// Creates a store rooted at `directory`
    ///
    /// The directory will be created if it doesn't exist.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, StoreError> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            fs::create_dir_all(&directory)?;
        }

        Ok(JsonBundleStore { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn exists(&self, position: &PositionLocator) -> bool {
        self.path_for(position).exists()
    }

    /// Removes the bundle for `position`; returns false if there was none
    pub fn delete(&self, position: &PositionLocator) -> Result<bool, StoreError> {
        let path = self.path_for(position);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    /// Lists stored bundles, newest first
    ///
    /// Files that fail to parse are skipped.
    pub fn list(&self) -> Result<Vec<BundleInfo>, StoreError> {
        let mut bundles = Vec::new();

        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Ok(bundle) = self.read_file(&path) {
                bundles.push(BundleInfo {
                    path,
                    saved_at: bundle.saved_at,
                    position: bundle.position,
                    entry_count: bundle.entries.len(),
                });
            }
        }

        bundles.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));

        Ok(bundles)
    }

    fn path_for(&self, position: &PositionLocator) -> PathBuf {
        self.directory.join(file_name(position))
    }

    fn read_file(&self, path: &Path) -> Result<SnapshotBundle, StoreError> {
        let json = fs::read_to_string(path)?;
        let bundle: SnapshotBundle = serde_json::from_str(&json)?;

        if bundle.version > CURRENT_BUNDLE_VERSION {
            return Err(StoreError::InvalidVersion(bundle.version));
        }

        Ok(bundle)
    }
}

impl BundleStore for JsonBundleStore {
    fn save(&mut self, bundle: &SnapshotBundle) -> Result<(), StoreError> {
        let path = self.path_for(&bundle.position);

        // Pretty format for readability/debugging
        let json = serde_json::to_string_pretty(bundle)?;
        fs::write(&path, json)?;

        info!("Bundle for {} saved to {}", bundle.position, path.display());
        Ok(())
    }

    fn load(&self, position: &PositionLocator) -> Result<SnapshotBundle, StoreError> {
        let path = self.path_for(position);
        if !path.exists() {
            return Err(StoreError::NotFound(position.clone()));
        }
        self.read_file(&path)
    }
}

pub struct BundleInfo {
    pub path: PathBuf,
    pub saved_at: DateTime<Utc>,
    pub position: PositionLocator,
    pub entry_count: usize,
}

/// File name for a position; node names are percent-escaped so distinct
/// nodes never share a file
///
/// Uppercase letters are escaped as well, otherwise `Intro` and `intro`
/// would collide on a case-insensitive filesystem.
fn file_name(position: &PositionLocator) -> String {
    let mut node = String::with_capacity(position.node_name.len());
    for byte in position.node_name.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' || byte == b'_' {
            node.push(byte as char);
        } else {
            node.push_str(&format!("%{:02X}", byte));
        }
    }
    format!(
        "{}.{}.{}.json",
        node, position.dialogue_index, position.checkpoint_offset
    )
}
