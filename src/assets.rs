//! Asset loading boundary
//!
//! Presentation components load clips and sprites by path through an
//! `AssetLoader`. Loads are synchronous from the caller's side: a loader
//! returns a usable handle or fails immediately.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

pub use crate::restoration::AssetError;

/// Which preload cache an asset is pinned in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCacheType {
    Image,
    StandingLayer,
    Audio,
    Video,
}

/// Loaded asset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetHandle {
    path: String,
}

impl AssetHandle {
    pub fn new(path: impl Into<String>) -> Self {
        AssetHandle { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

pub trait AssetLoader {
    fn load(&self, path: &str) -> Result<AssetHandle, AssetError>;

    fn preload(&self, cache_type: AssetCacheType, path: &str);

    fn unpreload(&self, cache_type: AssetCacheType, path: &str);
}

/// Joins a folder and an asset name the way asset paths are written
pub fn asset_path(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder.trim_end_matches('/'), name)
    }
}

/// Loader backed by a fixed catalog of known paths
///
/// Counts loads and keeps reference-counted preloads, which makes it useful
/// for checking that components don't reload assets they already hold.
#[derive(Debug, Default)]
pub struct CatalogAssetLoader {
    catalog: HashSet<String>,
    load_count: Cell<usize>,
    preloaded: RefCell<HashMap<(AssetCacheType, String), usize>>,
}

impl CatalogAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assets<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CatalogAssetLoader {
            catalog: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        self.catalog.insert(path.into());
    }

    /// Successful loads so far
    pub fn load_count(&self) -> usize {
        self.load_count.get()
    }

    pub fn preload_count(&self, cache_type: AssetCacheType, path: &str) -> usize {
        self.preloaded
            .borrow()
            .get(&(cache_type, path.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

impl AssetLoader for CatalogAssetLoader {
    fn load(&self, path: &str) -> Result<AssetHandle, AssetError> {
        if !self.catalog.contains(path) {
            return Err(AssetError::NotFound(path.to_string()));
        }
        self.load_count.set(self.load_count.get() + 1);
        Ok(AssetHandle::new(path))
    }

    fn preload(&self, cache_type: AssetCacheType, path: &str) {
        *self
            .preloaded
            .borrow_mut()
            .entry((cache_type, path.to_string()))
            .or_insert(0) += 1;
    }

    fn unpreload(&self, cache_type: AssetCacheType, path: &str) {
        let mut preloaded = self.preloaded.borrow_mut();
        let key = (cache_type, path.to_string());
        if let Some(count) = preloaded.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                preloaded.remove(&key);
            }
        }
    }
}
