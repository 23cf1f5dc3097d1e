//! Restoration data types
//!
//! This module defines the values that move through a save or a restore:
//! - `RestoreData`: the opaque payload one restorable produces
//! - `SnapshotBundle`: every payload captured at one dialogue position
//! - `PositionLocator`: the serializable key a bundle is stored under
//!
//! Bundles are serialized with Serde so any `BundleStore` can persist them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identity of a restorable inside a registry
pub type RestorableName = String;

/// Restore ordering hint
///
/// Higher priorities are restored first. The derived `Ord` follows declaration
/// order, so `Low < Normal < High`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RestorablePriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Opaque payload produced by one restorable
///
/// The coordinator never looks inside `payload`. `data_type` names the payload
/// family so the owning component can reject data captured by something else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreData {
    pub data_type: String,
    pub payload: serde_json::Value,
}

impl RestoreData {
    pub fn new(data_type: impl Into<String>, payload: serde_json::Value) -> Self {
        RestoreData {
            data_type: data_type.into(),
            payload,
        }
    }
}

/// Serializable form of a `ReachedDialoguePosition`
///
/// The node record itself is not owned by the restoration core, so persisted
/// bundles refer to it by node name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionLocator {
    pub node_name: String,
    pub checkpoint_offset: u64,
    pub dialogue_index: usize,
}

impl PositionLocator {
    pub fn new(node_name: impl Into<String>, checkpoint_offset: u64, dialogue_index: usize) -> Self {
        PositionLocator {
            node_name: node_name.into(),
            checkpoint_offset,
            dialogue_index,
        }
    }
}

impl fmt::Display for PositionLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}",
            self.node_name, self.dialogue_index, self.checkpoint_offset
        )
    }
}

/// Every restorable's data captured at one position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotBundle {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub position: PositionLocator,
    pub entries: BTreeMap<RestorableName, RestoreData>,
}

impl SnapshotBundle {
    pub fn new(position: PositionLocator, entries: BTreeMap<RestorableName, RestoreData>) -> Self {
        SnapshotBundle {
            version: CURRENT_BUNDLE_VERSION,
            saved_at: Utc::now(),
            position,
            entries,
        }
    }

    pub fn get(&self, name: &str) -> Option<&RestoreData> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a load did to each restorable it saw
///
/// Returned on success and carried inside `RestoreError::Failed`, where
/// `restored` lists the objects that did come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub position: PositionLocator,
    /// Restored, in the order they were restored
    pub restored: Vec<RestorableName>,
    /// Registered but absent from the bundle; left as they were
    pub untouched: Vec<RestorableName>,
    /// In the bundle but no longer registered
    pub orphaned: Vec<RestorableName>,
}

impl RestoreReport {
    pub fn new(position: PositionLocator) -> Self {
        RestoreReport {
            position,
            restored: Vec::new(),
            untouched: Vec::new(),
            orphaned: Vec::new(),
        }
    }
}

/// Current bundle format version
pub const CURRENT_BUNDLE_VERSION: u32 = 1;
