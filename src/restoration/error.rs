//! Error types for the restoration core
//!
//! Nothing here terminates the process: every failure is a returned value and
//! the caller decides what to do with it.

use super::types::{PositionLocator, RestorableName, RestoreReport};
use thiserror::Error;

/// Registration failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("restorable name must not be empty")]
    EmptyName,

    #[error("restorable '{0}' is already registered")]
    DuplicateName(RestorableName),
}

/// Checkpoint position index failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("no reached dialogue recorded for {node_name}:{dialogue_index}")]
    NotFound {
        node_name: String,
        dialogue_index: usize,
    },

    #[error("checkpoint offset {requested} precedes offset {previous} in node record '{node_name}'")]
    NonMonotonicOffset {
        node_name: String,
        previous: u64,
        requested: u64,
    },

    #[error("checkpoint offset {offset} is past the end of node record '{node_name}' ({len} bytes)")]
    OffsetOutOfRange {
        node_name: String,
        offset: u64,
        len: u64,
    },
}

/// Asset loader failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),
}

/// Failure raised by one restorable while capturing or applying its data
#[derive(Debug, Error)]
pub enum RestorableError {
    #[error("expected restore data of type '{expected}', got '{found}'")]
    DataTypeMismatch { expected: String, found: String },

    #[error("malformed restore data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Asset(#[from] AssetError),

    /// The object was already borrowed when the coordinator reached it
    #[error("restorable is busy")]
    Busy,

    #[error("{0}")]
    Other(String),
}

/// Bundle persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid bundle version: {0}")]
    InvalidVersion(u32),

    #[error("no bundle stored for {0}")]
    NotFound(PositionLocator),
}

/// Save failures
///
/// Saving is all-or-nothing: no bundle is persisted once any of these occur.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save aborted: restorable '{name}' failed to capture its state: {cause}")]
    Aborted {
        name: RestorableName,
        #[source]
        cause: RestorableError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One restorable's failed `restore` call
#[derive(Debug, Error)]
#[error("restorable '{name}' failed to restore: {cause}")]
pub struct RestoreFailure {
    pub name: RestorableName,
    #[source]
    pub cause: RestorableError,
}

/// Load failures
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every other restorable was still attempted; `report` says how that went
    #[error("restore failed for: {}", failure_names(.failures))]
    Failed {
        report: Box<RestoreReport>,
        failures: Vec<RestoreFailure>,
    },
}

impl RestoreError {
    /// Names of the restorables whose `restore` failed, in restore order
    pub fn failed_names(&self) -> Vec<&str> {
        match self {
            RestoreError::Failed { failures, .. } => {
                failures.iter().map(|f| f.name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Report of a load that ran but had failures
    pub fn report(&self) -> Option<&RestoreReport> {
        match self {
            RestoreError::Failed { report, .. } => Some(&**report),
            _ => None,
        }
    }
}

fn failure_names(failures: &[RestoreFailure]) -> String {
    failures
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
