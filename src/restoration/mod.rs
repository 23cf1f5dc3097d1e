//! Save/restore core
//!
//! This module lets any number of independent presentation objects opt in to
//! persistence and be rebuilt at any previously reached dialogue position.
//!
//! # Architecture
//!
//! - `types`: payloads, bundles and position locators
//! - `error`: error types for every stage
//! - `restorable`: the trait components implement
//! - `registry`: live restorables and scoped registration handles
//! - `position`: node records and the checkpoint position index
//! - `coordinator`: save/load orchestration
//! - `store`: bundle persistence
//!
//! # Example Usage
//!
//! ```ignore
//! let mut state = GameState::new();
//! let video = Rc::new(RefCell::new(VideoController::new("bg", "videos", loader)));
//! let _registration = state.add_restorable(&video)?;
//!
//! let record = NodeRecord::new("ch1");
//! let offset = record.append(&checkpoint_bytes);
//! let position = state.checkpoints_mut().record_position(&record, offset, 0)?;
//!
//! let mut coordinator = RestoreCoordinator::new(JsonBundleStore::new(save_dir)?);
//! coordinator.save(&state, &position)?;
//! // ...
//! coordinator.load_reached(&state, "ch1", 0)?;
//! ```

pub mod coordinator;
pub mod error;
pub mod position;
pub mod registry;
pub mod restorable;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use coordinator::RestoreCoordinator;
pub use error::*;
pub use position::{
    CheckpointPositionIndex, NodeRecord, ReachedDialogueData, ReachedDialogueKey,
    ReachedDialoguePosition, VoiceEntry,
};
pub use registry::{DuplicatePolicy, RegisteredRestorable, Registration, RestorableRegistry};
pub use restorable::{DynRestorable, Restorable, SharedRestorable};
pub use store::{BundleInfo, BundleStore, JsonBundleStore, MemoryBundleStore};
pub use types::*;
