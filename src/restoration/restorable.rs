//! Restorable trait for objects whose state can be snapshotted and rebuilt
//!
//! Components implement the typed `Restorable` trait. The registry and the
//! coordinator only see `DynRestorable`, the object-safe form every
//! `Restorable` gets for free, which moves data through the opaque
//! `RestoreData` payload.

use super::error::RestorableError;
use super::types::{RestorablePriority, RestoreData};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::rc::Rc;

/// Trait for presentation objects that take part in save/restore
///
/// # Example
///
/// ```ignore
/// impl Restorable for VideoController {
///     type Data = VideoRestoreData;
///     const DATA_TYPE: &'static str = "video";
///
///     fn restorable_name(&self) -> &str { &self.lua_name }
///
///     fn get_restore_data(&self) -> Result<VideoRestoreData, RestorableError> {
///         Ok(VideoRestoreData { current_video_name: self.current_video_name.clone() })
///     }
///
///     fn restore(&mut self, data: VideoRestoreData) -> Result<(), RestorableError> {
///         // apply without transitions
///     }
/// }
/// ```
pub trait Restorable {
    /// Shape of the data this object captures
    type Data: Serialize + DeserializeOwned;

    /// Tag written into `RestoreData::data_type`
    const DATA_TYPE: &'static str;

    /// Must stay constant while the object is registered
    fn restorable_name(&self) -> &str;

    fn priority(&self) -> RestorablePriority {
        RestorablePriority::Normal
    }

    /// Capture enough state to reproduce what is currently visible
    ///
    /// Must not change the object's visible state.
    fn get_restore_data(&self) -> Result<Self::Data, RestorableError>;

    /// Rebuild state from captured data
    ///
    /// Restores are instantaneous: no fades or other transitions. Applying
    /// data equal to the current state must be a no-op.
    fn restore(&mut self, data: Self::Data) -> Result<(), RestorableError>;
}

/// Object-safe view of a `Restorable` used by the registry and coordinator
pub trait DynRestorable {
    fn name(&self) -> &str;

    fn restore_priority(&self) -> RestorablePriority;

    fn capture(&self) -> Result<RestoreData, RestorableError>;

    fn apply(&mut self, data: &RestoreData) -> Result<(), RestorableError>;
}

impl<T: Restorable> DynRestorable for T {
    fn name(&self) -> &str {
        Restorable::restorable_name(self)
    }

    fn restore_priority(&self) -> RestorablePriority {
        Restorable::priority(self)
    }

    fn capture(&self) -> Result<RestoreData, RestorableError> {
        let data = self.get_restore_data()?;
        Ok(RestoreData::new(T::DATA_TYPE, serde_json::to_value(&data)?))
    }

    fn apply(&mut self, data: &RestoreData) -> Result<(), RestorableError> {
        if data.data_type != T::DATA_TYPE {
            return Err(RestorableError::DataTypeMismatch {
                expected: T::DATA_TYPE.to_string(),
                found: data.data_type.clone(),
            });
        }
        let typed: T::Data = serde_json::from_value(data.payload.clone())?;
        self.restore(typed)
    }
}

/// Shared, interior-mutable handle to a live restorable
pub type SharedRestorable = Rc<RefCell<dyn DynRestorable>>;
