//! Session-wide game state
//!
//! `GameState` owns the restorable registry and the checkpoint position index
//! for one play session. Components receive it by reference to register
//! themselves; nothing here is a process global, so tests build a fresh one.

use crate::config::RestorationConfig;
use crate::restoration::{
    CheckpointPositionIndex, DynRestorable, Registration, RegistryError, RestorableRegistry,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Playback mode flags shared with presentation components
///
/// Components consult these to decide whether a change should animate.
#[derive(Debug, Default)]
pub struct PlaybackFlags {
    restoring: Cell<bool>,
    fast_forward: Cell<bool>,
}

impl PlaybackFlags {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring.get()
    }

    pub fn is_fast_forward(&self) -> bool {
        self.fast_forward.get()
    }

    pub fn set_fast_forward(&self, fast_forward: bool) {
        self.fast_forward.set(fast_forward);
    }

    /// Marks a restore as in progress until the guard is dropped
    pub fn begin_restoring(self: &Rc<Self>) -> RestoringGuard {
        let previous = self.restoring.replace(true);
        RestoringGuard {
            flags: Rc::clone(self),
            previous,
        }
    }
}

#[must_use = "the restoring flag is cleared when the guard is dropped"]
pub struct RestoringGuard {
    flags: Rc<PlaybackFlags>,
    previous: bool,
}

impl Drop for RestoringGuard {
    fn drop(&mut self) {
        self.flags.restoring.set(self.previous);
    }
}

pub struct GameState {
    registry: RestorableRegistry,
    checkpoints: CheckpointPositionIndex,
    flags: Rc<PlaybackFlags>,
}

impl GameState {
    pub fn new() -> Self {
        GameState {
            registry: RestorableRegistry::new(),
            checkpoints: CheckpointPositionIndex::new(),
            flags: PlaybackFlags::new(),
        }
    }

    pub fn from_config(config: &RestorationConfig) -> Self {
        GameState {
            registry: RestorableRegistry::with_policy(config.duplicate_policy),
            checkpoints: CheckpointPositionIndex::new(),
            flags: PlaybackFlags::new(),
        }
    }

    pub fn registry(&self) -> &RestorableRegistry {
        &self.registry
    }

    pub fn checkpoints(&self) -> &CheckpointPositionIndex {
        &self.checkpoints
    }

    pub fn checkpoints_mut(&mut self) -> &mut CheckpointPositionIndex {
        &mut self.checkpoints
    }

    pub fn flags(&self) -> Rc<PlaybackFlags> {
        Rc::clone(&self.flags)
    }

    pub fn is_restoring(&self) -> bool {
        self.flags.is_restoring()
    }

    pub fn add_restorable<T>(&self, object: &Rc<RefCell<T>>) -> Result<Registration, RegistryError>
    where
        T: DynRestorable + 'static,
    {
        self.registry.add(object)
    }

    pub fn remove_restorable(&self, name: &str) -> bool {
        self.registry.remove(name)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
