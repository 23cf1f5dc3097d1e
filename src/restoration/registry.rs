//! Registry of live restorables
//!
//! The registry holds non-owning references: each component keeps its own
//! `Rc<RefCell<_>>` plus the `Registration` handle returned by `add`. Dropping
//! the handle deregisters the object, so registration and deregistration are
//! always paired.
//!
//! Iteration methods return a fresh snapshot. Restorables may register or
//! deregister others while a snapshot is being walked without affecting it.

use super::error::RegistryError;
use super::restorable::{DynRestorable, SharedRestorable};
use super::types::{RestorableName, RestorablePriority};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::cmp::Reverse;
use std::rc::{Rc, Weak};

/// What `add` does when the name is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Refuse the second registration
    #[default]
    Reject,
    /// Replace the existing entry, logging a warning
    Overwrite,
}

struct RegistryEntry {
    name: RestorableName,
    priority: RestorablePriority,
    sequence: u64,
    object: Weak<RefCell<dyn DynRestorable>>,
}

struct RegistryTable {
    // Kept in registration order
    entries: Vec<RegistryEntry>,
    next_sequence: u64,
    policy: DuplicatePolicy,
}

impl RegistryTable {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    fn remove_sequence(&mut self, sequence: u64) -> bool {
        match self.entries.iter().position(|e| e.sequence == sequence) {
            Some(index) => {
                let entry = self.entries.remove(index);
                debug!("Deregistered restorable '{}'", entry.name);
                true
            }
            None => false,
        }
    }
}

/// One live entry of a registry snapshot
#[derive(Clone)]
pub struct RegisteredRestorable {
    pub name: RestorableName,
    pub priority: RestorablePriority,
    pub object: SharedRestorable,
}

/// Table of every restorable currently taking part in save/restore
pub struct RestorableRegistry {
    table: Rc<RefCell<RegistryTable>>,
}

impl RestorableRegistry {
    pub fn new() -> Self {
        Self::with_policy(DuplicatePolicy::default())
    }

    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        RestorableRegistry {
            table: Rc::new(RefCell::new(RegistryTable {
                entries: Vec::new(),
                next_sequence: 0,
                policy,
            })),
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.table.borrow().policy
    }

    /// Registers `object` under its own name
    ///
    /// Name and priority are read once here; both must stay constant for as
    /// long as the returned handle is alive.
    pub fn add<T>(&self, object: &Rc<RefCell<T>>) -> Result<Registration, RegistryError>
    where
        T: DynRestorable + 'static,
    {
        let (name, priority) = {
            let inner = object.borrow();
            (inner.name().to_string(), inner.restore_priority())
        };
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let shared: SharedRestorable = object.clone();
        let mut table = self.table.borrow_mut();

        if let Some(index) = table.position(&name) {
            match table.policy {
                DuplicatePolicy::Reject => {
                    warn!("Rejected duplicate registration of restorable '{}'", name);
                    return Err(RegistryError::DuplicateName(name));
                }
                DuplicatePolicy::Overwrite => {
                    warn!("Restorable '{}' registered twice, shadowing the earlier object", name);
                    table.entries.remove(index);
                }
            }
        }

        let sequence = table.next_sequence;
        table.next_sequence += 1;
        table.entries.push(RegistryEntry {
            name: name.clone(),
            priority,
            sequence,
            object: Rc::downgrade(&shared),
        });
        debug!("Registered restorable '{}' ({:?})", name, priority);

        Ok(Registration {
            table: Rc::downgrade(&self.table),
            name,
            sequence,
        })
    }

    /// Removes the entry for `name`; returns false if there was none
    pub fn remove(&self, name: &str) -> bool {
        let mut table = self.table.borrow_mut();
        match table.position(name) {
            Some(index) => {
                table.entries.remove(index);
                debug!("Deregistered restorable '{}'", name);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.borrow().position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.table.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.borrow().entries.is_empty()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<RestorableName> {
        self.table
            .borrow()
            .entries
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Live restorables in registration order
    pub fn all_in_registration_order(&self) -> Vec<RegisteredRestorable> {
        let mut table = self.table.borrow_mut();

        // Objects dropped without releasing their handle leave dead entries behind
        table.entries.retain(|e| {
            let alive = e.object.strong_count() > 0;
            if !alive {
                warn!("Pruning restorable '{}': object dropped while registered", e.name);
            }
            alive
        });

        table
            .entries
            .iter()
            .filter_map(|e| {
                e.object.upgrade().map(|object| RegisteredRestorable {
                    name: e.name.clone(),
                    priority: e.priority,
                    object,
                })
            })
            .collect()
    }

    /// Live restorables, highest priority first, ties in registration order
    pub fn all_by_priority_descending(&self) -> Vec<RegisteredRestorable> {
        let mut entries = self.all_in_registration_order();
        // sort_by_key is stable, which keeps registration order within a priority
        entries.sort_by_key(|e| Reverse(e.priority));
        entries
    }
}

impl Default for RestorableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped registration; deregisters on drop
///
/// A handle only ever removes the entry it created. If that entry was already
/// removed, or shadowed under `DuplicatePolicy::Overwrite`, dropping the
/// handle does nothing.
#[must_use = "dropping the registration deregisters the restorable immediately"]
pub struct Registration {
    table: Weak<RefCell<RegistryTable>>,
    name: RestorableName,
    sequence: u64,
}

impl Registration {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deregisters now instead of at scope exit
    pub fn release(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        match table.try_borrow_mut() {
            Ok(mut table) => {
                table.remove_sequence(self.sequence);
            }
            Err(_) => warn!(
                "Could not deregister restorable '{}': registry is in use",
                self.name
            ),
        }
    }
}
