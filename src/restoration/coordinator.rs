//! Save and load orchestration
//!
//! Saving walks the registry in registration order and is all-or-nothing.
//! Loading walks it highest priority first and is best-effort: a failing
//! restorable is recorded and the rest are still restored. There is no
//! rollback, so a failed load should be retried rather than assumed atomic.

use super::error::{RestorableError, RestoreError, RestoreFailure, SaveError};
use super::position::ReachedDialoguePosition;
use super::registry::RestorableRegistry;
use super::store::BundleStore;
use super::types::*;
use crate::game_state::GameState;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};

pub struct RestoreCoordinator<S: BundleStore> {
    store: S,
}

impl<S: BundleStore> RestoreCoordinator<S> {
    pub fn new(store: S) -> Self {
        RestoreCoordinator { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Captures every registered restorable without persisting anything
    pub fn snapshot(
        &self,
        registry: &RestorableRegistry,
        position: &ReachedDialoguePosition,
    ) -> Result<SnapshotBundle, SaveError> {
        let mut entries = BTreeMap::new();

        for entry in registry.all_in_registration_order() {
            let captured = match entry.object.try_borrow() {
                Ok(object) => object.capture(),
                Err(_) => Err(RestorableError::Busy),
            };
            match captured {
                Ok(data) => {
                    entries.insert(entry.name, data);
                }
                Err(cause) => {
                    warn!("Save aborted at restorable '{}': {}", entry.name, cause);
                    return Err(SaveError::Aborted {
                        name: entry.name,
                        cause,
                    });
                }
            }
        }

        Ok(SnapshotBundle::new(position.locator(), entries))
    }

    /// Captures every registered restorable and persists the bundle
    ///
    /// Nothing is written unless every restorable captured successfully.
    pub fn save(
        &mut self,
        state: &GameState,
        position: &ReachedDialoguePosition,
    ) -> Result<SnapshotBundle, SaveError> {
        let bundle = self.snapshot(state.registry(), position)?;
        self.store.save(&bundle)?;
        info!(
            "Saved {} restorable(s) at {}",
            bundle.len(),
            bundle.position
        );
        Ok(bundle)
    }

    /// Loads the bundle stored for `position` and restores it
    pub fn load(
        &mut self,
        state: &GameState,
        position: &PositionLocator,
    ) -> Result<RestoreReport, RestoreError> {
        let bundle = self.store.load(position)?;
        self.apply(state, &bundle)
    }

    /// Resolves a dialogue line to its recorded position, then loads it
    pub fn load_reached(
        &mut self,
        state: &GameState,
        node_name: &str,
        dialogue_index: usize,
    ) -> Result<RestoreReport, RestoreError> {
        let position = state.checkpoints().resolve(node_name, dialogue_index)?;
        self.load(state, &position.locator())
    }

    /// Pushes a bundle's data to every registered restorable
    ///
    /// If any restorable fails, the error still carries the report of what
    /// was restored. The session is flagged as restoring for the duration so components
    /// skip their transitions.
    pub fn apply(
        &self,
        state: &GameState,
        bundle: &SnapshotBundle,
    ) -> Result<RestoreReport, RestoreError> {
        let _restoring = state.flags().begin_restoring();

        let mut report = RestoreReport::new(bundle.position.clone());
        let mut failures = Vec::new();
        let mut seen = HashSet::new();

        for entry in state.registry().all_by_priority_descending() {
            seen.insert(entry.name.clone());

            let Some(data) = bundle.get(&entry.name) else {
                debug!("No data for restorable '{}', leaving it as is", entry.name);
                report.untouched.push(entry.name);
                continue;
            };

            let result = match entry.object.try_borrow_mut() {
                Ok(mut object) => object.apply(data),
                Err(_) => Err(RestorableError::Busy),
            };
            match result {
                Ok(()) => {
                    debug!("Restored '{}'", entry.name);
                    report.restored.push(entry.name);
                }
                Err(cause) => {
                    warn!("Failed to restore '{}': {}", entry.name, cause);
                    failures.push(RestoreFailure {
                        name: entry.name,
                        cause,
                    });
                }
            }
        }

        report.orphaned = bundle
            .entries
            .keys()
            .filter(|name| !seen.contains(*name))
            .cloned()
            .collect();
        if !report.orphaned.is_empty() {
            debug!(
                "Bundle at {} has data for unregistered restorables: {:?}",
                bundle.position, report.orphaned
            );
        }

        if !failures.is_empty() {
            return Err(RestoreError::Failed {
                report: Box::new(report),
                failures,
            });
        }

        info!(
            "Restored {} restorable(s) at {}",
            report.restored.len(),
            bundle.position
        );
        Ok(report)
    }
}
