//! Dialogue positions and the checkpoint position index
//!
//! A position has two faces:
//! - the logical key a script author thinks in (node name + dialogue index)
//! - the physical locator inside a node record's checkpoint log
//!
//! `CheckpointPositionIndex` links the two and keeps the voice/interpolation
//! metadata captured the first time each dialogue line was reached.

use super::error::PositionError;
use super::types::PositionLocator;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(0);

/// One voice clip attached to a dialogue line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEntry {
    pub character_name: String,
    pub audio_name: String,
    /// Seconds to wait before playing
    pub delay: f32,
}

impl VoiceEntry {
    pub fn new(character_name: impl Into<String>, audio_name: impl Into<String>, delay: f32) -> Self {
        VoiceEntry {
            character_name: character_name.into(),
            audio_name: audio_name.into(),
            delay,
        }
    }
}

/// Append-only checkpoint log for one dialogue node
///
/// The restoration core only hands out offsets into the log; it never reads
/// the bytes back. A node visited again (another branch, a replay) gets a
/// fresh record with the same name and its own log starting at 0.
#[derive(Debug)]
pub struct NodeRecord {
    id: u64,
    node_name: String,
    log: RefCell<Vec<u8>>,
}

impl NodeRecord {
    pub fn new(node_name: impl Into<String>) -> Rc<Self> {
        Rc::new(NodeRecord {
            id: NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed),
            node_name: node_name.into(),
            log: RefCell::new(Vec::new()),
        })
    }

    /// Process-unique identity; two records may share a node name
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Appends a checkpoint and returns the offset it starts at
    pub fn append(&self, checkpoint: &[u8]) -> u64 {
        let mut log = self.log.borrow_mut();
        let offset = log.len() as u64;
        log.extend_from_slice(checkpoint);
        offset
    }

    pub fn len(&self) -> u64 {
        self.log.borrow().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }
}

/// Physical locator of a reached dialogue line
#[derive(Debug, Clone)]
pub struct ReachedDialoguePosition {
    node_record: Rc<NodeRecord>,
    checkpoint_offset: u64,
    dialogue_index: usize,
}

impl ReachedDialoguePosition {
    pub fn node_record(&self) -> &Rc<NodeRecord> {
        &self.node_record
    }

    pub fn checkpoint_offset(&self) -> u64 {
        self.checkpoint_offset
    }

    pub fn dialogue_index(&self) -> usize {
        self.dialogue_index
    }

    pub fn locator(&self) -> PositionLocator {
        PositionLocator::new(
            self.node_record.node_name(),
            self.checkpoint_offset,
            self.dialogue_index,
        )
    }
}

/// Logical lookup key for a dialogue line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReachedDialogueKey {
    pub node_name: String,
    pub dialogue_index: usize,
}

impl ReachedDialogueKey {
    pub fn new(node_name: impl Into<String>, dialogue_index: usize) -> Self {
        ReachedDialogueKey {
            node_name: node_name.into(),
            dialogue_index,
        }
    }
}

impl From<&ReachedDialogueData> for ReachedDialogueKey {
    fn from(data: &ReachedDialogueData) -> Self {
        ReachedDialogueKey::new(data.node_name.clone(), data.dialogue_index)
    }
}

/// Audio/timing metadata of a dialogue line, fixed when first reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachedDialogueData {
    node_name: String,
    dialogue_index: usize,
    voices: HashMap<String, VoiceEntry>,
    need_interpolate: bool,
}

impl ReachedDialogueData {
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn dialogue_index(&self) -> usize {
        self.dialogue_index
    }

    pub fn voices(&self) -> &HashMap<String, VoiceEntry> {
        &self.voices
    }

    pub fn need_interpolate(&self) -> bool {
        self.need_interpolate
    }

    pub fn key(&self) -> ReachedDialogueKey {
        ReachedDialogueKey::from(self)
    }
}

/// Index from dialogue lines to reached metadata and checkpoint locators
///
/// Reached metadata is first-write-wins: revisiting a line through branching
/// or backtracking reuses what was recorded the first time. Positions are
/// first-write-wins within one node record; a newer record with the same node
/// name takes the key over.
#[derive(Debug, Default)]
pub struct CheckpointPositionIndex {
    reached: HashMap<ReachedDialogueKey, Rc<ReachedDialogueData>>,
    positions: HashMap<ReachedDialogueKey, ReachedDialoguePosition>,
    /// Last recorded offset per node record id
    last_offsets: HashMap<u64, u64>,
}

impl CheckpointPositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records metadata for a line, or returns the existing record untouched
    pub fn record_reached(
        &mut self,
        node_name: impl Into<String>,
        dialogue_index: usize,
        voices: HashMap<String, VoiceEntry>,
        need_interpolate: bool,
    ) -> Rc<ReachedDialogueData> {
        let key = ReachedDialogueKey::new(node_name, dialogue_index);
        self.reached
            .entry(key)
            .or_insert_with_key(|key| {
                debug!("Reached {}:{} for the first time", key.node_name, key.dialogue_index);
                Rc::new(ReachedDialogueData {
                    node_name: key.node_name.clone(),
                    dialogue_index: key.dialogue_index,
                    voices,
                    need_interpolate,
                })
            })
            .clone()
    }

    pub fn lookup(&self, node_name: &str, dialogue_index: usize) -> Option<Rc<ReachedDialogueData>> {
        self.reached
            .get(&ReachedDialogueKey::new(node_name, dialogue_index))
            .cloned()
    }

    /// Like `lookup`, but a missing line is an error
    pub fn require(
        &self,
        node_name: &str,
        dialogue_index: usize,
    ) -> Result<Rc<ReachedDialogueData>, PositionError> {
        self.lookup(node_name, dialogue_index)
            .ok_or_else(|| PositionError::NotFound {
                node_name: node_name.to_string(),
                dialogue_index,
            })
    }

    /// Builds the locator for a line and associates it with the line's key
    ///
    /// Persisting the checkpoint bytes is the node record's job. Offsets must
    /// lie inside the record and never go backwards within one record.
    /// Recording a line again in the same record returns the first position.
    pub fn record_position(
        &mut self,
        node_record: &Rc<NodeRecord>,
        checkpoint_offset: u64,
        dialogue_index: usize,
    ) -> Result<ReachedDialoguePosition, PositionError> {
        let node_name = node_record.node_name();
        let key = ReachedDialogueKey::new(node_name, dialogue_index);
        if let Some(existing) = self.positions.get(&key) {
            if Rc::ptr_eq(existing.node_record(), node_record) {
                return Ok(existing.clone());
            }
        }

        let len = node_record.len();
        if checkpoint_offset > len {
            return Err(PositionError::OffsetOutOfRange {
                node_name: node_name.to_string(),
                offset: checkpoint_offset,
                len,
            });
        }
        if let Some(&previous) = self.last_offsets.get(&node_record.id()) {
            if checkpoint_offset < previous {
                return Err(PositionError::NonMonotonicOffset {
                    node_name: node_name.to_string(),
                    previous,
                    requested: checkpoint_offset,
                });
            }
        }

        let position = ReachedDialoguePosition {
            node_record: Rc::clone(node_record),
            checkpoint_offset,
            dialogue_index,
        };
        self.last_offsets.insert(node_record.id(), checkpoint_offset);
        if self.positions.insert(key, position.clone()).is_some() {
            debug!(
                "Node record {} of '{}' took over line {}",
                node_record.id(),
                node_name,
                dialogue_index
            );
        }
        Ok(position)
    }

    /// Finds the locator recorded for a line
    pub fn resolve(
        &self,
        node_name: &str,
        dialogue_index: usize,
    ) -> Result<ReachedDialoguePosition, PositionError> {
        self.positions
            .get(&ReachedDialogueKey::new(node_name, dialogue_index))
            .cloned()
            .ok_or_else(|| PositionError::NotFound {
                node_name: node_name.to_string(),
                dialogue_index,
            })
    }

    pub fn reached_count(&self) -> usize {
        self.reached.len()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Reached metadata sorted by node name then index, for persistence
    pub fn export_reached(&self) -> Vec<ReachedDialogueData> {
        let mut all: Vec<_> = self.reached.values().map(|d| (**d).clone()).collect();
        all.sort_by(|a, b| {
            a.node_name
                .cmp(&b.node_name)
                .then(a.dialogue_index.cmp(&b.dialogue_index))
        });
        all
    }

    /// Loads persisted metadata; lines already recorded keep their data
    pub fn import_reached(&mut self, records: impl IntoIterator<Item = ReachedDialogueData>) {
        for record in records {
            self.reached
                .entry(record.key())
                .or_insert_with(|| Rc::new(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices(entries: &[(&str, &str)]) -> HashMap<String, VoiceEntry> {
        entries
            .iter()
            .map(|(slot, audio)| (slot.to_string(), VoiceEntry::new(*slot, *audio, 0.0)))
            .collect()
    }

    #[test]
    fn test_record_reached_first_write_wins() {
        let mut index = CheckpointPositionIndex::new();

        let first = index.record_reached("nodeA", 3, voices(&[("v1", "e1")]), true);
        let second = index.record_reached("nodeA", 3, voices(&[("v2", "e2")]), false);

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.voices().len(), 1);
        assert_eq!(second.voices()["v1"].audio_name, "e1");
        assert!(second.need_interpolate());
        assert_eq!(index.reached_count(), 1);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let mut index = CheckpointPositionIndex::new();
        index.record_reached("nodeA", 0, HashMap::new(), false);

        assert!(index.lookup("nodeA", 0).is_some());
        assert!(index.lookup("nodeA", 1).is_none());
        assert!(index.lookup("nodeB", 0).is_none());
        assert_eq!(
            index.require("nodeB", 0).unwrap_err(),
            PositionError::NotFound {
                node_name: "nodeB".to_string(),
                dialogue_index: 0,
            }
        );
    }

    #[test]
    fn test_key_equality() {
        assert_eq!(ReachedDialogueKey::new("a", 1), ReachedDialogueKey::new("a", 1));
        assert_ne!(ReachedDialogueKey::new("a", 1), ReachedDialogueKey::new("a", 2));
        assert_ne!(ReachedDialogueKey::new("a", 1), ReachedDialogueKey::new("b", 1));

        let mut index = CheckpointPositionIndex::new();
        let data = index.record_reached("a", 1, HashMap::new(), false);
        assert_eq!(data.key(), ReachedDialogueKey::new("a", 1));
    }

    #[test]
    fn test_node_record_append_offsets() {
        let record = NodeRecord::new("intro");
        assert!(record.is_empty());

        assert_eq!(record.append(b"abc"), 0);
        assert_eq!(record.append(b"defg"), 3);
        assert_eq!(record.len(), 7);
    }

    #[test]
    fn test_record_position_and_resolve() {
        let mut index = CheckpointPositionIndex::new();
        let record = NodeRecord::new("intro");
        let offset = record.append(b"checkpoint");

        let position = index.record_position(&record, offset, 0).unwrap();
        assert_eq!(position.checkpoint_offset(), 0);
        assert_eq!(position.locator(), PositionLocator::new("intro", 0, 0));

        let resolved = index.resolve("intro", 0).unwrap();
        assert!(Rc::ptr_eq(resolved.node_record(), &record));
        assert!(index.resolve("intro", 1).is_err());
    }

    #[test]
    fn test_record_position_rejects_backwards_offset() {
        let mut index = CheckpointPositionIndex::new();
        let record = NodeRecord::new("intro");
        record.append(b"0123456789");

        index.record_position(&record, 5, 0).unwrap();
        let err = index.record_position(&record, 2, 1).unwrap_err();
        assert_eq!(
            err,
            PositionError::NonMonotonicOffset {
                node_name: "intro".to_string(),
                previous: 5,
                requested: 2,
            }
        );
        assert_eq!(index.position_count(), 1);
    }

    #[test]
    fn test_record_position_rejects_offset_past_end() {
        let mut index = CheckpointPositionIndex::new();
        let record = NodeRecord::new("intro");
        record.append(b"abc");

        assert!(matches!(
            index.record_position(&record, 4, 0),
            Err(PositionError::OffsetOutOfRange { offset: 4, len: 3, .. })
        ));
        // The end of the log is where the next checkpoint will start
        assert!(index.record_position(&record, 3, 0).is_ok());
    }

    #[test]
    fn test_record_position_existing_key_returns_first() {
        let mut index = CheckpointPositionIndex::new();
        let record = NodeRecord::new("intro");
        record.append(b"0123456789");

        index.record_position(&record, 2, 0).unwrap();
        let again = index.record_position(&record, 8, 0).unwrap();
        assert_eq!(again.checkpoint_offset(), 2);
    }

    #[test]
    fn test_new_record_with_same_name_starts_over() {
        let mut index = CheckpointPositionIndex::new();
        let first = NodeRecord::new("ch1");
        first.append(&[0; 16]);
        let second = NodeRecord::new("ch1");
        second.append(b"checkpoint");
        assert_ne!(first.id(), second.id());

        index.record_position(&first, 10, 0).unwrap();
        let position = index.record_position(&second, 0, 1).unwrap();
        assert_eq!(position.checkpoint_offset(), 0);
        assert!(Rc::ptr_eq(index.resolve("ch1", 1).unwrap().node_record(), &second));

        // Offsets still may not go backwards inside the first record
        assert!(matches!(
            index.record_position(&first, 4, 2),
            Err(PositionError::NonMonotonicOffset { previous: 10, requested: 4, .. })
        ));
    }

    #[test]
    fn test_newer_record_takes_over_line() {
        let mut index = CheckpointPositionIndex::new();
        let first = NodeRecord::new("ch1");
        first.append(&[0; 16]);
        let second = NodeRecord::new("ch1");
        second.append(b"checkpoint");

        index.record_position(&first, 12, 0).unwrap();
        let taken = index.record_position(&second, 0, 0).unwrap();
        assert!(Rc::ptr_eq(taken.node_record(), &second));

        let resolved = index.resolve("ch1", 0).unwrap();
        assert!(Rc::ptr_eq(resolved.node_record(), &second));
        assert_eq!(resolved.checkpoint_offset(), 0);
        assert_eq!(index.position_count(), 1);
    }

    #[test]
    fn test_export_import_keeps_first_write() {
        let mut index = CheckpointPositionIndex::new();
        index.record_reached("b", 0, voices(&[("v", "b0")]), false);
        index.record_reached("a", 1, voices(&[("v", "a1")]), true);
        index.record_reached("a", 0, HashMap::new(), false);

        let exported = index.export_reached();
        let keys: Vec<_> = exported.iter().map(|d| d.key()).collect();
        assert_eq!(
            keys,
            vec![
                ReachedDialogueKey::new("a", 0),
                ReachedDialogueKey::new("a", 1),
                ReachedDialogueKey::new("b", 0),
            ]
        );

        let mut restored = CheckpointPositionIndex::new();
        restored.record_reached("a", 1, voices(&[("v", "other")]), false);
        restored.import_reached(exported);

        assert_eq!(restored.reached_count(), 3);
        assert_eq!(restored.lookup("a", 1).unwrap().voices()["v"].audio_name, "other");
        assert_eq!(restored.lookup("b", 0).unwrap().voices()["v"].audio_name, "b0");
    }
}
