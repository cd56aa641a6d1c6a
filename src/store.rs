//! Repetition store boundary
//!
//! Raw entries are owned by a storage collaborator. The engine only needs the
//! ordered range queries of [`RepetitionStore`]; [`MemoryRepetitionStore`] is the
//! in-process adapter used by the CLI and tests.

use crate::timestamp::Timestamp;
use crate::types::{RawEntry, RawValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source of truth for a habit's raw entries
pub trait RepetitionStore: Send {
    /// Entries with `from <= timestamp <= to`, oldest first
    fn by_interval(&self, from: Timestamp, to: Timestamp) -> Vec<RawEntry>;

    fn oldest(&self) -> Option<RawEntry>;

    fn newest(&self) -> Option<RawEntry>;

    fn value(&self, timestamp: Timestamp) -> Option<RawValue>;

    /// Insert or replace the entry for its day
    fn put(&mut self, entry: RawEntry);

    /// Remove the entry for a day, returning it if there was one
    fn remove(&mut self, timestamp: Timestamp) -> Option<RawEntry>;

    /// Oldest explicit success (or positive quantity)
    fn oldest_successful(&self) -> Option<RawEntry> {
        let (oldest, newest) = (self.oldest()?, self.newest()?);
        self.by_interval(oldest.timestamp, newest.timestamp)
            .into_iter()
            .find(|entry| entry.value.is_successful())
    }

    /// Every entry, oldest first
    fn all(&self) -> Vec<RawEntry> {
        match (self.oldest(), self.newest()) {
            (Some(oldest), Some(newest)) => self.by_interval(oldest.timestamp, newest.timestamp),
            _ => Vec::new(),
        }
    }
}

/// Ordered in-memory repetition store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRepetitionStore {
    entries: BTreeMap<Timestamp, RawValue>,
}

impl MemoryRepetitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<RawEntry> for MemoryRepetitionStore {
    fn from_iter<I: IntoIterator<Item = RawEntry>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|entry| (entry.timestamp, entry.value))
                .collect(),
        }
    }
}

impl RepetitionStore for MemoryRepetitionStore {
    fn by_interval(&self, from: Timestamp, to: Timestamp) -> Vec<RawEntry> {
        if from.is_newer_than(to) {
            return Vec::new();
        }
        self.entries
            .range(from..=to)
            .map(|(timestamp, value)| RawEntry::new(*timestamp, *value))
            .collect()
    }

    fn oldest(&self) -> Option<RawEntry> {
        self.entries
            .first_key_value()
            .map(|(timestamp, value)| RawEntry::new(*timestamp, *value))
    }

    fn newest(&self) -> Option<RawEntry> {
        self.entries
            .last_key_value()
            .map(|(timestamp, value)| RawEntry::new(*timestamp, *value))
    }

    fn value(&self, timestamp: Timestamp) -> Option<RawValue> {
        self.entries.get(&timestamp).copied()
    }

    fn put(&mut self, entry: RawEntry) {
        self.entries.insert(entry.timestamp, entry.value);
    }

    fn remove(&mut self, timestamp: Timestamp) -> Option<RawEntry> {
        self.entries
            .remove(&timestamp)
            .map(|value| RawEntry::new(timestamp, value))
    }

    fn oldest_successful(&self) -> Option<RawEntry> {
        self.entries
            .iter()
            .find(|(_, value)| value.is_successful())
            .map(|(timestamp, value)| RawEntry::new(*timestamp, *value))
    }

    fn all(&self) -> Vec<RawEntry> {
        self.entries
            .iter()
            .map(|(timestamp, value)| RawEntry::new(*timestamp, *value))
            .collect()
    }
}
