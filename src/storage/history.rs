//! clipcards - Clip history module
//!
//! Bounded in-memory record of the most recent distinct clips, newest first.
//! Nothing is persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::clipboard::{Clip, MonitorEvent};

/// One captured clip
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub clip: Clip,
    /// Content fingerprint, see [`Clip::digest`]
    pub digest: String,
    pub captured_at: DateTime<Utc>,
}

/// Most recent distinct clips
#[derive(Debug, Clone)]
pub struct ClipHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ClipHistory {
    pub const DEFAULT_CAPACITY: usize = 4;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// History keeping at most `capacity` clips (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `clip` as the newest entry
    ///
    /// Returns false, recording nothing, if its content matches the newest
    /// entry. The oldest entry is dropped once the history is full.
    pub fn push(&mut self, clip: Clip) -> bool {
        let digest = clip.digest();
        if self.latest().is_some_and(|newest| newest.digest == digest) {
            log::debug!("[History] Content already recorded (hash: {}), skipping", &digest[..8]);
            return false;
        }

        self.entries.push_front(HistoryEntry {
            clip,
            digest,
            captured_at: Utc::now(),
        });
        self.entries.truncate(self.capacity);
        true
    }

    /// Record the clip carried by a monitor event, if any
    pub fn record(&mut self, event: MonitorEvent) -> bool {
        match event {
            MonitorEvent::NewClip(clip) => self.push(clip),
            MonitorEvent::Changed => false,
        }
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Entry `index` places back from the newest
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Entries whose text rendering contains `query`, newest first
    pub fn search(&self, query: &str) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                entry
                    .clip
                    .iter()
                    .filter_map(|datum| datum.data())
                    .any(|payload| payload.to_text().contains(query))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ClipHistory {
    fn default() -> Self {
        Self::new()
    }
}
