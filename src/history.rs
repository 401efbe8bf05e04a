//! Session history of successful generations.
//!
//! [`HistoryLedger`] is append-only: entries are created once, when a
//! pipeline run succeeds, and are never edited or removed for the lifetime of
//! the process.  Display order is newest first; storage order is insertion
//! order.

use chrono::{DateTime, Local};

use crate::artifact::GeneratedArtifact;

/// Identifier of a history entry.  Strictly increasing within a session.
pub type EntryId = u64;

/// One successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub created_at: DateTime<Local>,
    /// The transcript that was sent to the synthesis service.
    pub prompt_text: String,
    /// The normalized artifact exactly as it was published.
    pub artifact_text: String,
}

impl HistoryEntry {
    /// Timestamp formatted for the history list.
    pub fn timestamp_label(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Append-only ledger.
#[derive(Debug, Default, Clone)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
    next_id: EntryId,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry and return a copy of it.
    pub fn record(&mut self, prompt_text: &str, artifact: &GeneratedArtifact) -> HistoryEntry {
        self.next_id += 1;
        let entry = HistoryEntry {
            id: self.next_id,
            created_at: Local::now(),
            prompt_text: prompt_text.to_string(),
            artifact_text: artifact.as_str().to_string(),
        };
        self.entries.push(entry.clone());
        entry
    }

    pub fn get(&self, id: EntryId) -> Option<&HistoryEntry> {
        // Ids are assigned in insertion order, so the slice is sorted by id.
        self.entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// The stored artifact text for `id`, for re-rendering.  Does not modify
    /// the ledger.
    pub fn select_for_display(&self, id: EntryId) -> Option<&str> {
        self.get(id).map(|e| e.artifact_text.as_str())
    }

    /// Entries newest first.
    pub fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
