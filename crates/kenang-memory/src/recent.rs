//! Bounded recent store - sliding window of the latest turns per conversation
//!
//! Each conversation owns a `VecDeque` capped at the configured capacity:
//! insertion at the tail, eviction from the head. Filtered scans are linear
//! over the current window, which is small by construction.

use crate::entry::{HistoryMessage, MemoryEntry, Role};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Window state for one conversation
#[derive(Debug)]
struct RecentWindow {
    entries: VecDeque<MemoryEntry>,
    created_at: DateTime<Utc>,
    last_updated: Option<DateTime<Utc>>,
    cleared_at: Option<DateTime<Utc>>,
    /// Turns stored since creation or the last full clear
    message_count: usize,
}

impl RecentWindow {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            created_at: Utc::now(),
            last_updated: None,
            cleared_at: None,
            message_count: 0,
        }
    }
}

/// Snapshot of a conversation window's bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMetadata {
    /// Whether the conversation was ever stored to
    pub exists: bool,
    /// Turns stored since creation or the last full clear
    pub message_count: usize,
    /// Entries currently in the window
    pub current_size: usize,
    /// Maximum window length
    pub capacity: usize,
    /// When the window was created
    pub created_at: Option<DateTime<Utc>>,
    /// Last insertion time
    pub last_updated: Option<DateTime<Utc>>,
    /// Last full clear
    pub cleared_at: Option<DateTime<Utc>>,
}

/// Per-conversation sliding windows of recent turns
pub struct RecentStore {
    windows: DashMap<String, RecentWindow>,
    capacity: usize,
}

impl RecentStore {
    /// Create a store retaining at most `capacity` entries per conversation
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: DashMap::new(),
            capacity,
        }
    }

    /// Maximum entries retained per conversation
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, returning the evicted oldest entry if the window was full
    pub fn add(&self, conversation_id: &str, entry: MemoryEntry) -> Option<MemoryEntry> {
        let mut window = self
            .windows
            .entry(conversation_id.to_string())
            .or_insert_with(RecentWindow::new);

        window.entries.push_back(entry);
        window.message_count += 1;
        window.last_updated = Some(Utc::now());

        let mut evicted = None;
        while window.entries.len() > self.capacity {
            evicted = window.entries.pop_front();
        }

        if let Some(old) = &evicted {
            debug!(
                conversation_id = %conversation_id,
                entry_id = %old.id(),
                "Evicted oldest entry from recent window"
            );
        }

        evicted
    }

    /// Entries oldest-first, optionally only the most recent `limit`
    pub fn get(&self, conversation_id: &str, limit: Option<usize>) -> Vec<MemoryEntry> {
        let Some(window) = self.windows.get(conversation_id) else {
            return Vec::new();
        };

        let skip = limit.map_or(0, |l| window.entries.len().saturating_sub(l));
        window.entries.iter().skip(skip).cloned().collect()
    }

    /// The most recent `count` entries, newest-first
    pub fn get_latest(&self, conversation_id: &str, count: usize) -> Vec<MemoryEntry> {
        let Some(window) = self.windows.get(conversation_id) else {
            return Vec::new();
        };

        window.entries.iter().rev().take(count).cloned().collect()
    }

    /// Entries from one participant, oldest-first
    pub fn get_by_participant(
        &self,
        conversation_id: &str,
        participant_id: &str,
        limit: Option<usize>,
    ) -> Vec<MemoryEntry> {
        self.filter(conversation_id, limit, |e| e.participant_id() == participant_id)
    }

    /// Entries labelled with `intent`, oldest-first
    pub fn get_by_intent(
        &self,
        conversation_id: &str,
        intent: &str,
        limit: Option<usize>,
    ) -> Vec<MemoryEntry> {
        self.filter(conversation_id, limit, |e| e.intent() == Some(intent))
    }

    /// Case-insensitive substring matches, newest-first, at most `limit`
    pub fn search(&self, conversation_id: &str, query: &str, limit: usize) -> Vec<MemoryEntry> {
        let Some(window) = self.windows.get(conversation_id) else {
            return Vec::new();
        };

        let needle = query.to_lowercase();
        window
            .entries
            .iter()
            .rev()
            .filter(|e| e.text().to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Empty the window, keeping its creation time; returns entries removed
    pub fn clear(&self, conversation_id: &str) -> usize {
        let Some(mut window) = self.windows.get_mut(conversation_id) else {
            return 0;
        };

        let cleared = window.entries.len();
        window.entries.clear();
        window.message_count = 0;
        window.cleared_at = Some(Utc::now());

        debug!(conversation_id = %conversation_id, cleared, "Cleared recent window");
        cleared
    }

    /// Drop entries stamped at or before `cutoff`; returns what was removed
    pub fn retain_newer_than(
        &self,
        conversation_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Vec<MemoryEntry> {
        let Some(mut window) = self.windows.get_mut(conversation_id) else {
            return Vec::new();
        };

        // Timestamps are non-decreasing, so the removed entries form a prefix
        let keep_from = window
            .entries
            .iter()
            .position(|e| e.timestamp() > cutoff)
            .unwrap_or(window.entries.len());

        let removed: Vec<MemoryEntry> = window.entries.drain(..keep_from).collect();
        window.message_count = window.message_count.saturating_sub(removed.len());
        removed
    }

    /// Bookkeeping for a conversation; unknown conversations report `exists = false`
    pub fn metadata(&self, conversation_id: &str) -> WindowMetadata {
        match self.windows.get(conversation_id) {
            Some(window) => WindowMetadata {
                exists: true,
                message_count: window.message_count,
                current_size: window.entries.len(),
                capacity: self.capacity,
                created_at: Some(window.created_at),
                last_updated: window.last_updated,
                cleared_at: window.cleared_at,
            },
            None => WindowMetadata {
                exists: false,
                message_count: 0,
                current_size: 0,
                capacity: self.capacity,
                created_at: None,
                last_updated: None,
                cleared_at: None,
            },
        }
    }

    /// Prompt-ready window; participant turns are prefixed with their name
    pub fn conversation_window(
        &self,
        conversation_id: &str,
        window_size: usize,
    ) -> Vec<HistoryMessage> {
        self.get(conversation_id, Some(window_size))
            .iter()
            .map(|entry| match entry.role() {
                Role::User => HistoryMessage {
                    role: Role::User,
                    content: format!("[{}]: {}", entry.participant_name(), entry.text()),
                },
                Role::Assistant => HistoryMessage::from(entry),
            })
            .collect()
    }

    /// Timestamp of the newest entry in the window
    pub fn last_timestamp(&self, conversation_id: &str) -> Option<DateTime<Utc>> {
        self.windows
            .get(conversation_id)
            .and_then(|w| w.entries.back().map(MemoryEntry::timestamp))
    }

    /// Entries currently in the window
    pub fn count(&self, conversation_id: &str) -> usize {
        self.windows
            .get(conversation_id)
            .map_or(0, |w| w.entries.len())
    }

    /// Whether the window holds at least one entry
    pub fn exists(&self, conversation_id: &str) -> bool {
        self.count(conversation_id) > 0
    }

    /// Every conversation that has a window, including cleared ones
    pub fn conversation_ids(&self) -> Vec<String> {
        self.windows.iter().map(|w| w.key().clone()).collect()
    }

    /// Entries across all conversations
    pub fn total_entries(&self) -> usize {
        self.windows.iter().map(|w| w.entries.len()).sum()
    }

    fn filter<F>(&self, conversation_id: &str, limit: Option<usize>, predicate: F) -> Vec<MemoryEntry>
    where
        F: Fn(&MemoryEntry) -> bool,
    {
        let Some(window) = self.windows.get(conversation_id) else {
            return Vec::new();
        };

        let matches: Vec<MemoryEntry> = window
            .entries
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect();

        match limit {
            Some(l) if matches.len() > l => matches[matches.len() - l..].to_vec(),
            _ => matches,
        }
    }
}

impl Default for RecentStore {
    fn default() -> Self {
        Self::new(crate::config::MemoryConfig::DEFAULT_CAPACITY)
    }
}
