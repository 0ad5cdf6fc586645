//! Conversation memory manager
//!
//! The single entry point the context builder talks to. It owns the
//! [`RecentStore`], the [`SemanticIndex`] and the [`HybridRetriever`] built on
//! top of them, and applies the cross-store policies:
//!
//! - which turns are indexed ([`IndexPolicy`])
//! - evicted entries leave the semantic index in the same step
//! - whether clears reach the semantic index ([`ClearPolicy`])
//!
//! Every conversation has its own `RwLock` gate. Stores, clears and imports
//! hold the write half while both stores are updated; reads hold the read half,
//! so a reader never sees a turn in one store and not the other. Different
//! conversations never contend on a gate.

use crate::config::{ClearPolicy, IndexPolicy, MemoryConfig};
use crate::entry::{HistoryMessage, IncomingMessage, MemoryEntry, Role};
use crate::error::{MemoryError, MemoryResult};
use crate::events::{MemoryEvent, MemoryEventBus, MemoryEventKind};
use crate::recent::RecentStore;
use crate::retriever::{top_intents, HybridRetriever, RetrievalCandidate};
use crate::semantic::SemanticIndex;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Turns returned in [`UserContext::recent_messages`]
const USER_RECENT_MESSAGES: usize = 5;
/// Intents returned in [`UserContext::common_intents`]
const USER_COMMON_INTENTS: usize = 5;
/// Intent-bearing turns considered for [`ContextSummary::recent_topics`]
const RECENT_TOPIC_WINDOW: usize = 10;

/// Per-participant rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    /// Participant the rollup describes
    pub participant_id: String,
    /// Turns by this participant in the window
    pub message_count: usize,
    /// Their latest turns, oldest first
    pub recent_messages: Vec<MemoryEntry>,
    /// Their most frequent intents, most frequent first
    pub common_intents: Vec<String>,
}

/// Conversation-level rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Entries in the window
    pub total_messages: usize,
    /// Distinct participants in the window
    pub unique_participants: usize,
    /// Distinct recent intents, most recent first
    pub recent_topics: Vec<String>,
    /// Timestamp of the newest entry
    pub last_activity: Option<DateTime<Utc>>,
}

impl ContextSummary {
    /// Summary of a conversation with no entries
    pub fn no_history() -> Self {
        Self {
            total_messages: 0,
            unique_participants: 0,
            recent_topics: Vec::new(),
            last_activity: None,
        }
    }

    /// Whether the summary describes an empty conversation
    pub fn is_empty(&self) -> bool {
        self.total_messages == 0
    }
}

/// Memory statistics for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Entries in the recent window
    pub total_entries: usize,
    /// Timestamp of the oldest entry
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Timestamp of the newest entry
    pub newest_entry: Option<DateTime<Utc>>,
    /// Approximate bytes held by the window
    pub memory_usage_estimate: usize,
    /// Documents in the semantic index
    pub semantic_documents: usize,
}

/// Mutation gate for one conversation
#[derive(Debug, Default)]
struct ConversationGate {
    last_timestamp: Option<DateTime<Utc>>,
}

impl ConversationGate {
    /// Never earlier than the previous stamp, so windows stay ordered
    fn next_timestamp(&mut self, candidate: DateTime<Utc>) -> DateTime<Utc> {
        let timestamp = match self.last_timestamp {
            Some(last) if last > candidate => last,
            _ => candidate,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}

/// Conversational memory for every conversation the assistant takes part in
pub struct ConversationMemoryManager {
    config: MemoryConfig,
    recent: Arc<RecentStore>,
    semantic: Arc<SemanticIndex>,
    retriever: HybridRetriever,
    gates: DashMap<String, Arc<RwLock<ConversationGate>>>,
    events: Option<Arc<MemoryEventBus>>,
}

impl ConversationMemoryManager {
    /// Create a manager; fails if the configuration is invalid
    pub fn new(config: MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;

        let recent = Arc::new(RecentStore::new(config.capacity));
        let semantic = Arc::new(SemanticIndex::new());
        let retriever =
            HybridRetriever::with_config(Arc::clone(&recent), Arc::clone(&semantic), config.retriever())?;

        info!(
            capacity = config.capacity,
            context_window = config.context_window,
            recent_weight = config.recent_weight,
            semantic_weight = config.semantic_weight,
            "Conversation memory initialized"
        );

        Ok(Self {
            config,
            recent,
            semantic,
            retriever,
            gates: DashMap::new(),
            events: None,
        })
    }

    /// Publish lifecycle events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<MemoryEventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Configuration in effect
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Retriever for intent and participant lookups
    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    fn gate(&self, conversation_id: &str) -> Arc<RwLock<ConversationGate>> {
        Arc::clone(self.gates.entry(conversation_id.to_string()).or_default().value())
    }

    fn existing_gate(&self, conversation_id: &str) -> Option<Arc<RwLock<ConversationGate>>> {
        self.gates.get(conversation_id).map(|gate| Arc::clone(gate.value()))
    }

    /// Run `f` while holding the conversation's read gate
    ///
    /// Gates are created before the first write, so a missing gate means the
    /// conversation was absent when the read started.
    async fn read<T: Default>(&self, conversation_id: &str, f: impl FnOnce() -> T) -> T {
        let Some(gate) = self.existing_gate(conversation_id) else {
            return T::default();
        };
        let _guard = gate.read().await;
        f()
    }

    /// `None` and `Some(0)` both mean the configured context window
    fn window_limit(&self, limit: Option<usize>) -> usize {
        limit
            .filter(|&l| l > 0)
            .unwrap_or(self.config.context_window)
    }

    fn should_index(&self, entry: &MemoryEntry) -> bool {
        match self.config.index_policy {
            IndexPolicy::UserOnly => entry.role() == Role::User,
            IndexPolicy::All => true,
        }
    }

    /// Add to both stores; caller holds the write gate
    fn insert(&self, conversation_id: &str, entry: MemoryEntry) -> Option<MemoryEntry> {
        if self.should_index(&entry) {
            self.semantic.add_entry(conversation_id, &entry);
        }

        let evicted = self.recent.add(conversation_id, entry);
        if let Some(old) = &evicted {
            self.semantic.remove_entry(conversation_id, old.id());
        }
        evicted
    }

    fn publish(&self, conversation_id: &str, kind: MemoryEventKind) {
        if let Some(bus) = &self.events {
            bus.publish(MemoryEvent::new(conversation_id, kind));
        }
    }

    /// Record a turn; always succeeds
    pub async fn store_message(&self, conversation_id: &str, message: IncomingMessage) -> MemoryEntry {
        let gate = self.gate(conversation_id);
        let mut state = gate.write().await;

        let timestamp = state.next_timestamp(Utc::now());
        let entry = MemoryEntry::new(conversation_id, message, timestamp);
        let evicted = self.insert(conversation_id, entry.clone());
        drop(state);

        debug!(
            conversation_id = %conversation_id,
            entry_id = %entry.id(),
            role = %entry.role(),
            evicted = evicted.is_some(),
            "Stored message in memory"
        );

        self.publish(
            conversation_id,
            MemoryEventKind::MessageStored {
                entry_id: entry.id().to_string(),
                evicted: evicted.map(|e| e.id().to_string()),
            },
        );

        entry
    }

    /// Role/content pairs oldest-first; defaults to the configured context window
    /// when `limit` is `None` or zero
    pub async fn get_conversation_history(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Vec<HistoryMessage> {
        let limit = self.window_limit(limit);
        self.read(conversation_id, || {
            self.recent
                .get(conversation_id, Some(limit))
                .iter()
                .map(HistoryMessage::from)
                .collect()
        })
        .await
    }

    /// Like [`get_conversation_history`](Self::get_conversation_history) with
    /// participant turns prefixed by their display name
    pub async fn get_formatted_history(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Vec<HistoryMessage> {
        let limit = self.window_limit(limit);
        self.read(conversation_id, || {
            self.recent.conversation_window(conversation_id, limit)
        })
        .await
    }

    /// Hybrid-ranked context for a query
    pub async fn get_relevant_context(
        &self,
        conversation_id: &str,
        query: &str,
        limit: usize,
    ) -> Vec<RetrievalCandidate> {
        self.read(conversation_id, || {
            self.retriever.retrieve(conversation_id, query, limit)
        })
        .await
    }

    /// Rollup of one participant's turns
    pub async fn get_user_context(&self, conversation_id: &str, participant_id: &str) -> UserContext {
        let entries = self
            .read(conversation_id, || {
                self.recent.get_by_participant(conversation_id, participant_id, None)
            })
            .await;

        let common_intents = top_intents(&entries, USER_COMMON_INTENTS)
            .into_iter()
            .map(|(intent, _)| intent)
            .collect();
        let skip = entries.len().saturating_sub(USER_RECENT_MESSAGES);

        UserContext {
            participant_id: participant_id.to_string(),
            message_count: entries.len(),
            recent_messages: entries[skip..].to_vec(),
            common_intents,
        }
    }

    /// Conversation rollup; [`ContextSummary::no_history`] when empty
    pub async fn summarize_context(&self, conversation_id: &str) -> ContextSummary {
        let entries = self
            .read(conversation_id, || self.recent.get(conversation_id, None))
            .await;

        let Some(last) = entries.last() else {
            return ContextSummary::no_history();
        };

        let participants: HashSet<&str> = entries.iter().map(|e| e.participant_id()).collect();

        let mut recent_topics: Vec<String> = Vec::new();
        for intent in entries
            .iter()
            .rev()
            .filter_map(MemoryEntry::intent)
            .take(RECENT_TOPIC_WINDOW)
        {
            if !recent_topics.iter().any(|t| t == intent) {
                recent_topics.push(intent.to_string());
            }
        }

        ContextSummary {
            total_messages: entries.len(),
            unique_participants: participants.len(),
            recent_topics,
            last_activity: Some(last.timestamp()),
        }
    }

    /// Remove every entry, or only those stamped at or before `older_than`;
    /// returns the number of entries removed from the window
    pub async fn clear_memory(
        &self,
        conversation_id: &str,
        older_than: Option<DateTime<Utc>>,
    ) -> usize {
        let Some(gate) = self.existing_gate(conversation_id) else {
            return 0;
        };
        let state = gate.write().await;

        let (cleared, semantic_cleared) = match older_than {
            None => {
                let cleared = self.recent.clear(conversation_id);
                let semantic_cleared = match self.config.clear_policy {
                    ClearPolicy::WithRecent => self.semantic.clear(conversation_id),
                    ClearPolicy::Explicit => 0,
                };
                (cleared, semantic_cleared)
            }
            Some(cutoff) => {
                let removed = self.recent.retain_newer_than(conversation_id, cutoff);
                let semantic_cleared = match self.config.clear_policy {
                    ClearPolicy::WithRecent if !removed.is_empty() => {
                        let ids: HashSet<&str> = removed.iter().map(MemoryEntry::id).collect();
                        self.semantic.retain(conversation_id, |doc| {
                            doc.entry_id.as_deref().map_or(true, |id| !ids.contains(id))
                        })
                    }
                    _ => 0,
                };
                (removed.len(), semantic_cleared)
            }
        };
        drop(state);

        info!(
            conversation_id = %conversation_id,
            cleared,
            semantic_cleared,
            partial = older_than.is_some(),
            "Cleared conversation memory"
        );

        if cleared > 0 || semantic_cleared > 0 {
            self.publish(
                conversation_id,
                MemoryEventKind::MemoryCleared {
                    cleared,
                    semantic_cleared,
                },
            );
        }

        cleared
    }

    /// Drop every semantic document of a conversation, leaving the window intact
    pub async fn clear_semantic_index(&self, conversation_id: &str) -> usize {
        let Some(gate) = self.existing_gate(conversation_id) else {
            return 0;
        };
        let semantic_cleared = {
            let _state = gate.write().await;
            self.semantic.clear(conversation_id)
        };

        info!(conversation_id = %conversation_id, semantic_cleared, "Cleared semantic index");

        if semantic_cleared > 0 {
            self.publish(
                conversation_id,
                MemoryEventKind::MemoryCleared {
                    cleared: 0,
                    semantic_cleared,
                },
            );
        }

        semantic_cleared
    }

    /// Every entry in the window, oldest first
    pub async fn export_memory(&self, conversation_id: &str) -> Vec<MemoryEntry> {
        self.read(conversation_id, || self.recent.get(conversation_id, None))
            .await
    }

    /// Append a batch of entries to a conversation
    ///
    /// Entries are re-homed to `conversation_id` and only the newest
    /// `capacity` of the batch are kept. Timestamps earlier than the newest
    /// stored entry are raised to it so the window stays ordered. Returns the
    /// number of entries offered.
    pub async fn import_memory(&self, conversation_id: &str, entries: Vec<MemoryEntry>) -> usize {
        let offered = entries.len();
        if offered == 0 {
            return 0;
        }

        let skip = offered.saturating_sub(self.config.capacity);
        let mut foreign = 0;

        {
            let gate = self.gate(conversation_id);
            let mut state = gate.write().await;

            for entry in entries.into_iter().skip(skip) {
                if entry.conversation_id() != conversation_id {
                    foreign += 1;
                }
                let timestamp = state.next_timestamp(entry.timestamp());
                self.insert(conversation_id, entry.rehome(conversation_id, timestamp));
            }
        }

        if foreign > 0 {
            warn!(
                conversation_id = %conversation_id,
                foreign,
                "Imported entries recorded under another conversation"
            );
        }
        info!(
            conversation_id = %conversation_id,
            offered,
            dropped = skip,
            "Imported conversation memory"
        );

        self.publish(
            conversation_id,
            MemoryEventKind::MemoryImported { imported: offered },
        );

        offered
    }

    /// [`export_memory`](Self::export_memory) as a JSON array
    pub async fn export_snapshot(&self, conversation_id: &str) -> MemoryResult<String> {
        let entries = self.export_memory(conversation_id).await;
        serde_json::to_string(&entries).map_err(|e| MemoryError::serialization("export_snapshot", e))
    }

    /// [`import_memory`](Self::import_memory) from a JSON array
    pub async fn import_snapshot(&self, conversation_id: &str, json: &str) -> MemoryResult<usize> {
        let entries: Vec<MemoryEntry> =
            serde_json::from_str(json).map_err(|e| MemoryError::serialization("import_snapshot", e))?;
        Ok(self.import_memory(conversation_id, entries).await)
    }

    /// Size and age of a conversation's memory
    pub async fn get_memory_stats(&self, conversation_id: &str) -> MemoryStats {
        let (entries, semantic_documents) = self
            .read(conversation_id, || {
                (
                    self.recent.get(conversation_id, None),
                    self.semantic.count(conversation_id),
                )
            })
            .await;

        MemoryStats {
            total_entries: entries.len(),
            oldest_entry: entries.first().map(MemoryEntry::timestamp),
            newest_entry: entries.last().map(MemoryEntry::timestamp),
            memory_usage_estimate: entries.iter().map(MemoryEntry::estimated_size).sum(),
            semantic_documents,
        }
    }

    /// Tokens appearing in the most indexed turns
    pub async fn get_keywords(&self, conversation_id: &str, limit: usize) -> Vec<(String, usize)> {
        self.read(conversation_id, || {
            self.semantic.get_keywords(conversation_id, limit)
        })
        .await
    }

    /// Whether the conversation currently holds any entry
    pub fn has_memory(&self, conversation_id: &str) -> bool {
        self.recent.exists(conversation_id)
    }

    /// Conversations that were ever stored to
    pub fn conversation_ids(&self) -> Vec<String> {
        self.recent.conversation_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::CandidateSource;
    use chrono::Duration;

    fn manager(config: MemoryConfig) -> ConversationMemoryManager {
        ConversationMemoryManager::new(config).unwrap()
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        assert!(ConversationMemoryManager::new(MemoryConfig::new().with_capacity(0)).is_err());
        assert!(ConversationMemoryManager::new(MemoryConfig::new().with_weights(0.5, 1.5)).is_err());
    }

    #[tokio::test]
    async fn test_store_and_history() {
        let memory = manager(MemoryConfig::new().with_context_window(2));
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "satu")).await;
        memory.store_message("g1", IncomingMessage::assistant("Kenang", "dua")).await;
        memory.store_message("g1", IncomingMessage::user("2", "Sari", "tiga")).await;

        let history = memory.get_conversation_history("g1", None).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[0].content, "dua");
        assert_eq!(history[1].content, "tiga");

        let full = memory.get_conversation_history("g1", Some(10)).await;
        assert_eq!(full.len(), 3);

        let formatted = memory.get_formatted_history("g1", Some(10)).await;
        assert_eq!(formatted[0].content, "[Budi]: satu");
        assert_eq!(formatted[1].content, "dua");
    }

    #[tokio::test]
    async fn test_timestamps_never_decrease() {
        let memory = manager(MemoryConfig::default());
        for i in 0..20 {
            memory
                .store_message("g1", IncomingMessage::user("1", "Budi", format!("pesan {}", i)))
                .await;
        }

        let entries = memory.export_memory("g1").await;
        assert!(entries.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    }

    #[tokio::test]
    async fn test_index_policy() {
        let user_only = manager(MemoryConfig::default());
        user_only.store_message("g1", IncomingMessage::user("1", "Budi", "saldo")).await;
        user_only.store_message("g1", IncomingMessage::assistant("Kenang", "saldo 100")).await;
        assert_eq!(user_only.get_memory_stats("g1").await.semantic_documents, 1);

        let all = manager(MemoryConfig::new().with_index_policy(IndexPolicy::All));
        all.store_message("g1", IncomingMessage::user("1", "Budi", "saldo")).await;
        all.store_message("g1", IncomingMessage::assistant("Kenang", "saldo 100")).await;
        assert_eq!(all.get_memory_stats("g1").await.semantic_documents, 2);
    }

    #[tokio::test]
    async fn test_eviction_removes_semantic_document() {
        let memory = manager(MemoryConfig::new().with_capacity(2));
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "kopi pagi")).await;
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "teh siang")).await;
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "jus malam")).await;

        let stats = memory.get_memory_stats("g1").await;
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.semantic_documents, 2);

        let context = memory.get_relevant_context("g1", "kopi", 5).await;
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_user_context() {
        let memory = manager(MemoryConfig::default());
        for i in 0..7 {
            let intent = if i % 3 == 0 { "income" } else { "expense" };
            memory
                .store_message(
                    "g1",
                    IncomingMessage::user("1", "Budi", format!("catat {}", i)).with_intent(intent),
                )
                .await;
        }
        memory.store_message("g1", IncomingMessage::user("2", "Sari", "halo")).await;

        let context = memory.get_user_context("g1", "1").await;
        assert_eq!(context.message_count, 7);
        assert_eq!(context.recent_messages.len(), 5);
        assert_eq!(context.recent_messages[0].text(), "catat 2");
        assert_eq!(context.recent_messages[4].text(), "catat 6");
        assert_eq!(context.common_intents, vec!["expense", "income"]);

        let nobody = memory.get_user_context("g1", "99").await;
        assert_eq!(nobody.message_count, 0);
        assert!(nobody.recent_messages.is_empty());
        assert!(nobody.common_intents.is_empty());
    }

    #[tokio::test]
    async fn test_summarize_context() {
        let memory = manager(MemoryConfig::default());
        assert_eq!(memory.summarize_context("g1").await, ContextSummary::no_history());

        memory
            .store_message("g1", IncomingMessage::user("1", "Budi", "a").with_intent("income"))
            .await;
        memory
            .store_message("g1", IncomingMessage::user("2", "Sari", "b").with_intent("expense"))
            .await;
        memory
            .store_message("g1", IncomingMessage::user("1", "Budi", "c").with_intent("income"))
            .await;
        let last = memory
            .store_message("g1", IncomingMessage::assistant("Kenang", "d"))
            .await;

        let summary = memory.summarize_context("g1").await;
        assert_eq!(summary.total_messages, 4);
        assert_eq!(summary.unique_participants, 3);
        assert_eq!(summary.recent_topics, vec!["income", "expense"]);
        assert_eq!(summary.last_activity, Some(last.timestamp()));
        assert!(!summary.is_empty());
    }

    #[tokio::test]
    async fn test_clear_with_recent_policy() {
        let memory = manager(MemoryConfig::default());
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "saldo")).await;
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "saldo lagi")).await;

        assert_eq!(memory.clear_memory("g1", None).await, 2);
        assert_eq!(memory.clear_memory("g1", None).await, 0);
        assert!(!memory.has_memory("g1"));
        assert_eq!(memory.get_memory_stats("g1").await.semantic_documents, 0);
        assert!(memory.get_relevant_context("g1", "saldo", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_explicit_policy_keeps_documents() {
        let memory = manager(MemoryConfig::new().with_clear_policy(ClearPolicy::Explicit));
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "saldo kas")).await;

        assert_eq!(memory.clear_memory("g1", None).await, 1);
        let context = memory.get_relevant_context("g1", "saldo", 5).await;
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content, "saldo kas");

        assert_eq!(memory.clear_semantic_index("g1").await, 1);
        assert!(memory.get_relevant_context("g1", "saldo", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_partial_clear() {
        let memory = manager(MemoryConfig::default());
        let first = memory.store_message("g1", IncomingMessage::user("1", "Budi", "lama sekali")).await;
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "baru saja")).await;

        let cleared = memory.clear_memory("g1", Some(first.timestamp())).await;
        let remaining = memory.export_memory("g1").await;

        // Equal timestamps are possible, so at least the first entry goes
        assert!(cleared >= 1);
        assert!(remaining.iter().all(|e| e.timestamp() > first.timestamp()));
        let stats = memory.get_memory_stats("g1").await;
        assert_eq!(stats.semantic_documents, stats.total_entries);
        assert!(memory.get_keywords("g1", 10).await.iter().all(|(k, _)| k != "lama"));
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_total() {
        let memory = manager(MemoryConfig::default());
        assert!(memory.get_conversation_history("nope", None).await.is_empty());
        assert!(memory.get_relevant_context("nope", "x", 5).await.is_empty());
        assert!(memory.summarize_context("nope").await.is_empty());
        assert_eq!(memory.clear_memory("nope", None).await, 0);
        assert_eq!(memory.clear_semantic_index("nope").await, 0);
        assert!(memory.export_memory("nope").await.is_empty());

        let stats = memory.get_memory_stats("nope").await;
        assert_eq!(stats.total_entries, 0);
        assert!(stats.oldest_entry.is_none());
        assert_eq!(stats.memory_usage_estimate, 0);
        assert!(memory.conversation_ids().is_empty());
    }

    #[tokio::test]
    async fn test_import_rehomes_and_clamps() {
        let memory = manager(MemoryConfig::default());
        let latest = memory.store_message("g2", IncomingMessage::user("1", "Budi", "sekarang")).await;

        let old = Utc::now() - Duration::days(1);
        let entries = vec![
            MemoryEntry::new("g1", IncomingMessage::user("2", "Sari", "kemarin"), old),
        ];
        assert_eq!(memory.import_memory("g2", entries).await, 1);

        let exported = memory.export_memory("g2").await;
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[1].conversation_id(), "g2");
        assert_eq!(exported[1].timestamp(), latest.timestamp());
        assert_eq!(memory.get_memory_stats("g2").await.semantic_documents, 2);
    }

    #[tokio::test]
    async fn test_reimport_into_same_conversation_stays_indexed() {
        let memory = manager(MemoryConfig::new().with_capacity(3));
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "kopi pagi")).await;

        let exported = memory.export_memory("g1").await;
        memory.import_memory("g1", exported).await;
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "teh siang")).await;
        memory.store_message("g1", IncomingMessage::user("1", "Budi", "jus malam")).await;

        let entries = memory.export_memory("g1").await;
        let texts: Vec<&str> = entries.iter().map(MemoryEntry::text).collect();
        assert_eq!(texts, vec!["kopi pagi", "teh siang", "jus malam"]);
        assert_ne!(entries[0].id(), entries[1].id());

        let stats = memory.get_memory_stats("g1").await;
        assert_eq!(stats.semantic_documents, stats.total_entries);

        let context = memory.get_relevant_context("g1", "kopi pagi", 5).await;
        assert!(context.iter().any(|c| c.source == CandidateSource::Semantic));
    }

    #[tokio::test]
    async fn test_zero_limit_uses_context_window() {
        let memory = manager(MemoryConfig::new().with_context_window(2));
        for text in ["satu", "dua", "tiga"] {
            memory.store_message("g1", IncomingMessage::user("1", "Budi", text)).await;
        }

        assert_eq!(memory.get_conversation_history("g1", Some(0)).await.len(), 2);
        assert_eq!(memory.get_formatted_history("g1", Some(0)).await.len(), 2);
        assert_eq!(memory.get_relevant_context("g1", "tiga", usize::MAX).await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_see_half_stored_turns() {
        let memory = Arc::new(manager(MemoryConfig::new().with_capacity(5)));

        let writer = {
            let memory = Arc::clone(&memory);
            tokio::spawn(async move {
                for i in 0..200 {
                    let conversation = format!("g{}", i % 10);
                    memory
                        .store_message(&conversation, IncomingMessage::user("1", "Budi", format!("kas {}", i)))
                        .await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let memory = Arc::clone(&memory);
            readers.push(tokio::spawn(async move {
                for i in 0..500 {
                    let conversation = format!("g{}", i % 10);
                    let stats = memory.get_memory_stats(&conversation).await;
                    assert_eq!(stats.semantic_documents, stats.total_entries);
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let source = manager(MemoryConfig::default());
        source.store_message("g1", IncomingMessage::user("1", "Budi", "saldo")).await;
        source
            .store_message("g1", IncomingMessage::assistant("Kenang", "Saldo 100 ribu"))
            .await;
        let snapshot = source.export_snapshot("g1").await.unwrap();

        let target = manager(MemoryConfig::default());
        assert_eq!(target.import_snapshot("g1", &snapshot).await.unwrap(), 2);

        let restored = target.export_memory("g1").await;
        let original = source.export_memory("g1").await;
        assert_eq!(restored.len(), original.len());
        for (restored, original) in restored.iter().zip(&original) {
            assert_eq!(restored.text(), original.text());
            assert_eq!(restored.role(), original.role());
            assert_eq!(restored.participant_id(), original.participant_id());
            assert_eq!(restored.timestamp(), original.timestamp());
        }

        let err = target.import_snapshot("g1", "{not json").await.unwrap_err();
        assert!(!err.is_validation());
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let bus = Arc::new(MemoryEventBus::default());
        let mut events = bus.subscribe();
        let memory = manager(MemoryConfig::new().with_capacity(1)).with_event_bus(Arc::clone(&bus));

        let first = memory.store_message("g1", IncomingMessage::user("1", "Budi", "a")).await;
        let second = memory.store_message("g1", IncomingMessage::user("1", "Budi", "b")).await;
        memory.clear_memory("g1", None).await;

        let event = events.recv().await.unwrap();
        assert_eq!(
            event.kind,
            MemoryEventKind::MessageStored {
                entry_id: first.id().to_string(),
                evicted: None
            }
        );

        let event = events.recv().await.unwrap();
        assert_eq!(
            event.kind,
            MemoryEventKind::MessageStored {
                entry_id: second.id().to_string(),
                evicted: Some(first.id().to_string())
            }
        );

        let event = events.recv().await.unwrap();
        assert_eq!(event.conversation_id, "g1");
        assert_eq!(
            event.kind,
            MemoryEventKind::MemoryCleared {
                cleared: 1,
                semantic_cleared: 1
            }
        );
    }
}
