//! Hybrid retriever - one ranked context list from two independent signals
//!
//! The recency signal comes from substring matches in the [`RecentStore`],
//! scored by rank (newest match highest). The similarity signal comes from the
//! [`SemanticIndex`]. Both are weighted, concatenated (recent first), stably
//! sorted by score and truncated, so equal scores keep recent candidates ahead
//! of semantic ones.

use crate::config::RetrieverConfig;
use crate::entry::{MemoryEntry, Metadata};
use crate::error::MemoryResult;
use crate::recent::RecentStore;
use crate::semantic::{ScoredDocument, SemanticIndex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Where a retrieved snippet came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Substring match in the recent window
    Recent,
    /// Similarity match in the semantic index
    Semantic,
    /// Exact intent match
    IntentMatch,
    /// A participant's own history
    UserHistory,
}

/// A scored context snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    /// Snippet text
    pub content: String,

    /// Signal that produced it
    pub source: CandidateSource,

    /// Weighted relevance
    pub score: f32,

    /// When the underlying turn was stored
    pub timestamp: Option<DateTime<Utc>>,

    /// Participant/intent metadata of the underlying turn
    pub metadata: Metadata,
}

impl RetrievalCandidate {
    fn from_entry(entry: &MemoryEntry, source: CandidateSource, score: f32) -> Self {
        Self {
            content: entry.text().to_string(),
            source,
            score,
            timestamp: Some(entry.timestamp()),
            metadata: entry.source_metadata(),
        }
    }

    fn from_document(scored: ScoredDocument, weight: f32) -> Self {
        Self {
            content: scored.document.text,
            source: CandidateSource::Semantic,
            score: scored.score * weight,
            timestamp: scored.document.timestamp,
            metadata: scored.document.metadata,
        }
    }
}

/// Which signals a retrieval consults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signals {
    /// Use substring recency matches
    pub recent: bool,
    /// Use semantic similarity matches
    pub semantic: bool,
}

impl Default for Signals {
    fn default() -> Self {
        Self {
            recent: true,
            semantic: true,
        }
    }
}

/// Sizes and weights for a conversation's retrieval sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStats {
    /// Entries in the recent window
    pub recent_count: usize,
    /// Documents in the semantic index
    pub semantic_count: usize,
    /// Recency weight in effect
    pub recent_weight: f32,
    /// Similarity weight in effect
    pub semantic_weight: f32,
}

/// Combines recency and similarity into one ranking
pub struct HybridRetriever {
    recent: Arc<RecentStore>,
    semantic: Arc<SemanticIndex>,
    config: RetrieverConfig,
}

impl HybridRetriever {
    /// Create a retriever with default weights
    pub fn new(recent: Arc<RecentStore>, semantic: Arc<SemanticIndex>) -> Self {
        Self {
            recent,
            semantic,
            config: RetrieverConfig::default(),
        }
    }

    /// Create a retriever with validated weights and threshold
    pub fn with_config(
        recent: Arc<RecentStore>,
        semantic: Arc<SemanticIndex>,
        config: RetrieverConfig,
    ) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self {
            recent,
            semantic,
            config,
        })
    }

    /// Weights and threshold in effect
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Rank context for `query` using both signals
    pub fn retrieve(&self, conversation_id: &str, query: &str, limit: usize) -> Vec<RetrievalCandidate> {
        self.retrieve_with(conversation_id, query, limit, Signals::default())
    }

    /// Rank context for `query` using the selected signals
    pub fn retrieve_with(
        &self,
        conversation_id: &str,
        query: &str,
        limit: usize,
        signals: Signals,
    ) -> Vec<RetrievalCandidate> {
        if limit == 0 {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        if signals.recent {
            candidates.extend(self.recent_candidates(conversation_id, query, limit));
        }
        if signals.semantic {
            candidates.extend(self.semantic_candidates(conversation_id, query, limit));
        }

        let offered = candidates.len();
        candidates.retain(|c| c.score > 0.0);
        // sort_by is stable: ties keep recent candidates first
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(limit);

        debug!(
            conversation_id = %conversation_id,
            offered,
            returned = candidates.len(),
            "Retrieved hybrid context"
        );

        candidates
    }

    fn recent_candidates(
        &self,
        conversation_id: &str,
        query: &str,
        limit: usize,
    ) -> Vec<RetrievalCandidate> {
        let matches = self.recent.search(conversation_id, query, limit.saturating_mul(2));
        let total = matches.len().max(1) as f32;

        matches
            .iter()
            .enumerate()
            .take(limit)
            .map(|(rank, entry)| {
                let recency = 1.0 - rank as f32 / total;
                RetrievalCandidate::from_entry(
                    entry,
                    CandidateSource::Recent,
                    recency * self.config.recent_weight,
                )
            })
            .collect()
    }

    fn semantic_candidates(
        &self,
        conversation_id: &str,
        query: &str,
        limit: usize,
    ) -> Vec<RetrievalCandidate> {
        self.semantic
            .search(conversation_id, query, limit, self.config.semantic_threshold)
            .into_iter()
            .map(|scored| RetrievalCandidate::from_document(scored, self.config.semantic_weight))
            .collect()
    }

    /// Turns labelled with `intent`, newest first, each scored 1.0
    pub fn retrieve_by_intent(
        &self,
        conversation_id: &str,
        intent: &str,
        limit: usize,
    ) -> Vec<RetrievalCandidate> {
        self.recent
            .get_by_intent(conversation_id, intent, Some(limit))
            .iter()
            .rev()
            .map(|e| RetrievalCandidate::from_entry(e, CandidateSource::IntentMatch, 1.0))
            .collect()
    }

    /// A participant's latest turns in chronological order, each scored 1.0
    pub fn retrieve_user_context(
        &self,
        conversation_id: &str,
        participant_id: &str,
        limit: usize,
    ) -> Vec<RetrievalCandidate> {
        self.recent
            .get_by_participant(conversation_id, participant_id, Some(limit))
            .iter()
            .map(|e| RetrievalCandidate::from_entry(e, CandidateSource::UserHistory, 1.0))
            .collect()
    }

    /// Plain-text digest of the last `message_count` turns
    pub fn get_conversation_summary(&self, conversation_id: &str, message_count: usize) -> String {
        let entries = self.recent.get(conversation_id, Some(message_count));
        if entries.is_empty() {
            return "No conversation history.".to_string();
        }

        let participants: HashSet<&str> = entries.iter().map(|e| e.participant_id()).collect();
        let mut lines = vec![
            format!("Messages: {}", entries.len()),
            format!("Active participants: {}", participants.len()),
        ];

        let topics = top_intents(&entries, 3);
        if !topics.is_empty() {
            let rendered: Vec<String> = topics
                .iter()
                .map(|(intent, count)| format!("{} ({})", intent, count))
                .collect();
            lines.push(format!("Top topics: {}", rendered.join(", ")));
        }

        lines.join("\n")
    }

    /// Source sizes and weights for a conversation
    pub fn stats(&self, conversation_id: &str) -> RetrievalStats {
        RetrievalStats {
            recent_count: self.recent.count(conversation_id),
            semantic_count: self.semantic.count(conversation_id),
            recent_weight: self.config.recent_weight,
            semantic_weight: self.config.semantic_weight,
        }
    }
}

/// Most frequent intents, ties in order of first appearance
pub(crate) fn top_intents(entries: &[MemoryEntry], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for intent in entries.iter().filter_map(MemoryEntry::intent) {
        let count = counts.entry(intent).or_insert(0);
        if *count == 0 {
            order.push(intent);
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|intent| (intent.to_string(), counts[intent]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::IncomingMessage;
    use chrono::Duration;

    struct Fixture {
        recent: Arc<RecentStore>,
        semantic: Arc<SemanticIndex>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                recent: Arc::new(RecentStore::new(50)),
                semantic: Arc::new(SemanticIndex::new()),
            }
        }

        fn store(&self, message: IncomingMessage, offset: i64) {
            let ts = Utc::now() + Duration::milliseconds(offset);
            let entry = MemoryEntry::new("g1", message, ts);
            self.semantic.add_entry("g1", &entry);
            self.recent.add("g1", entry);
        }

        fn retriever(&self, recent_weight: f32, semantic_weight: f32) -> HybridRetriever {
            let config = RetrieverConfig {
                recent_weight,
                semantic_weight,
                ..RetrieverConfig::default()
            };
            HybridRetriever::with_config(self.recent.clone(), self.semantic.clone(), config).unwrap()
        }
    }

    fn saldo_fixture() -> Fixture {
        let fixture = Fixture::new();
        fixture.store(IncomingMessage::user("1", "Budi", "saldo berapa sekarang"), 0);
        fixture.store(IncomingMessage::user("2", "Sari", "tambah transaksi seratus ribu"), 1);
        fixture.store(IncomingMessage::user("1", "Budi", "berapa saldo kita"), 2);
        fixture
    }

    #[test]
    fn test_hybrid_ranking() {
        let fixture = saldo_fixture();
        let results = fixture.retriever(0.4, 0.6).retrieve("g1", "saldo", 2);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "berapa saldo kita");
        assert_eq!(results[0].source, CandidateSource::Recent);
        assert!((results[0].score - 0.4).abs() < 1e-6);

        assert_eq!(results[1].content, "saldo berapa sekarang");
        assert_eq!(results[1].source, CandidateSource::Semantic);
        assert!((results[1].score - 0.6 / 3f32.sqrt()).abs() < 1e-5);

        assert!(results[0].score > results[1].score);
        assert!(results.iter().all(|r| !r.content.contains("tambah")));
    }

    #[test]
    fn test_recency_only_matches_substring_ranking() {
        let fixture = saldo_fixture();
        let results = fixture.retriever(1.0, 0.0).retrieve("g1", "saldo", 5);

        let expected: Vec<String> = fixture
            .recent
            .search("g1", "saldo", 10)
            .iter()
            .map(|e| e.text().to_string())
            .collect();
        let got: Vec<String> = results.iter().map(|r| r.content.clone()).collect();

        assert_eq!(got, expected);
        assert!(results.iter().all(|r| r.source == CandidateSource::Recent));
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.5);
    }

    #[test]
    fn test_similarity_only_matches_semantic_ranking() {
        let fixture = saldo_fixture();
        let results = fixture.retriever(0.0, 1.0).retrieve("g1", "saldo kita", 5);

        let expected: Vec<(String, f32)> = fixture
            .semantic
            .search("g1", "saldo kita", 5, 0.1)
            .into_iter()
            .map(|s| (s.document.text, s.score))
            .collect();
        let got: Vec<(String, f32)> = results.into_iter().map(|r| (r.content, r.score)).collect();

        assert_eq!(got, expected);
    }

    #[test]
    fn test_signals_can_be_disabled() {
        let fixture = saldo_fixture();
        let retriever = fixture.retriever(0.4, 0.6);

        let recent_only = retriever.retrieve_with(
            "g1",
            "saldo",
            5,
            Signals {
                recent: true,
                semantic: false,
            },
        );
        assert!(recent_only.iter().all(|r| r.source == CandidateSource::Recent));

        let none = retriever.retrieve_with(
            "g1",
            "saldo",
            5,
            Signals {
                recent: false,
                semantic: false,
            },
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_ties_keep_recent_first() {
        let fixture = Fixture::new();
        fixture.store(IncomingMessage::user("1", "Budi", "kas"), 0);

        // Recency 1.0 * 0.5 and similarity 1.0 * 0.5
        let results = fixture.retriever(0.5, 0.5).retrieve("g1", "kas", 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, results[1].score);
        assert_eq!(results[0].source, CandidateSource::Recent);
        assert_eq!(results[1].source, CandidateSource::Semantic);
    }

    #[test]
    fn test_unknown_conversation_and_zero_limit() {
        let fixture = saldo_fixture();
        let retriever = fixture.retriever(0.4, 0.6);
        assert!(retriever.retrieve("nope", "saldo", 5).is_empty());
        assert!(retriever.retrieve("g1", "saldo", 0).is_empty());
        assert_eq!(
            retriever.get_conversation_summary("nope", 20),
            "No conversation history."
        );
    }

    #[test]
    fn test_unbounded_limit() {
        let fixture = saldo_fixture();
        let results = fixture.retriever(0.4, 0.6).retrieve("g1", "saldo", usize::MAX);
        assert_eq!(results.len(), 4);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let fixture = Fixture::new();
        let config = RetrieverConfig {
            recent_weight: 1.2,
            ..RetrieverConfig::default()
        };
        let result = HybridRetriever::with_config(fixture.recent.clone(), fixture.semantic.clone(), config);
        assert!(result.is_err());
    }

    #[test]
    fn test_retrieve_by_intent_is_newest_first() {
        let fixture = Fixture::new();
        fixture.store(IncomingMessage::user("1", "Budi", "cek saldo").with_intent("check_balance"), 0);
        fixture.store(IncomingMessage::user("1", "Budi", "beli kopi").with_intent("expense"), 1);
        fixture.store(IncomingMessage::user("2", "Sari", "saldo?").with_intent("check_balance"), 2);

        let retriever = fixture.retriever(0.4, 0.6);
        let results = retriever.retrieve_by_intent("g1", "check_balance", 5);
        let texts: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();

        assert_eq!(texts, vec!["saldo?", "cek saldo"]);
        assert!(results.iter().all(|r| r.score == 1.0 && r.source == CandidateSource::IntentMatch));
        assert_eq!(results[0].metadata["intent"], "check_balance");
    }

    #[test]
    fn test_retrieve_user_context() {
        let fixture = saldo_fixture();
        let results = fixture.retriever(0.4, 0.6).retrieve_user_context("g1", "1", 5);
        let texts: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();

        assert_eq!(texts, vec!["saldo berapa sekarang", "berapa saldo kita"]);
        assert!(results.iter().all(|r| r.source == CandidateSource::UserHistory));
    }

    #[test]
    fn test_conversation_summary() {
        let fixture = Fixture::new();
        fixture.store(IncomingMessage::user("1", "Budi", "a1").with_intent("expense"), 0);
        fixture.store(IncomingMessage::user("2", "Sari", "a2").with_intent("income"), 1);
        fixture.store(IncomingMessage::user("1", "Budi", "a3").with_intent("expense"), 2);
        fixture.store(IncomingMessage::user("3", "Dewi", "a4"), 3);

        let summary = fixture.retriever(0.4, 0.6).get_conversation_summary("g1", 20);
        assert_eq!(
            summary,
            "Messages: 4\nActive participants: 3\nTop topics: expense (2), income (1)"
        );
    }

    #[test]
    fn test_stats() {
        let fixture = saldo_fixture();
        let stats = fixture.retriever(0.3, 0.7).stats("g1");
        assert_eq!(stats.recent_count, 3);
        assert_eq!(stats.semantic_count, 3);
        assert_eq!(stats.recent_weight, 0.3);
        assert_eq!(stats.semantic_weight, 0.7);
    }

    #[test]
    fn test_top_intents_ties_keep_first_appearance() {
        let now = Utc::now();
        let entries: Vec<MemoryEntry> = ["b", "a", "b", "a", "c"]
            .iter()
            .map(|i| MemoryEntry::new("g1", IncomingMessage::user("1", "A", "x").with_intent(*i), now))
            .collect();

        assert_eq!(
            top_intents(&entries, 2),
            vec![("b".to_string(), 2), ("a".to_string(), 2)]
        );
    }
}
