//! Approximate semantic index - term-frequency recall without an embedding service
//!
//! Every conversation keeps its own document collection and token table.
//! Documents are vectorized once at insertion ([`SparseVector::from_tokens`])
//! and queries are vectorized with the same tokenizer, then ranked by cosine
//! similarity. No inverse-document-frequency weighting is applied.
//!
//! ```rust
//! use kenang_memory::semantic::SemanticIndex;
//!
//! let index = SemanticIndex::new();
//! index.add("g1", "saldo berapa sekarang", None, None);
//! index.add("g1", "tambah transaksi seratus ribu", None, None);
//!
//! let hits = index.search("g1", "saldo", 5, 0.1);
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].document.text, "saldo berapa sekarang");
//! ```

pub mod tokenizer;
pub mod vector;

pub use tokenizer::{tokenize, STOP_WORDS};
pub use vector::SparseVector;

use crate::entry::{MemoryEntry, Metadata};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Default similarity floor for [`SemanticIndex::search`]
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// A text vectorized for similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticDocument {
    /// Deterministic identifier derived from the text
    pub id: String,

    /// Indexed text
    pub text: String,

    /// Normalized term-frequency vector
    pub vector: SparseVector,

    /// Tokens the vector was built from
    pub tokens: Vec<String>,

    /// Recent-store entry this document was derived from
    pub entry_id: Option<String>,

    /// Source metadata (participant, intent, caller data)
    pub metadata: Metadata,

    /// When the source turn was stored
    pub timestamp: Option<DateTime<Utc>>,
}

/// A document paired with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// The matching document
    pub document: SemanticDocument,

    /// Cosine similarity in [0, 1]
    pub score: f32,
}

#[derive(Debug, Default)]
struct ConversationIndex {
    documents: Vec<SemanticDocument>,
    /// Number of documents containing each token
    token_frequencies: HashMap<String, usize>,
}

impl ConversationIndex {
    fn insert(&mut self, document: SemanticDocument) {
        for token in unique_tokens(&document.tokens) {
            *self.token_frequencies.entry(token.to_string()).or_insert(0) += 1;
        }
        self.documents.push(document);
    }

    fn forget_tokens(&mut self, document: &SemanticDocument) {
        for token in unique_tokens(&document.tokens) {
            if let Some(count) = self.token_frequencies.get_mut(token) {
                *count -= 1;
                if *count == 0 {
                    self.token_frequencies.remove(token);
                }
            }
        }
    }

    fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&SemanticDocument) -> bool,
    {
        let (kept, removed): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.documents).into_iter().partition(|d| keep(d));
        self.documents = kept;
        for document in &removed {
            self.forget_tokens(document);
        }
        removed.len()
    }
}

/// Per-conversation term-frequency index
pub struct SemanticIndex {
    conversations: DashMap<String, ConversationIndex>,
}

impl SemanticIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
        }
    }

    /// Deterministic document identifier: same text, same id
    pub fn document_id(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Index a text; duplicates are stored again under the same id
    pub fn add(
        &self,
        conversation_id: &str,
        text: &str,
        metadata: Option<Metadata>,
        timestamp: Option<DateTime<Utc>>,
    ) -> String {
        self.insert(conversation_id, text, None, metadata.unwrap_or_default(), timestamp)
    }

    /// Index a stored turn, linking the document to its entry
    pub fn add_entry(&self, conversation_id: &str, entry: &MemoryEntry) -> String {
        let mut metadata = entry.metadata().clone();
        metadata.extend(entry.source_metadata());

        self.insert(
            conversation_id,
            entry.text(),
            Some(entry.id().to_string()),
            metadata,
            Some(entry.timestamp()),
        )
    }

    fn insert(
        &self,
        conversation_id: &str,
        text: &str,
        entry_id: Option<String>,
        metadata: Metadata,
        timestamp: Option<DateTime<Utc>>,
    ) -> String {
        let tokens = tokenize(text);
        let document = SemanticDocument {
            id: Self::document_id(text),
            text: text.to_string(),
            vector: SparseVector::from_tokens(&tokens),
            tokens,
            entry_id,
            metadata,
            timestamp,
        };
        let id = document.id.clone();

        debug!(
            conversation_id = %conversation_id,
            document_id = %id,
            dimensions = document.vector.len(),
            "Indexed document"
        );

        self.conversations
            .entry(conversation_id.to_string())
            .or_default()
            .insert(document);

        id
    }

    /// Documents scoring at least `threshold` against `query`, best first
    pub fn search(
        &self,
        conversation_id: &str,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Vec<ScoredDocument> {
        let Some(index) = self.conversations.get(conversation_id) else {
            return Vec::new();
        };

        let query_vector = SparseVector::from_tokens(&tokenize(query));
        if query_vector.is_empty() {
            return Vec::new();
        }

        let scored = index
            .documents
            .iter()
            .map(|doc| (doc, query_vector.cosine_similarity(&doc.vector)))
            .filter(|(_, score)| *score >= threshold);

        rank(scored, limit)
    }

    /// Documents most similar to a stored document, excluding that document's text
    pub fn get_related(
        &self,
        conversation_id: &str,
        document_id: &str,
        limit: usize,
    ) -> Vec<ScoredDocument> {
        let Some(index) = self.conversations.get(conversation_id) else {
            return Vec::new();
        };
        let Some(anchor) = index.documents.iter().find(|d| d.id == document_id) else {
            return Vec::new();
        };

        let scored = index
            .documents
            .iter()
            .filter(|doc| doc.id != document_id)
            .map(|doc| (doc, anchor.vector.cosine_similarity(&doc.vector)));

        rank(scored, limit)
    }

    /// Tokens appearing in the most documents, ties broken alphabetically
    pub fn get_keywords(&self, conversation_id: &str, limit: usize) -> Vec<(String, usize)> {
        let Some(index) = self.conversations.get(conversation_id) else {
            return Vec::new();
        };

        let mut keywords: Vec<(String, usize)> = index
            .token_frequencies
            .iter()
            .map(|(token, count)| (token.clone(), *count))
            .collect();
        keywords.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        keywords.truncate(limit);
        keywords
    }

    /// First document with the given id
    pub fn get_document(&self, conversation_id: &str, document_id: &str) -> Option<SemanticDocument> {
        self.conversations
            .get(conversation_id)?
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
    }

    /// All documents in insertion order
    pub fn documents(&self, conversation_id: &str) -> Vec<SemanticDocument> {
        self.conversations
            .get(conversation_id)
            .map(|index| index.documents.clone())
            .unwrap_or_default()
    }

    /// Remove the first document derived from `entry_id`
    pub fn remove_entry(&self, conversation_id: &str, entry_id: &str) -> bool {
        let Some(mut index) = self.conversations.get_mut(conversation_id) else {
            return false;
        };
        let Some(position) = index
            .documents
            .iter()
            .position(|doc| doc.entry_id.as_deref() == Some(entry_id))
        else {
            return false;
        };

        let document = index.documents.remove(position);
        index.forget_tokens(&document);
        true
    }

    /// Keep only documents matching `keep`; returns how many were removed
    pub fn retain<F>(&self, conversation_id: &str, keep: F) -> usize
    where
        F: FnMut(&SemanticDocument) -> bool,
    {
        match self.conversations.get_mut(conversation_id) {
            Some(mut index) => index.retain(keep),
            None => 0,
        }
    }

    /// Drop every document in a conversation; returns how many were removed
    pub fn clear(&self, conversation_id: &str) -> usize {
        let Some(mut index) = self.conversations.get_mut(conversation_id) else {
            return 0;
        };

        let removed = index.documents.len();
        index.documents.clear();
        index.token_frequencies.clear();

        debug!(conversation_id = %conversation_id, removed, "Cleared semantic index");
        removed
    }

    /// Documents in a conversation
    pub fn count(&self, conversation_id: &str) -> usize {
        self.conversations
            .get(conversation_id)
            .map_or(0, |index| index.documents.len())
    }
}

impl Default for SemanticIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn unique_tokens(tokens: &[String]) -> impl Iterator<Item = &str> {
    let mut seen = std::collections::HashSet::new();
    tokens
        .iter()
        .map(String::as_str)
        .filter(move |token| seen.insert(*token))
}

/// Stable descending sort: equal scores keep insertion order
fn rank<'a, I>(scored: I, limit: usize) -> Vec<ScoredDocument>
where
    I: Iterator<Item = (&'a SemanticDocument, f32)>,
{
    let mut results: Vec<(&SemanticDocument, f32)> = scored.collect();
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    results
        .into_iter()
        .take(limit)
        .map(|(doc, score)| ScoredDocument {
            document: doc.clone(),
            score,
        })
        .collect()
}
