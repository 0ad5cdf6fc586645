//! # Kenang Memory
//!
//! Conversational context engine for a group-chat assistant. It remembers what
//! was said in each conversation and answers, cheaply and deterministically,
//! "what from the past is relevant to this new message?".
//!
//! - **Recent store**: bounded sliding window of the latest turns per conversation
//! - **Semantic index**: term-frequency vectors with cosine similarity, no
//!   external embedding service
//! - **Hybrid retriever**: weighted merge of recency and similarity signals
//! - **Manager**: the single entry point, with per-conversation consistency
//!
//! ## Quick Start
//!
//! ```rust
//! use kenang_memory::{ConversationMemoryManager, IncomingMessage, MemoryConfig};
//!
//! # tokio_test::block_on(async {
//! let memory = ConversationMemoryManager::new(MemoryConfig::default())?;
//!
//! memory
//!     .store_message("group-1", IncomingMessage::user("42", "Budi", "saldo berapa sekarang"))
//!     .await;
//! memory
//!     .store_message("group-1", IncomingMessage::user("7", "Sari", "tambah transaksi seratus ribu"))
//!     .await;
//!
//! let history = memory.get_conversation_history("group-1", None).await;
//! assert_eq!(history.len(), 2);
//!
//! let context = memory.get_relevant_context("group-1", "saldo", 5).await;
//! assert_eq!(context[0].content, "saldo berapa sekarang");
//! # Ok::<(), kenang_memory::MemoryError>(())
//! # }).unwrap();
//! ```
//!
//! Nothing here performs I/O or reads the environment; configuration is passed
//! in by the caller and validated at construction.

#![warn(missing_docs)]

pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod manager;
pub mod recent;
pub mod retriever;
pub mod semantic;

pub use config::{ClearPolicy, IndexPolicy, MemoryConfig, RetrieverConfig};
pub use entry::{HistoryMessage, IncomingMessage, MemoryEntry, Metadata, Role};
pub use error::{MemoryError, MemoryResult};
pub use events::{MemoryEvent, MemoryEventBus, MemoryEventKind};
pub use manager::{ContextSummary, ConversationMemoryManager, MemoryStats, UserContext};
pub use recent::{RecentStore, WindowMetadata};
pub use retriever::{CandidateSource, HybridRetriever, RetrievalCandidate, RetrievalStats, Signals};
pub use semantic::{ScoredDocument, SemanticDocument, SemanticIndex};
