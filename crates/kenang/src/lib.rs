//! # Kenang - Conversational Memory for Group Chats
//!
//! **Kenang** gives a group-chat assistant a memory of what was said:
//!
//! - **Kenang Memory**: bounded recent windows, term-frequency semantic recall
//!   and hybrid retrieval, per conversation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kenang::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let memory = ConversationMemoryManager::new(MemoryConfig::default())?;
//!
//!     memory
//!         .store_message("group-1", IncomingMessage::user("42", "Budi", "saldo berapa sekarang"))
//!         .await;
//!
//!     for candidate in memory.get_relevant_context("group-1", "saldo", 5).await {
//!         println!("{:.3} {}", candidate.score, candidate.content);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!            ConversationMemoryManager
//!                       |
//!          +------------+------------+
//!          |                         |
//!     RecentStore  <--  HybridRetriever  -->  SemanticIndex
//! ```

#![doc(html_root_url = "https://docs.rs/kenang/0.1.0")]
#![warn(missing_docs)]

// Re-export sub-crates
#[cfg(feature = "memory")]
pub use kenang_memory as memory;

/// Commonly used types
pub mod prelude {
    #[cfg(feature = "memory")]
    pub use crate::memory::{
        CandidateSource, ClearPolicy, ContextSummary, ConversationMemoryManager, HistoryMessage,
        IncomingMessage, IndexPolicy, MemoryConfig, MemoryEntry, MemoryError, MemoryEvent,
        MemoryEventBus, MemoryEventKind, MemoryResult, MemoryStats, RetrievalCandidate, Role,
        UserContext,
    };
}
