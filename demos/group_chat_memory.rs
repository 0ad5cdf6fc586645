//! # Group Chat Memory Demo
//!
//! Walks through a small group-chat session about a shared class fund:
//!
//! - Storing participant turns and assistant replies
//! - Prompt-ready history for the language model
//! - Hybrid retrieval of relevant context for a new question
//! - Per-participant and conversation rollups
//!
//! ## Run This Demo
//!
//! ```bash
//! cargo run -p kenang-demos --bin group_chat_memory
//! RUST_LOG=kenang_memory=debug cargo run -p kenang-demos --bin group_chat_memory
//! ```

use kenang::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

const GROUP: &str = "kas-kelas-12a";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("=== Group Chat Memory Demo ===\n");

    let memory = ConversationMemoryManager::new(
        MemoryConfig::new().with_capacity(50).with_context_window(6),
    )?;

    // ========================================
    // 1. STORE A CONVERSATION
    // ========================================
    info!("=== 1. Storing turns ===");
    let turns = [
        IncomingMessage::user("101", "Budi", "saldo kas berapa sekarang?").with_intent("check_balance"),
        IncomingMessage::assistant("Kenang", "Saldo kas saat ini Rp 1.250.000"),
        IncomingMessage::user("202", "Sari", "tambah pemasukan iuran 50 ribu dari Dewi")
            .with_intent("add_income"),
        IncomingMessage::assistant("Kenang", "Pemasukan Rp 50.000 dicatat"),
        IncomingMessage::user("303", "Dewi", "beli spidol dan kertas 35 ribu").with_intent("add_expense"),
        IncomingMessage::user("101", "Budi", "berapa saldo kita setelah beli spidol?")
            .with_intent("check_balance"),
    ];
    for turn in turns {
        let entry = memory.store_message(GROUP, turn).await;
        info!("  [{}] {}: {}", entry.role(), entry.participant_name(), entry.text());
    }
    info!("");

    // ========================================
    // 2. HISTORY FOR THE MODEL
    // ========================================
    info!("=== 2. Prompt history (context window) ===");
    for message in memory.get_formatted_history(GROUP, None).await {
        info!("  {:>9}: {}", message.role.as_str(), message.content);
    }
    info!("");

    // ========================================
    // 3. RELEVANT CONTEXT
    // ========================================
    info!("=== 3. Relevant context for \"saldo\" ===");
    for candidate in memory.get_relevant_context(GROUP, "saldo", 3).await {
        info!(
            "  {:.3} {:?} {}",
            candidate.score, candidate.source, candidate.content
        );
    }

    info!("=== Intent lookup: check_balance ===");
    for candidate in memory.retriever().retrieve_by_intent(GROUP, "check_balance", 5) {
        info!("  {}", candidate.content);
    }
    info!("");

    // ========================================
    // 4. ROLLUPS
    // ========================================
    info!("=== 4. Rollups ===");
    let budi = memory.get_user_context(GROUP, "101").await;
    info!(
        "  Budi: {} messages, intents {:?}",
        budi.message_count, budi.common_intents
    );

    let summary = memory.summarize_context(GROUP).await;
    info!(
        "  Conversation: {} messages, {} participants, topics {:?}",
        summary.total_messages, summary.unique_participants, summary.recent_topics
    );
    info!("  Keywords: {:?}", memory.get_keywords(GROUP, 5).await);

    info!("\n{}", memory.retriever().get_conversation_summary(GROUP, 20));

    let stats = memory.get_memory_stats(GROUP).await;
    info!(
        "  Stats: {} entries, {} indexed, ~{} bytes",
        stats.total_entries, stats.semantic_documents, stats.memory_usage_estimate
    );

    info!("\n=== Demo Complete ===");
    Ok(())
}
