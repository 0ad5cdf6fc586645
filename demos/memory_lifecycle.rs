//! # Memory Lifecycle Demo
//!
//! Shows the lifecycle operations around a conversation:
//!
//! - Subscribing to memory events on an explicitly constructed bus
//! - Eviction once a conversation reaches capacity
//! - Snapshot export and import into a fresh manager
//! - Partial and full clears, and the explicit semantic clear
//!
//! ## Run This Demo
//!
//! ```bash
//! cargo run -p kenang-demos --bin memory_lifecycle
//! ```

use chrono::{Duration, Utc};
use kenang::prelude::*;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("=== Memory Lifecycle Demo ===\n");

    let bus = Arc::new(MemoryEventBus::default());
    let mut events = bus.subscribe();

    let listener = tokio::spawn(async move {
        let mut seen = 0usize;
        while let Ok(event) = events.recv().await {
            seen += 1;
            info!(
                "  event: {}",
                serde_json::to_string(&event).unwrap_or_else(|e| e.to_string())
            );
        }
        seen
    });

    let config = MemoryConfig::new()
        .with_capacity(3)
        .with_clear_policy(ClearPolicy::Explicit);
    let memory = ConversationMemoryManager::new(config.clone())?.with_event_bus(Arc::clone(&bus));

    // ========================================
    // 1. EVICTION
    // ========================================
    info!("=== 1. Eviction at capacity 3 ===");
    for text in ["kopi pagi", "teh siang", "jus sore", "susu malam"] {
        memory
            .store_message("warung", IncomingMessage::user("1", "Budi", text))
            .await;
    }
    let history = memory.get_conversation_history("warung", None).await;
    info!(
        "  window: {:?}",
        history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>()
    );

    // ========================================
    // 2. SNAPSHOT
    // ========================================
    info!("=== 2. Snapshot into a fresh manager ===");
    let snapshot = memory.export_snapshot("warung").await?;
    let restored = ConversationMemoryManager::new(config)?;
    let imported = restored.import_snapshot("warung", &snapshot).await?;
    info!("  imported {} entries", imported);

    // ========================================
    // 3. CLEARING
    // ========================================
    info!("=== 3. Clearing ===");
    let partial = memory
        .clear_memory("warung", Some(Utc::now() - Duration::hours(1)))
        .await;
    info!("  partial clear (older than an hour): {}", partial);

    let cleared = memory.clear_memory("warung", None).await;
    info!("  full clear: {}", cleared);

    // Explicit policy: documents outlive the window until cleared on their own
    let still_indexed = memory.get_relevant_context("warung", "kopi teh jus susu", 5).await;
    info!("  semantic hits after clear: {}", still_indexed.len());
    let semantic_cleared = memory.clear_semantic_index("warung").await;
    info!("  semantic clear: {}", semantic_cleared);

    drop(memory);
    drop(bus);
    let seen = listener.await?;
    info!("  listener saw {} events", seen);

    info!("\n=== Demo Complete ===");
    Ok(())
}
