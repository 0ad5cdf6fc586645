//! Memory lifecycle notifications
//!
//! A [`MemoryEventBus`] is constructed by the caller and attached to a
//! [`ConversationMemoryManager`](crate::ConversationMemoryManager); there is no
//! global instance. Subscribers that fall behind lose the oldest events
//! (`broadcast` semantics) and the manager never waits on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something that changed a conversation's memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryEventKind {
    /// A turn was stored
    MessageStored {
        /// New entry id
        entry_id: String,
        /// Entry evicted to make room, if any
        evicted: Option<String>,
    },

    /// Entries were cleared
    MemoryCleared {
        /// Entries removed from the recent window
        cleared: usize,
        /// Documents removed from the semantic index
        semantic_cleared: usize,
    },

    /// A batch of entries was imported
    MemoryImported {
        /// Entries offered for import
        imported: usize,
    },
}

/// An event with its conversation and time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    /// Conversation the event concerns
    pub conversation_id: String,

    /// What happened
    #[serde(flatten)]
    pub kind: MemoryEventKind,

    /// When it happened
    pub timestamp: DateTime<Utc>,
}

impl MemoryEvent {
    /// Stamp an event with the current time
    pub fn new(conversation_id: impl Into<String>, kind: MemoryEventKind) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Explicitly constructed publish/subscribe channel for memory events
pub struct MemoryEventBus {
    sender: broadcast::Sender<MemoryEvent>,
}

impl MemoryEventBus {
    /// Create a bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; returns how many subscribers received it
    pub fn publish(&self, event: MemoryEvent) -> usize {
        // No subscribers is not an error
        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                trace!("Memory event dropped, no subscribers");
                0
            }
        }
    }

    /// Active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
