//! Conversation turns as stored by the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Free-form metadata attached to entries and documents
pub type Metadata = HashMap<String, serde_json::Value>;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A participant in the chat
    User,
    /// The assistant's own reply
    Assistant,
}

impl Role {
    /// Wire name used in prompts
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded conversational turn
///
/// Entries are immutable once stored: they are evicted or cleared, never
/// edited. Fields are private so the only way to change one is to build a new
/// entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    id: String,
    conversation_id: String,
    participant_id: String,
    participant_name: String,
    text: String,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intent: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: Metadata,
    timestamp: DateTime<Utc>,
}

impl MemoryEntry {
    /// Build an entry from an incoming message
    pub fn new(
        conversation_id: impl Into<String>,
        message: IncomingMessage,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            participant_id: message.participant_id,
            participant_name: message.participant_name,
            text: message.text,
            role: message.role,
            intent: message.intent,
            metadata: message.metadata,
            timestamp,
        }
    }

    /// Copy of this entry under a fresh id, re-homed to a conversation with a new time
    pub(crate) fn rehome(self, conversation_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            timestamp,
            ..self
        }
    }

    /// Stable identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Conversation this turn belongs to
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Participant identifier
    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Participant display name
    pub fn participant_name(&self) -> &str {
        &self.participant_name
    }

    /// Raw text of the turn
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Role of the speaker
    pub fn role(&self) -> Role {
        self.role
    }

    /// Detected intent label, if any
    pub fn intent(&self) -> Option<&str> {
        self.intent.as_deref()
    }

    /// Caller-supplied metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// When the turn was stored
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Rough number of bytes this entry occupies
    pub fn estimated_size(&self) -> usize {
        let metadata_bytes: usize = self
            .metadata
            .iter()
            .map(|(k, v)| k.len() + v.to_string().len())
            .sum();

        std::mem::size_of::<Self>()
            + self.id.len()
            + self.conversation_id.len()
            + self.participant_id.len()
            + self.participant_name.len()
            + self.text.len()
            + self.intent.as_ref().map_or(0, String::len)
            + metadata_bytes
    }

    /// Participant/intent metadata carried into retrieval results
    pub fn source_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("entry_id".into(), self.id.clone().into());
        metadata.insert("participant_id".into(), self.participant_id.clone().into());
        metadata.insert(
            "participant_name".into(),
            self.participant_name.clone().into(),
        );
        metadata.insert(
            "intent".into(),
            self.intent
                .clone()
                .map_or(serde_json::Value::Null, serde_json::Value::String),
        );
        metadata
    }
}

/// A turn as handed to the engine, before it is timestamped and identified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Participant identifier
    pub participant_id: String,
    /// Participant display name
    pub participant_name: String,
    /// Raw text
    pub text: String,
    /// Speaker role
    pub role: Role,
    /// Detected intent label
    #[serde(default)]
    pub intent: Option<String>,
    /// Additional metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl IncomingMessage {
    /// Create a message with an explicit role
    pub fn new(
        participant_id: impl Into<String>,
        participant_name: impl Into<String>,
        text: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            participant_id: participant_id.into(),
            participant_name: participant_name.into(),
            text: text.into(),
            role,
            intent: None,
            metadata: Metadata::new(),
        }
    }

    /// Create a participant message
    pub fn user(
        participant_id: impl Into<String>,
        participant_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(participant_id, participant_name, text, Role::User)
    }

    /// Create an assistant reply
    pub fn assistant(participant_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("assistant", participant_name, text, Role::Assistant)
    }

    /// Set the detected intent
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Add a metadata value
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A role/content pair ready for prompt construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Speaker role
    pub role: Role,
    /// Message content
    pub content: String,
}

impl From<&MemoryEntry> for HistoryMessage {
    fn from(entry: &MemoryEntry) -> Self {
        Self {
            role: entry.role(),
            content: entry.text().to_string(),
        }
    }
}
