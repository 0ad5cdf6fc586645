//! Memory configuration
//!
//! Everything the engine needs is passed in here by the caller; nothing is
//! read from the environment. Use [`MemoryConfig::validate`] (called by every
//! constructor) to fail fast on programming errors.

use crate::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};

/// Which stored turns are added to the semantic index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Only participant (`user`) turns are indexed
    #[default]
    UserOnly,
    /// Every turn is indexed, including assistant replies
    All,
}

/// How clearing the recent window affects the semantic index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// Documents belonging to cleared entries are removed in the same step
    #[default]
    WithRecent,
    /// Documents survive until `clear_semantic_index` is called
    Explicit,
}

/// Configuration for the conversation memory engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Entries retained per conversation before the oldest is evicted
    pub capacity: usize,

    /// Default number of turns handed to the language model
    pub context_window: usize,

    /// Weight applied to the recency signal
    pub recent_weight: f32,

    /// Weight applied to the similarity signal
    pub semantic_weight: f32,

    /// Minimum cosine similarity for semantic candidates
    pub semantic_threshold: f32,

    /// Which turns feed the semantic index
    pub index_policy: IndexPolicy,

    /// Whether clears propagate to the semantic index
    pub clear_policy: ClearPolicy,
}

impl MemoryConfig {
    /// Default per-conversation capacity
    pub const DEFAULT_CAPACITY: usize = 50;
    /// Default context window handed to the model
    pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-conversation capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the default history window
    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    /// Set both retrieval weights
    pub fn with_weights(mut self, recent_weight: f32, semantic_weight: f32) -> Self {
        self.recent_weight = recent_weight;
        self.semantic_weight = semantic_weight;
        self
    }

    /// Set the semantic similarity threshold
    pub fn with_semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    /// Set which turns are indexed
    pub fn with_index_policy(mut self, policy: IndexPolicy) -> Self {
        self.index_policy = policy;
        self
    }

    /// Set how clears reach the semantic index
    pub fn with_clear_policy(mut self, policy: ClearPolicy) -> Self {
        self.clear_policy = policy;
        self
    }

    /// Retriever settings derived from this configuration
    pub fn retriever(&self) -> RetrieverConfig {
        RetrieverConfig {
            recent_weight: self.recent_weight,
            semantic_weight: self.semantic_weight,
            semantic_threshold: self.semantic_threshold,
        }
    }

    /// Check every field against its constraint
    pub fn validate(&self) -> MemoryResult<()> {
        if self.capacity == 0 {
            return Err(MemoryError::validation(
                "capacity",
                "must be greater than 0",
                self.capacity.to_string(),
            ));
        }
        if self.context_window == 0 {
            return Err(MemoryError::validation(
                "context_window",
                "must be greater than 0",
                self.context_window.to_string(),
            ));
        }
        self.retriever().validate()
    }

    /// Parse a JSON document and validate the result
    pub fn from_json(json: &str) -> MemoryResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MemoryError::serialization("parse_config", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        let retriever = RetrieverConfig::default();
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            context_window: Self::DEFAULT_CONTEXT_WINDOW,
            recent_weight: retriever.recent_weight,
            semantic_weight: retriever.semantic_weight,
            semantic_threshold: retriever.semantic_threshold,
            index_policy: IndexPolicy::default(),
            clear_policy: ClearPolicy::default(),
        }
    }
}

/// Weights and threshold used by the hybrid retriever
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Multiplier for the rank-derived recency score
    pub recent_weight: f32,
    /// Multiplier for cosine similarity
    pub semantic_weight: f32,
    /// Similarity floor for semantic candidates
    pub semantic_threshold: f32,
}

impl RetrieverConfig {
    /// Check weights and threshold are inside [0, 1]
    pub fn validate(&self) -> MemoryResult<()> {
        check_unit_interval("recent_weight", self.recent_weight)?;
        check_unit_interval("semantic_weight", self.semantic_weight)?;
        check_unit_interval("semantic_threshold", self.semantic_threshold)
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            recent_weight: 0.4,
            semantic_weight: 0.6,
            semantic_threshold: 0.1,
        }
    }
}

fn check_unit_interval(field: &str, value: f32) -> MemoryResult<()> {
    // NaN fails the range check
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MemoryError::validation(
            field,
            "must be within [0, 1]",
            value.to_string(),
        ))
    }
}
