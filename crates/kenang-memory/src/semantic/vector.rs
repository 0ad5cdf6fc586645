//! Sparse term-frequency vectors and cosine similarity
//!
//! Vectors are keyed by token, so two vectors from the same conversation are
//! compared over the union of their vocabularies: a token missing on one side
//! contributes zero, exactly as if both were zero-padded onto a shared
//! vocabulary. Comparing vectors across conversations is meaningless and the
//! index never does it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An L2-normalized token -> weight map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    weights: HashMap<String, f32>,
}

impl SparseVector {
    /// Term frequency over the token count, then L2-normalized
    pub fn from_tokens(tokens: &[String]) -> Self {
        if tokens.is_empty() {
            return Self::default();
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        let total = tokens.len() as f32;
        let mut weights: HashMap<String, f32> = counts
            .into_iter()
            .map(|(token, count)| (token.to_string(), count as f32 / total))
            .collect();

        let norm = weights.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for w in weights.values_mut() {
                *w /= norm;
            }
        }

        Self { weights }
    }

    /// Weight of a token, zero when absent
    pub fn weight(&self, token: &str) -> f32 {
        self.weights.get(token).copied().unwrap_or(0.0)
    }

    /// Number of non-zero dimensions
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the vector has no dimensions
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Euclidean norm (1.0 for any non-empty vector built by `from_tokens`)
    pub fn norm(&self) -> f32 {
        self.weights.values().map(|w| w * w).sum::<f32>().sqrt()
    }

    /// Cosine similarity clamped to [0, 1]; empty vectors score 0
    pub fn cosine_similarity(&self, other: &SparseVector) -> f32 {
        // Iterate the smaller map
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        let dot_product: f32 = small
            .weights
            .iter()
            .map(|(token, w)| w * large.weight(token))
            .sum();

        let norm_a = self.norm();
        let norm_b = other.norm();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        (dot_product / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}
