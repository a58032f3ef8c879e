//! Per-document semantic index.
//!
//! Brute-force cosine similarity over segment embeddings held in memory. One
//! index is built per uploaded document and lives as long as the session's
//! analysis engine; nothing is persisted.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::Segment;

struct Entry {
    segment: Segment,
    vector: Vec<f32>,
}

pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: Vec<Entry>,
    ready: bool,
}

impl SemanticIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
            ready: false,
        }
    }

    /// Embed all segments and mark the index ready.
    ///
    /// Returns the ready flag. Any failure (no segments, embedder unavailable,
    /// vector count mismatch) is logged and leaves the index not ready.
    pub async fn build(&mut self, segments: &[Segment]) -> bool {
        if self.ready {
            return true;
        }
        if segments.is_empty() {
            tracing::warn!("No segments to index");
            return false;
        }

        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        match self.embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == segments.len() => {
                self.entries = segments
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(segment, vector)| Entry { segment, vector })
                    .collect();
                self.ready = true;
                tracing::info!(
                    model = self.embedder.model_name(),
                    "Indexed {} semantic vectors",
                    self.entries.len()
                );
            }
            Ok(vectors) => {
                tracing::error!(
                    "Embedding returned {} vectors for {} segments",
                    vectors.len(),
                    segments.len()
                );
            }
            Err(e) => {
                tracing::error!("Error building semantic index: {}", e);
            }
        }
        self.ready
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Up to `k` segments ordered by decreasing similarity to `query`.
    ///
    /// Empty when the index was never built or the query cannot be embedded.
    pub async fn search(&self, query: &str, k: usize) -> Vec<Segment> {
        self.search_scored(query, k)
            .await
            .into_iter()
            .map(|(segment, _)| segment)
            .collect()
    }

    /// [`search`](Self::search) with the cosine score of each hit.
    pub async fn search_scored(&self, query: &str, k: usize) -> Vec<(Segment, f32)> {
        if !self.ready || k == 0 {
            return Vec::new();
        }

        let query_vec = match self.embedder.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Search failed: {}", e);
                return Vec::new();
            }
        };

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(&query_vec, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| (self.entries[i].segment.clone(), score))
            .collect()
    }
}
