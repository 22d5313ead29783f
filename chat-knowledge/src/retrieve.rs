//! Two-partition retrieval with weighted rank merging.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chat_memory::{
    EmbeddingKind, EmbeddingProvider, Partition, ScoredChunk, VectorIndex,
};
use chat_primitives::{DocumentId, TenantId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::KnowledgeResult;

/// Tuning knobs for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of results to return.
    pub top_k: usize,
    /// Boost factor for tenant-private results.
    pub user_weight: f32,
    /// Boost factor for platform results.
    pub platform_weight: f32,
    /// Minimum raw similarity score; applied before weighting.
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            user_weight: 1.2,
            platform_weight: 1.0,
            score_threshold: 0.5,
        }
    }
}

/// A retrieved chunk, ranked by weighted score. Transient per turn; only a
/// truncated projection is persisted in message metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    text: String,
    score: f32,
    source: Partition,
    document_id: DocumentId,
    file_name: String,
    chunk_index: usize,
}

impl RetrievedChunk {
    fn from_scored(chunk: &ScoredChunk, weight: f32, source: Partition) -> Self {
        Self {
            text: chunk.payload().text().to_owned(),
            score: chunk.score() * weight,
            source,
            document_id: chunk.payload().document_id(),
            file_name: chunk.payload().file_name().to_owned(),
            chunk_index: chunk.payload().chunk_index(),
        }
    }

    /// Returns the full chunk text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the weighted similarity score, used only for ranking.
    #[must_use]
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// Returns the partition the chunk came from.
    #[must_use]
    pub const fn source(&self) -> Partition {
        self.source
    }

    /// Returns the originating document identifier.
    #[must_use]
    pub const fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Returns the originating file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the chunk position within its document.
    #[must_use]
    pub const fn chunk_index(&self) -> usize {
        self.chunk_index
    }
}

/// Retrieval pipeline: embed once, search both partitions concurrently,
/// weight, rank, and truncate.
pub struct RetrievalMerger {
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl RetrievalMerger {
    /// Creates a merger with default tuning.
    #[must_use]
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embeddings,
            index,
            config: RetrievalConfig::default(),
        }
    }

    /// Overrides the retrieval tuning.
    #[must_use]
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the active tuning.
    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieves the top chunks for a query, merging the tenant's private
    /// partition with the shared platform partition.
    ///
    /// The two partition searches execute concurrently; retrieval latency is
    /// bounded by the slower of the two, not their sum.
    ///
    /// # Errors
    ///
    /// Propagates embedding and vector index failures.
    pub async fn retrieve(
        &self,
        query: &str,
        tenant: TenantId,
    ) -> KnowledgeResult<Vec<RetrievedChunk>> {
        let Some(limit) = NonZeroUsize::new(self.config.top_k) else {
            return Ok(Vec::new());
        };

        let query_vector = self.embeddings.embed(query, EmbeddingKind::Query).await?;

        let (user_results, platform_results) = tokio::try_join!(
            self.index
                .search(Partition::User, &query_vector, limit, Some(tenant)),
            self.index
                .search(Partition::Platform, &query_vector, limit, None),
        )?;

        debug!(
            user_candidates = user_results.len(),
            platform_candidates = platform_results.len(),
            "partition searches complete"
        );

        let mut merged = merge_and_rank(&user_results, &platform_results, &self.config);
        merged.truncate(self.config.top_k);
        Ok(merged)
    }
}

/// Merges results from the two partitions: drops candidates below the raw
/// score threshold, applies partition weights, and sorts by weighted score
/// descending. The sort is stable over a user-first concatenation, so equal
/// weighted scores rank private results ahead of platform results.
fn merge_and_rank(
    user_results: &[ScoredChunk],
    platform_results: &[ScoredChunk],
    config: &RetrievalConfig,
) -> Vec<RetrievedChunk> {
    let mut scored = Vec::with_capacity(user_results.len() + platform_results.len());

    for result in user_results {
        if result.score() >= config.score_threshold {
            scored.push(RetrievedChunk::from_scored(
                result,
                config.user_weight,
                Partition::User,
            ));
        }
    }

    for result in platform_results {
        if result.score() >= config.score_threshold {
            scored.push(RetrievedChunk::from_scored(
                result,
                config.platform_weight,
                Partition::Platform,
            ));
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    scored
}
