//! Vector index traits and a local in-memory implementation.
//!
//! The index is split into two logical partitions: a tenant-scoped partition
//! for private knowledge and a shared partition for platform-wide knowledge.
//! Searches against the tenant partition carry a tenant filter; the local
//! implementation applies it against the record payload the same way a
//! payload-filtering vector database would.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use async_trait::async_trait;
use chat_primitives::{DocumentId, TenantId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::MemoryResult;
use crate::embeddings::EmbeddingVector;

/// Logical retrieval partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Private per-tenant knowledge; searches must carry a tenant filter.
    User,
    /// Shared platform-wide knowledge; searched unfiltered.
    Platform,
}

impl Partition {
    /// Returns the backing collection name for the partition.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::User => "user_knowledge",
            Self::Platform => "platform_knowledge",
        }
    }
}

/// Payload stored alongside each indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant_id: Option<TenantId>,
    document_id: DocumentId,
    file_name: String,
    chunk_index: usize,
    text: String,
}

impl ChunkPayload {
    /// Creates a payload for an indexed chunk.
    #[must_use]
    pub fn new(
        tenant_id: Option<TenantId>,
        document_id: DocumentId,
        file_name: impl Into<String>,
        chunk_index: usize,
        text: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            document_id,
            file_name: file_name.into(),
            chunk_index,
            text: text.into(),
        }
    }

    /// Returns the owning tenant, if the chunk is tenant-scoped.
    #[must_use]
    pub const fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
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

    /// Returns the chunk text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Record stored in a vector index partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    id: Uuid,
    embedding: EmbeddingVector,
    payload: ChunkPayload,
}

impl VectorRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(id: Uuid, embedding: EmbeddingVector, payload: ChunkPayload) -> Self {
        Self {
            id,
            embedding,
            payload,
        }
    }

    /// Returns the record identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the stored embedding.
    #[must_use]
    pub fn embedding(&self) -> &EmbeddingVector {
        &self.embedding
    }

    /// Returns the stored payload.
    #[must_use]
    pub fn payload(&self) -> &ChunkPayload {
        &self.payload
    }
}

/// Match returned from a similarity search. The score is the raw cosine
/// similarity, before any partition weighting.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    score: f32,
    payload: ChunkPayload,
}

impl ScoredChunk {
    /// Creates a scored match.
    #[must_use]
    pub fn new(score: f32, payload: ChunkPayload) -> Self {
        Self { score, payload }
    }

    /// Returns the raw similarity score.
    #[must_use]
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// Returns the matched payload.
    #[must_use]
    pub fn payload(&self) -> &ChunkPayload {
        &self.payload
    }
}

/// Interface for vector index backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Executes a similarity search, returning matches ordered by descending
    /// raw score. When `tenant_filter` is set only chunks owned by that tenant
    /// match.
    async fn search(
        &self,
        partition: Partition,
        vector: &EmbeddingVector,
        limit: NonZeroUsize,
        tenant_filter: Option<TenantId>,
    ) -> MemoryResult<Vec<ScoredChunk>>;

    /// Inserts or updates records in the partition.
    async fn upsert(&self, partition: Partition, records: Vec<VectorRecord>) -> MemoryResult<()>;

    /// Removes records by identifier.
    async fn remove(&self, partition: Partition, ids: &[Uuid]) -> MemoryResult<()>;

    /// Removes every chunk belonging to the given document.
    async fn remove_by_document(
        &self,
        partition: Partition,
        document_id: DocumentId,
    ) -> MemoryResult<()>;
}

/// Simple in-memory vector index using cosine similarity.
pub struct LocalVectorIndex {
    partitions: RwLock<HashMap<Partition, HashMap<Uuid, VectorRecord>>>,
}

impl LocalVectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for LocalVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn search(
        &self,
        partition: Partition,
        vector: &EmbeddingVector,
        limit: NonZeroUsize,
        tenant_filter: Option<TenantId>,
    ) -> MemoryResult<Vec<ScoredChunk>> {
        let guard = self.partitions.read().await;
        let Some(records) = guard.get(&partition) else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::new();
        for record in records.values() {
            if let Some(tenant) = tenant_filter
                && record.payload().tenant_id() != Some(tenant)
            {
                continue;
            }

            if record.embedding().len() != vector.len() {
                continue;
            }

            let score = cosine_similarity(record.embedding(), vector);
            matches.push(ScoredChunk::new(score, record.payload().clone()));
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit.get());
        Ok(matches)
    }

    async fn upsert(&self, partition: Partition, records: Vec<VectorRecord>) -> MemoryResult<()> {
        let mut guard = self.partitions.write().await;
        let slot = guard.entry(partition).or_default();
        for record in records {
            slot.insert(record.id(), record);
        }
        Ok(())
    }

    async fn remove(&self, partition: Partition, ids: &[Uuid]) -> MemoryResult<()> {
        let mut guard = self.partitions.write().await;
        if let Some(records) = guard.get_mut(&partition) {
            for id in ids {
                records.remove(id);
            }
        }
        Ok(())
    }

    async fn remove_by_document(
        &self,
        partition: Partition,
        document_id: DocumentId,
    ) -> MemoryResult<()> {
        let mut guard = self.partitions.write().await;
        if let Some(records) = guard.get_mut(&partition) {
            records.retain(|_, record| record.payload().document_id() != document_id);
        }
        Ok(())
    }
}

fn cosine_similarity(lhs: &EmbeddingVector, rhs: &EmbeddingVector) -> f32 {
    let numerator = lhs.dot(rhs);
    let denominator = lhs.magnitude() * rhs.magnitude();
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        tenant: Option<TenantId>,
        document: DocumentId,
        index: usize,
        values: Vec<f32>,
    ) -> VectorRecord {
        VectorRecord::new(
            Uuid::new_v4(),
            EmbeddingVector::new(values).unwrap(),
            ChunkPayload::new(tenant, document, "doc.txt", index, format!("chunk {index}")),
        )
    }

    fn one() -> NonZeroUsize {
        NonZeroUsize::new(1).unwrap()
    }

    #[tokio::test]
    async fn searches_by_similarity() {
        let index = LocalVectorIndex::new();
        let document = DocumentId::random();
        index
            .upsert(
                Partition::Platform,
                vec![
                    record(None, document, 0, vec![1.0, 0.0, 0.0]),
                    record(None, document, 1, vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let query = EmbeddingVector::new(vec![1.0, 0.0, 0.0]).unwrap();
        let matches = index
            .search(Partition::Platform, &query, one(), None)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].payload().chunk_index(), 0);
        assert!((matches[0].score() - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn tenant_filter_isolates_results() {
        let index = LocalVectorIndex::new();
        let ours = TenantId::random();
        let theirs = TenantId::random();
        index
            .upsert(
                Partition::User,
                vec![
                    record(Some(ours), DocumentId::random(), 0, vec![1.0, 0.0]),
                    record(Some(theirs), DocumentId::random(), 1, vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let query = EmbeddingVector::new(vec![1.0, 0.0]).unwrap();
        let matches = index
            .search(
                Partition::User,
                &query,
                NonZeroUsize::new(10).unwrap(),
                Some(ours),
            )
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].payload().tenant_id(), Some(ours));
    }

    #[tokio::test]
    async fn partitions_are_disjoint() {
        let index = LocalVectorIndex::new();
        index
            .upsert(
                Partition::User,
                vec![record(
                    Some(TenantId::random()),
                    DocumentId::random(),
                    0,
                    vec![1.0],
                )],
            )
            .await
            .unwrap();

        let query = EmbeddingVector::new(vec![1.0]).unwrap();
        let matches = index
            .search(Partition::Platform, &query, one(), None)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn removes_by_document() {
        let index = LocalVectorIndex::new();
        let keep = DocumentId::random();
        let drop = DocumentId::random();
        index
            .upsert(
                Partition::Platform,
                vec![
                    record(None, keep, 0, vec![1.0]),
                    record(None, drop, 0, vec![1.0]),
                    record(None, drop, 1, vec![1.0]),
                ],
            )
            .await
            .unwrap();

        index
            .remove_by_document(Partition::Platform, drop)
            .await
            .unwrap();

        let query = EmbeddingVector::new(vec![1.0]).unwrap();
        let matches = index
            .search(
                Partition::Platform,
                &query,
                NonZeroUsize::new(10).unwrap(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].payload().document_id(), keep);
    }
}
