//! Document ingestion: sanitize, chunk, embed, index.
//!
//! File-format parsing happens upstream; ingestion starts from extracted
//! text. Every chunk is sanitized before it can become retrieval context.

use std::sync::Arc;

use chat_guardrails::sanitize_document_text;
use chat_memory::{
    ChunkPayload, EmbeddingKind, EmbeddingProvider, Partition, VectorIndex, VectorRecord,
};
use chat_primitives::{DocumentId, TenantId};
use tracing::info;
use uuid::Uuid;

use crate::splitter::TextSplitter;
use crate::{KnowledgeError, KnowledgeResult};

/// Result of ingesting one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    document_id: DocumentId,
    chunks_created: usize,
}

impl IngestOutcome {
    /// Returns the identifier assigned to the document.
    #[must_use]
    pub const fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Returns the number of chunks written to the index.
    #[must_use]
    pub const fn chunks_created(&self) -> usize {
        self.chunks_created
    }
}

/// Pipeline turning document text into indexed, embedded chunks.
pub struct DocumentIngestor {
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    splitter: TextSplitter,
}

impl DocumentIngestor {
    /// Creates an ingestor with the default splitter.
    #[must_use]
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embeddings,
            index,
            splitter: TextSplitter::new(),
        }
    }

    /// Overrides the text splitter.
    #[must_use]
    pub fn with_splitter(mut self, splitter: TextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Ingests a document into the tenant's private knowledge partition.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::EmptyDocument`] when no usable text remains
    /// after sanitization, or a memory error when embedding or indexing fails.
    pub async fn ingest_for_tenant(
        &self,
        tenant: TenantId,
        file_name: &str,
        text: &str,
    ) -> KnowledgeResult<IngestOutcome> {
        self.ingest(Partition::User, Some(tenant), file_name, text)
            .await
    }

    /// Ingests a document into the shared platform partition.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`DocumentIngestor::ingest_for_tenant`].
    pub async fn ingest_platform(
        &self,
        file_name: &str,
        text: &str,
    ) -> KnowledgeResult<IngestOutcome> {
        self.ingest(Partition::Platform, None, file_name, text).await
    }

    async fn ingest(
        &self,
        partition: Partition,
        tenant: Option<TenantId>,
        file_name: &str,
        text: &str,
    ) -> KnowledgeResult<IngestOutcome> {
        let sanitized = sanitize_document_text(text);
        if sanitized.trim().is_empty() {
            return Err(KnowledgeError::EmptyDocument);
        }

        let chunks = self.splitter.split(&sanitized);
        if chunks.is_empty() {
            return Err(KnowledgeError::EmptyDocument);
        }

        let embeddings = self
            .embeddings
            .embed_batch(&chunks, EmbeddingKind::Document)
            .await?;

        let document_id = DocumentId::random();
        let records = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (chunk, embedding))| {
                VectorRecord::new(
                    Uuid::new_v4(),
                    embedding,
                    ChunkPayload::new(tenant, document_id, file_name, chunk_index, chunk.clone()),
                )
            })
            .collect::<Vec<_>>();

        let chunks_created = records.len();
        self.index.upsert(partition, records).await?;

        info!(
            document = %document_id,
            partition = partition.collection(),
            chunks = chunks_created,
            "document ingested"
        );

        Ok(IngestOutcome {
            document_id,
            chunks_created,
        })
    }

    /// Removes every chunk of a previously ingested document.
    ///
    /// # Errors
    ///
    /// Propagates vector index failures.
    pub async fn remove_document(
        &self,
        partition: Partition,
        document_id: DocumentId,
    ) -> KnowledgeResult<()> {
        self.index.remove_by_document(partition, document_id).await?;
        Ok(())
    }
}
