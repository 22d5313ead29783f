//! Minimal end-to-end wiring: in-memory stores, Ollama embeddings, Gemini
//! generation, one ingested document, one streamed turn.
//!
//! Requires a running Ollama daemon with the `nomic-embed-text` model and a
//! `GEMINI_API_KEY` environment variable.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use chat_knowledge::{DocumentIngestor, RetrievalMerger};
use chat_memory::{
    ConversationStore, EmbeddingProvider, InMemoryConversationStore, LocalVectorIndex, VectorIndex,
};
use chat_primitives::TenantId;
use chat_providers::gemini::{GeminiConfig, GeminiProvider};
use chat_providers::ollama::{OllamaEmbeddings, OllamaEmbeddingsConfig};
use chat_providers::traits::LlmProvider;
use chat_turn::{TurnEvent, TurnOrchestrator, TurnRequest};
use futures::StreamExt;
use tracing::info;

const SAMPLE_DOCUMENT: &str = "\
Refund policy: purchases can be refunded within 30 days of delivery.\n\
Cancellations: subscriptions can be cancelled at any time from the account \
page; access continues until the end of the billing period.\n\
Shipping: orders ship within two business days.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let embeddings: Arc<dyn EmbeddingProvider> =
        Arc::new(OllamaEmbeddings::new(OllamaEmbeddingsConfig::default())?);
    let llm: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(GeminiConfig::from_env())?);

    let store: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new());
    let index: Arc<dyn VectorIndex> = Arc::new(LocalVectorIndex::new());

    let tenant = TenantId::random();

    let ingestor = DocumentIngestor::new(Arc::clone(&embeddings), Arc::clone(&index));
    let outcome = ingestor
        .ingest_for_tenant(tenant, "policies.txt", SAMPLE_DOCUMENT)
        .await?;
    info!(
        document = %outcome.document_id(),
        chunks = outcome.chunks_created(),
        "sample document ingested"
    );

    let retrieval = Arc::new(RetrievalMerger::new(embeddings, index));
    let orchestrator = TurnOrchestrator::builder()
        .with_store(store)
        .with_llm(llm)
        .with_retrieval(retrieval)
        .build()?;

    let mut events = orchestrator.turn(TurnRequest::new(tenant, "What is the refund policy?"));
    while let Some(event) = events.next().await {
        match event {
            TurnEvent::Token { content } => {
                print!("{content}");
                std::io::stdout().flush()?;
            }
            TurnEvent::Done { conversation_id } => {
                println!();
                info!(conversation = %conversation_id, "turn complete");
            }
            TurnEvent::Error { content } => {
                println!();
                info!(error = content, "turn failed");
            }
        }
    }

    Ok(())
}
