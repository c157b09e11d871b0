use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;

use crate::embedding::EmbeddingProvider;
use crate::store::{DocumentStore, RetrievedChunk};

/// Fixed sentinel rendered when no passage survives retrieval, so prompt
/// assembly never sees an ambiguous blank context.
pub const NO_DOCUMENTS_SENTINEL: &str = "Nebyly nalezeny žádné relevantní dokumenty.";

/// Access-controlled retrieval over the document store. The allow-list
/// filter here is the enforcement point for file access; callers handling
/// user queries must always pass `Some(allow_list)`.
pub struct Retriever {
    store: DocumentStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: DocumentStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Ranked passages for `query`, highest score first, filtered to
    /// `allow_list` when one is given. `Some(empty)` yields nothing;
    /// `None` skips filtering entirely and is reserved for internal
    /// diagnostics. Empty output is not an error; embedding or store
    /// failures are.
    pub async fn retrieve(
        &self,
        query: &str,
        allow_list: Option<&HashSet<String>>,
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        // An empty allow-list cannot match anything; skip the round trip.
        if let Some(allowed) = allow_list {
            if allowed.is_empty() {
                tracing::debug!("empty allow-list, skipping retrieval");
                return Ok(Vec::new());
            }
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let raw = self
            .store
            .vector_search(&query_vector, top_k, min_score)
            .await?;
        let raw_count = raw.len();

        let chunks: Vec<RetrievedChunk> = match allow_list {
            Some(allowed) => raw
                .into_iter()
                .filter(|c| allowed.contains(&c.document_name))
                .collect(),
            None => raw,
        };

        tracing::info!(
            raw = raw_count,
            selected = chunks.len(),
            filtered = allow_list.is_some(),
            "retrieval finished"
        );
        Ok(chunks)
    }
}

/// Deterministic, order-preserving rendering of retrieved passages for the
/// generation prompt.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_DOCUMENTS_SENTINEL.to_string();
    }

    let mut parts = Vec::with_capacity(chunks.len());
    for (idx, chunk) in chunks.iter().enumerate() {
        let mut part = format!(
            "--- Dokument {}: {} ---\n",
            idx + 1,
            chunk.document_name
        );
        if let Some(department) = &chunk.department {
            let _ = writeln!(part, "Oddělení: {department}");
        }
        if let Some(owner) = &chunk.process_owner {
            let _ = writeln!(part, "Vlastník procesu: {owner}");
        }
        let _ = writeln!(part, "Relevance: {:.2}\n", chunk.relevance_score);
        part.push_str(&chunk.chunk_text);
        parts.push(part);
    }

    parts.join("\n\n")
}
