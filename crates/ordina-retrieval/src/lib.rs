pub mod embedding;
pub mod retriever;
pub mod store;

pub use embedding::{EmbeddingProvider, EmbeddingResult, OpenAiEmbeddingProvider, StubEmbeddingProvider};
pub use retriever::{format_context, Retriever, NO_DOCUMENTS_SENTINEL};
pub use store::{DocumentStore, RetrievedChunk};
