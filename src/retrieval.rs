//! Retrieval-augmented context: embedders, vector stores and the retriever
//! that ranks, deduplicates and budgets curriculum chunks.

mod embedder;
mod retriever;
mod store;

pub use embedder::{cosine_similarity, Embedder, HashingEmbedder, OpenAIEmbedder};
pub use retriever::{
    estimate_tokens, ContextChunk, ContextRetriever, RetrievalQuery, RetrieverSettings,
};
pub use store::{
    CorpusEntry, HttpVectorStore, InMemoryVectorStore, SearchFilter, VectorMatch, VectorStore,
};
