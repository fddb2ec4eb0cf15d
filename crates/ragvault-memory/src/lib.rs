//! Chunk storage and exact similarity search for retrieval-augmented generation.
//!
//! Provides lazily initialized chunk stores (in-memory and JSONL-backed),
//! cosine similarity, a BM25-style lexical scorer, a fixed 0.7 / 0.3 hybrid
//! blend of the two, and a local embedding provider.
//!
//! # Main types
//!
//! - [`ChunkStore`] — Trait for durable keyed chunk storage.
//! - [`InMemoryChunkStore`] — Process-lifetime store.
//! - [`FileChunkStore`] — JSONL file-backed store.
//! - [`RetrievalEngine`] — Top-K cosine, lexical and hybrid search over a store.
//! - [`Bm25Scorer`] — Normalized BM25 scores over a corpus snapshot.
//! - [`EmbeddingProvider`] — Trait for the external embedding model.
//! - [`LocalEmbedding`] — Local hashed bag-of-words embedder.

/// BM25-style lexical scoring.
pub mod bm25;
/// Embedding provider trait and local implementation.
pub mod embedding;
/// Top-K retrieval over a chunk store.
pub mod engine;
/// Hybrid score blending.
pub mod hybrid;
/// Cosine similarity.
pub mod similarity;
/// Chunk store trait and backends.
pub mod store;

pub use bm25::Bm25Scorer;
pub use embedding::{EmbeddingProvider, LocalEmbedding};
pub use engine::{rank_chunks, RetrievalEngine};
pub use hybrid::{hybrid_score, ScoringMode};
pub use similarity::cosine_similarity;
pub use store::{open_store, ChunkStore, FileChunkStore, InMemoryChunkStore};
