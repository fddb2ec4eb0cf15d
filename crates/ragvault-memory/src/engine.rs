use std::sync::Arc;

use ragvault_core::{Chunk, RagError, RagResult, SearchResult};
use tracing::debug;

use crate::bm25::Bm25Scorer;
use crate::hybrid::{hybrid_score, ScoringMode};
use crate::similarity::CosineScorer;
use crate::store::ChunkStore;

/// Stateless ranking over the full contents of a [`ChunkStore`].
///
/// Every search scans the store, scores each chunk (cosine, BM25 or a
/// hybrid blend) and returns the top `k` by descending score. Ties keep scan
/// order. Corpora are expected to be small enough for exact brute-force
/// search.
pub struct RetrievalEngine {
    store: Arc<dyn ChunkStore>,
}

impl RetrievalEngine {
    /// Create an engine reading from `store`.
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Open or create the underlying storage.
    pub async fn initialize(&self) -> RagResult<()> {
        self.store.initialize().await
    }

    /// Insert a chunk into the store.
    pub async fn add(&self, chunk: Chunk) -> RagResult<()> {
        self.store.add(chunk).await
    }

    /// Remove every chunk from the store.
    pub async fn clear(&self) -> RagResult<()> {
        self.store.clear().await
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> RagResult<usize> {
        self.store.count().await
    }

    /// Rank stored chunks against `query_embedding`.
    ///
    /// With `use_hybrid` and non-empty `query_text` the score is
    /// `0.7 * cosine + 0.3 * bm25`; otherwise it is pure cosine similarity.
    /// Fails with [`RagError::InvalidArgument`] when `k == 0` and with
    /// [`RagError::DimensionMismatch`] when a stored embedding has a
    /// different length than the query. An empty store yields no results.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        use_hybrid: bool,
        query_text: &str,
    ) -> RagResult<Vec<SearchResult>> {
        let mode = ScoringMode::for_query(use_hybrid, query_text);
        self.search_with_mode(query_embedding, query_text, k, mode)
            .await
    }

    /// Rank stored chunks by BM25 relevance to `query_text` alone.
    pub async fn search_lexical(&self, query_text: &str, k: usize) -> RagResult<Vec<SearchResult>> {
        self.search_with_mode(&[], query_text, k, ScoringMode::Lexical)
            .await
    }

    async fn search_with_mode(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        k: usize,
        mode: ScoringMode,
    ) -> RagResult<Vec<SearchResult>> {
        check_k(k)?;
        let chunks = self.store.scan_all().await?;
        let results = rank_chunks(&chunks, query_embedding, query_text, k, mode)?;
        debug!(
            corpus = chunks.len(),
            k,
            mode = ?mode,
            returned = results.len(),
            "Search complete"
        );
        Ok(results)
    }
}

fn check_k(k: usize) -> RagResult<()> {
    if k == 0 {
        return Err(RagError::InvalidArgument(
            "k must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Score `chunks` with `mode` and return the `k` best, highest first.
///
/// The sort is stable, so equal scores keep the order of `chunks`.
/// `query_embedding` is ignored in [`ScoringMode::Lexical`] and `query_text`
/// in [`ScoringMode::Semantic`].
pub fn rank_chunks(
    chunks: &[Arc<Chunk>],
    query_embedding: &[f32],
    query_text: &str,
    k: usize,
    mode: ScoringMode,
) -> RagResult<Vec<SearchResult>> {
    check_k(k)?;
    if chunks.is_empty() {
        return Ok(Vec::new());
    }
    if mode.uses_embeddings() && query_embedding.is_empty() {
        return Err(RagError::InvalidArgument(
            "Empty query embedding".to_string(),
        ));
    }

    let cosine = CosineScorer::new(query_embedding);
    let lexical = if mode.uses_lexical() {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        Some(Bm25Scorer::new(query_text, &texts))
    } else {
        None
    };

    let mut scored: Vec<(usize, f32)> = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let lexical_score = lexical.as_ref().map_or(0.0, |scorer| scorer.score(index));
        let score = match mode {
            ScoringMode::Semantic => cosine.score(&chunk.embedding)?,
            ScoringMode::Lexical => lexical_score,
            ScoringMode::Hybrid => hybrid_score(cosine.score(&chunk.embedding)?, lexical_score),
        };
        scored.push((index, score));
    }

    // Sort by score descending; stable for ties
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(index, score)| SearchResult {
            chunk: Arc::clone(&chunks[index]),
            score,
        })
        .collect())
}
