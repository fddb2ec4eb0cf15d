use crate::bm25::tokenize;

/// Weight of the cosine score in a hybrid blend.
pub const SEMANTIC_WEIGHT: f32 = 0.7;
/// Weight of the BM25 score in a hybrid blend.
pub const LEXICAL_WEIGHT: f32 = 0.3;

/// How candidates are scored for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Cosine similarity of embeddings only.
    Semantic,
    /// BM25 relevance of the query text only.
    Lexical,
    /// `0.7 * cosine + 0.3 * bm25`, clamped to `[0, 1]`.
    Hybrid,
}

impl ScoringMode {
    /// Resolve the mode for a `search` call.
    ///
    /// Hybrid scoring needs query text with at least one token; without it
    /// the search falls back to pure cosine scoring.
    pub fn for_query(use_hybrid: bool, query_text: &str) -> Self {
        if use_hybrid && !tokenize(query_text).is_empty() {
            Self::Hybrid
        } else {
            Self::Semantic
        }
    }

    /// Whether this mode needs a query embedding.
    pub fn uses_embeddings(self) -> bool {
        matches!(self, Self::Semantic | Self::Hybrid)
    }

    /// Whether this mode needs corpus lexical statistics.
    pub fn uses_lexical(self) -> bool {
        matches!(self, Self::Lexical | Self::Hybrid)
    }
}

/// Blend a cosine score and a BM25 score with the fixed 0.7 / 0.3 weights.
pub fn hybrid_score(cosine: f32, bm25: f32) -> f32 {
    (SEMANTIC_WEIGHT * cosine + LEXICAL_WEIGHT * bm25).clamp(0.0, 1.0)
}
