use ragvault_core::{RagError, RagResult};

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0 when either vector has zero magnitude (or the result is not
/// finite), so degenerate embeddings never win a ranking. Vectors of
/// different lengths are a [`RagError::DimensionMismatch`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> RagResult<f32> {
    CosineScorer::new(a).score(b)
}

/// Scores many candidates against one query, computing the query norm once.
#[derive(Debug, Clone)]
pub struct CosineScorer<'a> {
    query: &'a [f32],
    query_norm: f64,
}

impl<'a> CosineScorer<'a> {
    /// Prepare a scorer for `query`.
    pub fn new(query: &'a [f32]) -> Self {
        Self {
            query,
            query_norm: norm(query),
        }
    }

    /// Cosine similarity between the query and `candidate`.
    pub fn score(&self, candidate: &[f32]) -> RagResult<f32> {
        if candidate.len() != self.query.len() {
            return Err(RagError::DimensionMismatch {
                expected: self.query.len(),
                actual: candidate.len(),
            });
        }

        let candidate_norm = norm(candidate);
        if self.query_norm == 0.0 || candidate_norm == 0.0 {
            return Ok(0.0);
        }

        // Accumulate in f64 so identical 384-d vectors still score 1 within 1e-6
        let dot: f64 = self
            .query
            .iter()
            .zip(candidate)
            .map(|(&x, &y)| f64::from(x) * f64::from(y))
            .sum();
        let score = (dot / (self.query_norm * candidate_norm)) as f32;

        if score.is_finite() {
            Ok(score.clamp(-1.0, 1.0))
        } else {
            Ok(0.0)
        }
    }
}

fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}
