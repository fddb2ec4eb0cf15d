use async_trait::async_trait;
use ragvault_core::progress::report;
use ragvault_core::{ProgressEvent, ProgressSender, RagError, RagResult};
use std::collections::HashMap;

/// Trait for computing text embeddings (vector representations).
///
/// Implementations wrap an external embedding model. Every vector a
/// provider returns has [`dimension`](Self::dimension) elements.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Prepare the model, reporting status lines as
    /// [`ProgressEvent::Loading`]. The default does nothing.
    async fn load(&self, progress: Option<&ProgressSender>) -> RagResult<()> {
        let _ = progress;
        Ok(())
    }

    /// Compute embedding vector for a single text.
    async fn embed(&self, text: &str) -> RagResult<Vec<f32>>;

    /// Compute embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Weight of a word-pair feature relative to a single word.
const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic embedder based on signed feature hashing.
///
/// Features are the lowercased alphanumeric words of the text and each pair
/// of adjacent words. A feature lands in one slot chosen by its 64-bit
/// FNV-1a hash, with a sign taken from the hash's top bit, weighted by
/// `1 + ln(tf)`. The vector is then L2-normalized. Texts sharing words or
/// phrases score high under cosine; there is no notion of synonyms.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// Create an embedder producing `dimension`-element vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a64(feature);
        let slot = (hash % self.dimension as u64) as usize;
        if hash >> 63 == 1 {
            vector[slot] -= weight;
        } else {
            vector[slot] += weight;
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn load(&self, progress: Option<&ProgressSender>) -> RagResult<()> {
        report(
            progress,
            ProgressEvent::Loading {
                message: format!("Local embedder ready ({} dimensions)", self.dimension),
            },
        );
        Ok(())
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::Embedding("Cannot embed empty text".to_string()));
        }

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut counts: HashMap<Vec<u8>, (f32, f32)> = HashMap::new();
        for word in &words {
            counts.entry(word.as_bytes().to_vec()).or_insert((0.0, 1.0)).0 += 1.0;
        }
        for pair in words.windows(2) {
            let mut feature = Vec::with_capacity(pair[0].len() + pair[1].len() + 1);
            feature.extend_from_slice(pair[0].as_bytes());
            feature.push(0x1f);
            feature.extend_from_slice(pair[1].as_bytes());
            counts.entry(feature).or_insert((0.0, BIGRAM_WEIGHT)).0 += 1.0;
        }

        // Punctuation-only text has no features and embeds to the zero vector
        let mut vector = vec![0.0f32; self.dimension];
        for (feature, (tf, weight)) in &counts {
            self.add_feature(&mut vector, feature, weight * (1.0 + tf.ln()));
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a, 64-bit.
fn fnv1a64(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
