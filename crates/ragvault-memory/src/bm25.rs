use std::collections::{HashMap, HashSet};

/// BM25 parameters.
pub const K1: f64 = 1.5;
/// Length normalization strength.
pub const B: f64 = 0.75;

/// Tokenize text into lowercase whitespace-separated words.
///
/// No stemming or stop-word removal.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Per-document statistics restricted to the query's terms.
#[derive(Debug, Clone)]
struct DocStats {
    length: f64,
    term_freq: HashMap<String, f64>,
}

/// BM25-style lexical scorer for one query over one corpus snapshot.
///
/// Corpus statistics (document count, average length, document frequency)
/// are computed at construction from the texts passed in, so every search
/// sees the live corpus. Scoring follows
///
/// ```text
/// score = (1 / |Q|) * sum over query tokens t present in the document of
///   IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl / avgdl))
/// ```
///
/// with `IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1)`, clamped to `[0, 1]`.
/// The result is an approximation for blending with cosine scores, not a
/// calibrated probability or a true (unbounded) BM25 score.
///
/// `df` counts documents whose lowercased text *contains* the token as a
/// substring, so short tokens such as `cat` also count documents containing
/// `category`. Term frequency uses exact token matches.
#[derive(Debug, Clone)]
pub struct Bm25Scorer {
    query_tokens: Vec<String>,
    idf: HashMap<String, f64>,
    docs: Vec<DocStats>,
    avg_doc_length: f64,
}

impl Bm25Scorer {
    /// Compute corpus statistics for `query` over `corpus`.
    ///
    /// Documents are addressed by their index in `corpus`.
    pub fn new<S: AsRef<str>>(query: &str, corpus: &[S]) -> Self {
        let query_tokens = tokenize(query);
        let n = corpus.len() as f64;

        let mut idf: HashMap<String, f64> = HashMap::new();
        let mut docs = Vec::with_capacity(corpus.len());
        let mut total_length = 0.0;

        let query_terms: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
        let lowered: Vec<String> = corpus.iter().map(|t| t.as_ref().to_lowercase()).collect();

        for text in &lowered {
            let tokens: Vec<&str> = text.split_whitespace().collect();
            let mut term_freq: HashMap<String, f64> = HashMap::new();
            for token in &tokens {
                if query_terms.contains(token) {
                    *term_freq.entry((*token).to_string()).or_insert(0.0) += 1.0;
                }
            }
            total_length += tokens.len() as f64;
            docs.push(DocStats {
                length: tokens.len() as f64,
                term_freq,
            });
        }

        for token in &query_tokens {
            if idf.contains_key(token) {
                continue;
            }
            let df = lowered.iter().filter(|text| text.contains(token.as_str())).count() as f64;
            // Robertson's IDF, always positive
            let value = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            idf.insert(token.clone(), value);
        }

        let avg_doc_length = if docs.is_empty() {
            0.0
        } else {
            total_length / n
        };

        Self {
            query_tokens,
            idf,
            docs,
            avg_doc_length,
        }
    }

    /// True when the query has no tokens; every document then scores 0.
    pub fn is_empty_query(&self) -> bool {
        self.query_tokens.is_empty()
    }

    /// Number of documents in the corpus snapshot.
    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    /// Mean token count across the corpus snapshot.
    pub fn avg_doc_length(&self) -> f64 {
        self.avg_doc_length
    }

    /// Normalized score of document `doc` in `[0, 1]`. Unknown indexes score 0.
    pub fn score(&self, doc: usize) -> f32 {
        let Some(stats) = self.docs.get(doc) else {
            return 0.0;
        };
        if self.query_tokens.is_empty() {
            return 0.0;
        }

        let avgdl = if self.avg_doc_length > 0.0 {
            self.avg_doc_length
        } else {
            1.0
        };

        let mut raw = 0.0;
        for token in &self.query_tokens {
            let tf = stats.term_freq.get(token).copied().unwrap_or(0.0);
            if tf == 0.0 {
                continue;
            }
            let idf = self.idf.get(token).copied().unwrap_or(0.0);
            let numerator = tf * (K1 + 1.0);
            let denominator = tf + K1 * (1.0 - B + B * stats.length / avgdl);
            raw += idf * numerator / denominator;
        }

        let normalized = raw / self.query_tokens.len() as f64;
        (normalized as f32).clamp(0.0, 1.0)
    }

    /// Scores for every document, in corpus order.
    pub fn scores(&self) -> Vec<f32> {
        (0..self.docs.len()).map(|doc| self.score(doc)).collect()
    }
}
