use std::sync::Arc;
use std::time::{Duration, Instant};

use ragvault_core::progress::report;
use ragvault_core::{
    Chunk, ProgressEvent, ProgressSender, RagConfig, RagError, RagResult, SearchResult,
};
use ragvault_memory::{open_store, EmbeddingProvider, RetrievalEngine};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::generation::{
    emit, GenerationEvent, GenerationSender, TextGenerator, EVENT_CHANNEL_CAPACITY,
};
use crate::parser::{DocumentParser, PlainTextParser};
use crate::prompt::{build_prompt, ConversationTurn, PAGE_NUMBER_KEY};

/// Answer returned when a question is asked before any document is ingested.
pub const EMPTY_STORE_ANSWER: &str = "Please upload a document first before asking questions.";

/// Per-query settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Blend BM25 with cosine similarity.
    pub use_hybrid: bool,
    /// Label context blocks and ask for citations.
    pub cite_sources: bool,
    /// Number of chunks to retrieve.
    pub top_k: usize,
    /// Earlier exchanges, oldest first.
    pub history: Vec<ConversationTurn>,
}

impl From<&RagConfig> for QueryOptions {
    fn from(config: &RagConfig) -> Self {
        Self {
            use_hybrid: config.use_hybrid,
            cite_sources: config.cite_sources,
            top_k: config.top_k,
            history: Vec::new(),
        }
    }
}

impl QueryOptions {
    /// Attach conversation history.
    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }
}

/// Outcome of [`RagPipeline::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Document name.
    pub name: String,
    /// Number of chunks stored.
    pub chunks: usize,
}

/// Time spent in each phase of a query. All zero when nothing was generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryTimings {
    /// Embedding the question.
    pub embedding: Duration,
    /// Ranking stored chunks.
    pub search: Duration,
    /// Generating the answer.
    pub generation: Duration,
}

/// A generated answer and the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct QueryAnswer {
    /// Generated text.
    pub answer: String,
    /// Retrieved chunks, best first.
    pub sources: Vec<SearchResult>,
    /// Per-phase durations.
    pub timings: QueryTimings,
}

/// Ingestion and question answering over a [`RetrievalEngine`].
///
/// Ingesting a document replaces whatever was stored before. Questions
/// are embedded, matched against the stored chunks and answered by the
/// [`TextGenerator`] from a prompt built around the best matches.
pub struct RagPipeline {
    engine: RetrievalEngine,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn TextGenerator>,
    parser: Arc<dyn DocumentParser>,
    config: RagConfig,
}

impl RagPipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        engine: RetrievalEngine,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
        parser: Arc<dyn DocumentParser>,
        config: RagConfig,
    ) -> Self {
        Self {
            engine,
            embedder,
            generator,
            parser,
            config,
        }
    }

    /// Build a pipeline whose store and parser follow `config`.
    pub fn from_config(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
    ) -> RagResult<Self> {
        config.validate()?;
        let engine = RetrievalEngine::new(open_store(&config));
        let parser = Arc::new(PlainTextParser::new(config.chunk_size));
        Ok(Self::new(engine, embedder, generator, parser, config))
    }

    /// The retrieval engine.
    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    /// The active configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Load the embedding and generation models, then open the store.
    pub async fn initialize(&self, progress: Option<&ProgressSender>) -> RagResult<()> {
        let start = Instant::now();
        self.embedder.load(progress).await?;
        self.generator.load(progress).await?;
        self.engine.initialize().await?;
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "RAG pipeline initialized"
        );
        Ok(())
    }

    /// Replace the stored document with `name`.
    pub async fn ingest(
        &self,
        name: &str,
        bytes: &[u8],
        progress: Option<&ProgressSender>,
    ) -> RagResult<IngestReport> {
        let start = Instant::now();

        report(progress, ProgressEvent::Clearing);
        self.engine.clear().await?;

        let parsed = self.parser.parse(name, bytes).await?;
        let total = parsed.len();
        report(progress, ProgressEvent::Parsed { chunks: total });
        if total == 0 {
            warn!(document = %name, "Document produced no text chunks");
        }

        let dimension = self.embedder.dimension();
        for (i, piece) in parsed.into_iter().enumerate() {
            report(
                progress,
                ProgressEvent::Embedding {
                    current: i + 1,
                    total,
                },
            );
            let embedding = self.embedder.embed(&piece.text).await?;
            if embedding.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }

            let chunk = Chunk::new(format!("{name}-{}", piece.chunk_index), piece.text, embedding)
                .with_metadata("filename", name)
                .with_metadata("chunkIndex", piece.chunk_index)
                .with_metadata(PAGE_NUMBER_KEY, piece.page_number);
            self.engine.add(chunk).await?;
        }

        report(progress, ProgressEvent::Complete { chunks: total });
        info!(
            document = %name,
            chunks = total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Document ingested"
        );

        Ok(IngestReport {
            name: name.to_string(),
            chunks: total,
        })
    }

    /// Answer `question` from the stored document.
    ///
    /// Partial answers are sent to `events` as they are generated, followed
    /// by a single `Done` or `Error` event.
    pub async fn query(
        &self,
        question: &str,
        options: &QueryOptions,
        events: Option<&GenerationSender>,
    ) -> RagResult<QueryAnswer> {
        match self.answer(question, options, events).await {
            Ok(answer) => {
                emit(
                    events,
                    GenerationEvent::Done {
                        text: answer.answer.clone(),
                    },
                )
                .await;
                Ok(answer)
            }
            Err(e) => {
                emit(
                    events,
                    GenerationEvent::Error {
                        message: e.to_string(),
                    },
                )
                .await;
                Err(e)
            }
        }
    }

    /// Run [`query`](Self::query) on a background task.
    ///
    /// Events arrive on the returned receiver; the handle resolves to the
    /// final answer.
    pub fn query_stream(
        self: Arc<Self>,
        question: String,
        options: QueryOptions,
    ) -> (
        mpsc::Receiver<GenerationEvent>,
        JoinHandle<RagResult<QueryAnswer>>,
    ) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(async move { self.query(&question, &options, Some(&tx)).await });
        (rx, handle)
    }

    async fn answer(
        &self,
        question: &str,
        options: &QueryOptions,
        events: Option<&GenerationSender>,
    ) -> RagResult<QueryAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }

        if self.engine.count().await? == 0 {
            debug!("Query against empty store");
            return Ok(QueryAnswer {
                answer: EMPTY_STORE_ANSWER.to_string(),
                sources: Vec::new(),
                timings: QueryTimings::default(),
            });
        }

        let mut timings = QueryTimings::default();

        let phase = Instant::now();
        let query_embedding = self.embedder.embed(question).await?;
        timings.embedding = phase.elapsed();

        let phase = Instant::now();
        let sources = self
            .engine
            .search(&query_embedding, options.top_k, options.use_hybrid, question)
            .await?;
        timings.search = phase.elapsed();

        let prompt = build_prompt(
            question,
            &sources,
            &options.history,
            options.cite_sources,
            self.config.max_history,
        );
        let phase = Instant::now();
        let answer = self.generator.generate(&prompt, events).await?;
        timings.generation = phase.elapsed();

        info!(
            sources = sources.len(),
            hybrid = options.use_hybrid,
            embedding_ms = timings.embedding.as_millis() as u64,
            search_ms = timings.search.as_millis() as u64,
            generation_ms = timings.generation.as_millis() as u64,
            "Question answered"
        );

        Ok(QueryAnswer {
            answer,
            sources,
            timings,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragvault_core::MetadataValue;
    use ragvault_memory::{ChunkStore, InMemoryChunkStore, LocalEmbedding};
    use tokio::sync::Mutex;

    /// Echoes the prompt back and records it.
    #[derive(Default)]
    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(
            &self,
            prompt: &str,
            events: Option<&GenerationSender>,
        ) -> RagResult<String> {
            self.prompts.lock().await.push(prompt.to_string());
            emit(
                events,
                GenerationEvent::Partial {
                    text: "echo".into(),
                },
            )
            .await;
            Ok("echo".to_string())
        }
    }

    fn pipeline(generator: Arc<EchoGenerator>) -> RagPipeline {
        RagPipeline::new(
            RetrievalEngine::new(Arc::new(InMemoryChunkStore::new())),
            Arc::new(LocalEmbedding::default()),
            generator,
            Arc::new(PlainTextParser::new(20)),
            RagConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_ingest_ids_and_metadata() {
        let p = pipeline(Arc::new(EchoGenerator::default()));
        let report = p
            .ingest("notes.txt", b"first page text\x0csecond page", None)
            .await
            .unwrap();
        assert_eq!(report.chunks, 2);

        let chunks = p.engine().store().scan_all().await.unwrap();
        assert_eq!(chunks[0].id, "notes.txt-0");
        assert_eq!(chunks[1].id, "notes.txt-1");
        assert_eq!(
            chunks[1].metadata.get("pageNumber"),
            Some(&MetadataValue::Integer(2))
        );
        assert_eq!(
            chunks[1].metadata.get("filename"),
            Some(&MetadataValue::Text("notes.txt".into()))
        );
    }

    #[tokio::test]
    async fn test_ingest_replaces_previous_document() {
        let p = pipeline(Arc::new(EchoGenerator::default()));
        p.ingest("a.txt", b"alpha alpha alpha alpha alpha", None)
            .await
            .unwrap();
        p.ingest("b.txt", b"beta", None).await.unwrap();

        let chunks = p.engine().store().scan_all().await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "b.txt-0");
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let p = pipeline(Arc::new(EchoGenerator::default()));
        let options = QueryOptions::from(p.config());
        let err = p.query("   ", &options, None).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_empty_store_skips_generator() {
        let generator = Arc::new(EchoGenerator::default());
        let p = pipeline(Arc::clone(&generator));
        let options = QueryOptions::from(p.config());

        let answer = p.query("anything?", &options, None).await.unwrap();
        assert_eq!(answer.answer, EMPTY_STORE_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(generator.prompts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_query_builds_prompt_from_sources() {
        let generator = Arc::new(EchoGenerator::default());
        let p = pipeline(Arc::clone(&generator));
        p.ingest("doc.txt", b"torque specs here", None).await.unwrap();

        let options = QueryOptions::from(p.config());
        let answer = p.query("torque specs?", &options, None).await.unwrap();
        assert_eq!(answer.answer, "echo");
        assert_eq!(answer.sources.len(), 1);

        let prompts = generator.prompts.lock().await;
        assert_eq!(
            prompts[0],
            "Context:\ntorque specs here\n\nQuestion: torque specs?\n\nAnswer:"
        );
    }

    /// Takes a fixed time to answer.
    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _events: Option<&GenerationSender>,
        ) -> RagResult<String> {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok("slow".to_string())
        }
    }

    #[tokio::test]
    async fn test_query_times_each_phase_separately() {
        let p = RagPipeline::new(
            RetrievalEngine::new(Arc::new(InMemoryChunkStore::new())),
            Arc::new(LocalEmbedding::default()),
            Arc::new(SlowGenerator),
            Arc::new(PlainTextParser::new(20)),
            RagConfig::default(),
        );
        p.ingest("doc.txt", b"torque specs here", None).await.unwrap();

        let options = QueryOptions::from(p.config());
        let answer = p.query("torque?", &options, None).await.unwrap();
        let timings = answer.timings;

        assert!(timings.generation >= Duration::from_millis(40));
        assert!(timings.embedding < timings.generation);
        assert!(timings.search < timings.generation);
    }

    #[tokio::test]
    async fn test_empty_store_has_zero_timings() {
        let p = pipeline(Arc::new(EchoGenerator::default()));
        let options = QueryOptions::from(p.config());
        let answer = p.query("anything?", &options, None).await.unwrap();
        assert_eq!(answer.timings, QueryTimings::default());
    }

    #[tokio::test]
    async fn test_query_options_from_config() {
        let config = RagConfig {
            top_k: 7,
            use_hybrid: true,
            ..RagConfig::default()
        };
        let options = QueryOptions::from(&config);
        assert_eq!(options.top_k, 7);
        assert!(options.use_hybrid);
        assert!(!options.cite_sources);
        assert!(options.history.is_empty());
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid() {
        let config = RagConfig {
            top_k: 0,
            ..RagConfig::default()
        };
        let result = RagPipeline::from_config(
            config,
            Arc::new(LocalEmbedding::default()),
            Arc::new(EchoGenerator::default()),
        );
        assert!(result.is_err());
    }
}
