//! Document ingestion and question answering on top of ragvault retrieval.
//!
//! A [`RagPipeline`] parses a document into chunks, embeds and stores them,
//! then answers questions by retrieving the closest chunks and handing a
//! prompt built around them to a [`TextGenerator`].
//!
//! # Main types
//!
//! - [`RagPipeline`] — Ingest and query orchestration.
//! - [`TextGenerator`] — Trait for the external generation model.
//! - [`GenerationEvent`] — Streamed partial and final answers.
//! - [`DocumentParser`] / [`PlainTextParser`] — Document chunking.
//! - [`ConversationTurn`] — An earlier question and answer.

/// Text generation trait and streaming events.
pub mod generation;
/// Document parsing into chunks.
pub mod parser;
/// Ingest and query orchestration.
pub mod pipeline;
/// Prompt construction.
pub mod prompt;

pub use generation::{GenerationEvent, GenerationSender, TextGenerator};
pub use parser::{DocumentParser, ParsedChunk, PlainTextParser};
pub use pipeline::{
    IngestReport, QueryAnswer, QueryOptions, QueryTimings, RagPipeline, EMPTY_STORE_ANSWER,
};
pub use prompt::{build_prompt, ConversationTurn};
