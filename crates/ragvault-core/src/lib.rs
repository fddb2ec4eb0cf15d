//! Core types and error definitions for the ragvault retrieval engine.
//!
//! This crate provides the types shared by the storage, retrieval and
//! pipeline crates.
//!
//! # Main types
//!
//! - [`RagError`] — Unified error enum for all ragvault operations.
//! - [`RagResult`] — Convenience alias for `Result<T, RagError>`.
//! - [`Chunk`] — A retrievable piece of text with its embedding and provenance.
//! - [`MetadataValue`] — Scalar value carried in chunk metadata.
//! - [`SearchResult`] — A chunk paired with its relevance score.
//! - [`RagConfig`] — TOML-backed engine configuration.
//! - [`ProgressEvent`] — Progress notifications for loading and ingestion.

/// Engine configuration loaded from TOML.
pub mod config;
/// Error type and result alias.
pub mod error;
/// Progress events for long-running collaborator work.
pub mod progress;

pub use config::RagConfig;
pub use error::{RagError, RagResult};
pub use progress::{ProgressEvent, ProgressSender};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// --- Chunk types ---

/// A scalar metadata value. Never interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// An integral number, e.g. a page number.
    Integer(i64),
    /// A floating-point number.
    Float(f64),
    /// A string, e.g. a source filename.
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// A unit of retrievable text.
///
/// Chunks are immutable once stored; the only way to remove one is to clear
/// the whole store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Caller-assigned id, unique within a store (e.g. `report.pdf-12`).
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Dense embedding; every chunk in a store shares one dimensionality.
    pub embedding: Vec<f32>,
    /// Opaque provenance passed through untouched.
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
}

impl Chunk {
    /// Creates a chunk without metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry. Chainable builder method.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Checks the record invariants: non-empty id and text, and a non-empty
    /// embedding of finite values.
    pub fn validate(&self) -> RagResult<()> {
        if self.id.is_empty() {
            return Err(RagError::InvalidArgument("Chunk id is empty".to_string()));
        }
        if self.text.is_empty() {
            return Err(RagError::InvalidArgument(format!(
                "Chunk {} has empty text",
                self.id
            )));
        }
        if self.embedding.is_empty() {
            return Err(RagError::InvalidArgument(format!(
                "Chunk {} has an empty embedding",
                self.id
            )));
        }
        if let Some(pos) = self.embedding.iter().position(|x| !x.is_finite()) {
            return Err(RagError::InvalidArgument(format!(
                "Chunk {} has a non-finite embedding value at index {pos}",
                self.id
            )));
        }
        Ok(())
    }
}

// --- Search types ---

/// A retrieved chunk and its score. Higher is better.
///
/// Cosine scores lie in `[-1, 1]`; lexical and hybrid scores are clamped to
/// `[0, 1]`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The stored chunk, shared with the store.
    pub chunk: Arc<Chunk>,
    /// Relevance score.
    pub score: f32,
}
