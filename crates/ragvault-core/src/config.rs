use crate::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration, usually read from a `ragvault.toml` file.
///
/// Every field is optional in the file; missing fields take the defaults
/// below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    /// JSONL file backing the chunk store. `None` keeps chunks in memory.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Number of chunks placed in the generation context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Blend lexical relevance into query-time ranking.
    #[serde(default)]
    pub use_hybrid: bool,
    /// Maximum characters per ingested chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Label context blocks with their source and ask for citations.
    #[serde(default)]
    pub cite_sources: bool,
    /// Number of previous exchanges rendered into conversational prompts.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_top_k() -> usize {
    3
}

fn default_chunk_size() -> usize {
    500
}

fn default_max_history() -> usize {
    5
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            top_k: default_top_k(),
            use_hybrid: false,
            chunk_size: default_chunk_size(),
            cite_sources: false,
            max_history: default_max_history(),
        }
    }
}

impl RagConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(data: &str) -> RagResult<Self> {
        let config: Self = toml::from_str(data)
            .map_err(|e| RagError::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> RagResult<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&data)
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> RagResult<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than 0".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
