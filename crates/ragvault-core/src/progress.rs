use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress notifications emitted while loading models and ingesting
/// documents.
///
/// Events are delivered in the order the work happens. Sending never blocks;
/// a dropped receiver simply stops observing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A free-form message from a collaborator that is loading (e.g. a model download).
    Loading {
        /// Human-readable status line.
        message: String,
    },

    /// The store is being cleared before a new document is ingested.
    Clearing,

    /// The document was split into `chunks` pieces.
    Parsed {
        /// Number of chunks produced by the parser.
        chunks: usize,
    },

    /// Chunk `current` of `total` (1-based) is being embedded and stored.
    Embedding {
        /// 1-based position of the chunk being processed.
        current: usize,
        /// Total number of chunks in the document.
        total: usize,
    },

    /// Ingestion finished; `chunks` chunks were stored.
    Complete {
        /// Number of chunks stored.
        chunks: usize,
    },
}

/// Sending half of a progress channel.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Sends `event` if a listener is attached; a closed channel is ignored.
pub fn report(progress: Option<&ProgressSender>, event: ProgressEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}
