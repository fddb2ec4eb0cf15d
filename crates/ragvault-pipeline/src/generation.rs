use async_trait::async_trait;
use ragvault_core::{ProgressSender, RagResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while an answer is being generated.
///
/// `Partial` events arrive in generation order and carry the whole answer
/// so far, so the latest one can replace whatever the consumer displays.
/// Exactly one `Done` or `Error` ends the stream; `Done` carries the final
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// The answer generated so far.
    Partial {
        /// Cumulative text.
        text: String,
    },

    /// Generation finished.
    Done {
        /// The final answer.
        text: String,
    },

    /// Generation failed.
    Error {
        /// Failure description.
        message: String,
    },
}

/// Sending half of a generation event channel.
pub type GenerationSender = mpsc::Sender<GenerationEvent>;

/// Channel capacity used for streamed queries.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Sends `event` if a listener is attached.
///
/// A dropped receiver is not an error: the consumer has simply stopped
/// listening, and generation carries on to completion.
pub async fn emit(events: Option<&GenerationSender>, event: GenerationEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

/// Trait for the external text-generation model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Prepare the model, reporting status lines as progress events.
    /// The default does nothing.
    async fn load(&self, progress: Option<&ProgressSender>) -> RagResult<()> {
        let _ = progress;
        Ok(())
    }

    /// Generate a completion for `prompt`.
    ///
    /// Implementations send [`GenerationEvent::Partial`] updates to `events`
    /// as text is produced and return the final text. The caller emits the
    /// terminating `Done` / `Error` event.
    async fn generate(&self, prompt: &str, events: Option<&GenerationSender>) -> RagResult<String>;
}
