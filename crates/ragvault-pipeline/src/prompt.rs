use ragvault_core::SearchResult;
use serde::{Deserialize, Serialize};

/// Metadata key holding a chunk's 1-based page number.
pub const PAGE_NUMBER_KEY: &str = "pageNumber";

/// One earlier question and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The question asked.
    pub question: String,
    /// The answer given.
    pub answer: String,
}

impl ConversationTurn {
    /// Create a turn.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Build the generation prompt for `question` from retrieved `sources`.
///
/// Only the last `max_history` turns of `history` are included.
pub fn build_prompt(
    question: &str,
    sources: &[SearchResult],
    history: &[ConversationTurn],
    cite_sources: bool,
    max_history: usize,
) -> String {
    let mut prompt = String::new();

    let recent = &history[history.len().saturating_sub(max_history)..];
    if !recent.is_empty() {
        prompt.push_str("Previous conversation:\n");
        for turn in recent {
            prompt.push_str(&format!("Q: {}\nA: {}\n", turn.question, turn.answer));
        }
        prompt.push('\n');
    }

    let context = sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            if cite_sources {
                let page = source
                    .chunk
                    .metadata
                    .get(PAGE_NUMBER_KEY)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "?".to_string());
                format!("[Source {}, page {}]\n{}", i + 1, page, source.chunk.text)
            } else {
                source.chunk.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    prompt.push_str(&format!("Context:\n{context}\n\nQuestion: {question}\n\n"));
    if cite_sources {
        prompt.push_str("Cite the sources you use as [Source N].\n\n");
    }
    prompt.push_str("Answer:");
    prompt
}
