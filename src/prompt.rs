//! "Stuff" prompt assembly
//!
//! Every retrieved chunk is inserted verbatim ahead of the question. An
//! optional token budget caps how much context is stuffed in.

use serde::{Deserialize, Serialize};

use crate::config::PromptConfig;
use crate::index::ScoredChunk;

/// Instruction placed before the retrieved context
pub const STUFF_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const CHUNK_SEPARATOR: &str = "\n\n";

/// Estimate token count for text: ⌈chars / 4⌉
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

/// Prompt ready for the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub text: String,
    /// Number of retrieved chunks that made it into the prompt
    pub included: usize,
    /// Estimated tokens for the whole prompt
    pub estimated_tokens: usize,
}

/// Builds stuff prompts from scored chunks
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    max_context_tokens: Option<usize>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self {
            max_context_tokens: config.max_context_tokens,
        }
    }

    pub fn with_budget(max_context_tokens: usize) -> Self {
        Self {
            max_context_tokens: Some(max_context_tokens),
        }
    }

    pub fn max_context_tokens(&self) -> Option<usize> {
        self.max_context_tokens
    }

    /// Build the prompt. Chunks are taken in the given (score) order; with a
    /// budget, the first chunk is always kept and later chunks stop at the
    /// first one that would overflow.
    pub fn build(&self, question: &str, chunks: &[ScoredChunk]) -> BuiltPrompt {
        let mut context_parts: Vec<&str> = Vec::with_capacity(chunks.len());
        let mut context_tokens = 0;

        for scored in chunks {
            let chunk_tokens = estimate_tokens(&scored.chunk.text);

            if let Some(budget) = self.max_context_tokens {
                if !context_parts.is_empty() && context_tokens + chunk_tokens > budget {
                    break;
                }
            }

            context_parts.push(&scored.chunk.text);
            context_tokens += chunk_tokens;
        }

        let text = format!(
            "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
            STUFF_PREAMBLE,
            context_parts.join(CHUNK_SEPARATOR),
            question
        );

        BuiltPrompt {
            estimated_tokens: estimate_tokens(&text),
            included: context_parts.len(),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;

    fn scored(id: usize, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id,
                source_page: 0,
                text: text.to_string(),
                start_offset: id * 10,
            },
            score,
        }
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
        // chars, not bytes
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_stuff_template() {
        let prompt = PromptBuilder::new().build(
            "What is X?",
            &[scored(0, "X is a letter.", 0.9), scored(1, "Y follows X.", 0.5)],
        );

        let expected = format!(
            "{}\n\nX is a letter.\n\nY follows X.\n\nQuestion: What is X?\nHelpful Answer:",
            STUFF_PREAMBLE
        );
        assert_eq!(prompt.text, expected);
        assert_eq!(prompt.included, 2);
        assert_eq!(prompt.estimated_tokens, estimate_tokens(&expected));
    }

    #[test]
    fn test_chunk_text_inserted_verbatim() {
        let raw = "  odd {braces} and\nnewlines  ";
        let prompt = PromptBuilder::new().build("q", &[scored(0, raw, 1.0)]);
        assert!(prompt.text.contains(raw));
    }

    #[test]
    fn test_budget_stops_at_overflow() {
        let chunks = vec![
            scored(0, &"a".repeat(40), 0.9), // 10 tokens
            scored(1, &"b".repeat(40), 0.8), // 10 tokens
            scored(2, &"c".repeat(8), 0.7),  // 2 tokens
        ];

        let prompt = PromptBuilder::with_budget(15).build("q", &chunks);
        assert_eq!(prompt.included, 1);
        assert!(!prompt.text.contains('b'));
        assert!(!prompt.text.contains("cccc"));

        let prompt = PromptBuilder::with_budget(20).build("q", &chunks);
        assert_eq!(prompt.included, 2);
    }

    #[test]
    fn test_budget_always_keeps_first_chunk() {
        let chunks = vec![scored(0, &"z".repeat(400), 0.9)];
        let prompt = PromptBuilder::with_budget(1).build("q", &chunks);
        assert_eq!(prompt.included, 1);
        assert!(prompt.text.contains(&"z".repeat(400)));
    }

    #[test]
    fn test_no_budget_includes_everything() {
        let chunks: Vec<ScoredChunk> = (0..10)
            .map(|i| scored(i, &"w".repeat(1000), 1.0 - i as f32 * 0.01))
            .collect();
        let prompt = PromptBuilder::from_config(&PromptConfig::default()).build("q", &chunks);
        assert_eq!(prompt.included, 10);
        assert!(prompt.estimated_tokens > 2500);
    }
}
