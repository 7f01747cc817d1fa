//! Answer rendering for the terminal

use colored::*;

use crate::pipeline::Answer;

pub const BANNER_TOP: &str =
    "--------------------------------- Generated response -----------------------------------";

pub const BANNER_BOTTOM_WIDTH: usize = 93;

/// Closing banner: a line of 93 `*`
pub const BANNER_BOTTOM: &str = "*********************************************************************************************";

const EXCERPT_CHARS: usize = 160;

/// Answer text between the banners
pub fn render_answer(answer: &Answer) -> String {
    format!(
        "{}\n{}\n{}",
        BANNER_TOP.cyan(),
        answer.text.trim(),
        BANNER_BOTTOM.cyan()
    )
}

/// One line per retrieved chunk, best match first
pub fn render_sources(answer: &Answer) -> String {
    let mut lines = vec![format!("{}", "Sources:".bold())];

    for (rank, (chunk, score)) in answer
        .source_chunks
        .iter()
        .zip(&answer.scores)
        .enumerate()
    {
        lines.push(format!(
            "  [{}] page {} (score {:.4}): {}",
            rank + 1,
            chunk.source_page + 1,
            score,
            excerpt(&chunk.text).dimmed()
        ));
    }

    let stats = &answer.stats;
    lines.push(format!(
        "{}",
        format!(
            "  {} chunks, dim {}, ~{} prompt tokens, {:.2}s",
            stats.chunk_count,
            stats.embedding_dim,
            stats.prompt_tokens,
            stats.total_duration().as_secs_f64()
        )
        .dimmed()
    ));

    lines.join("\n")
}

/// First line of the chunk, shortened
fn excerpt(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;
    use crate::pipeline::RunStats;

    fn answer() -> Answer {
        Answer {
            text: "  They hallucinate.\n".to_string(),
            source_chunks: vec![Chunk {
                id: 3,
                source_page: 1,
                text: "Models may\nhallucinate facts.".to_string(),
                start_offset: 2700,
            }],
            scores: vec![0.8125],
            stats: RunStats::default(),
        }
    }

    #[test]
    fn test_banner_widths() {
        assert_eq!(BANNER_BOTTOM.len(), BANNER_BOTTOM_WIDTH);
        assert!(BANNER_BOTTOM.chars().all(|c| c == '*'));
        assert!(BANNER_TOP.contains(" Generated response "));
    }

    #[test]
    fn test_render_answer() {
        colored::control::set_override(false);
        let rendered = render_answer(&answer());
        assert_eq!(
            rendered,
            format!("{}\nThey hallucinate.\n{}", BANNER_TOP, BANNER_BOTTOM)
        );
    }

    #[test]
    fn test_render_sources() {
        colored::control::set_override(false);
        let rendered = render_sources(&answer());
        assert!(rendered.contains("[1] page 2 (score 0.8125): Models may hallucinate facts."));
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "word ".repeat(100);
        let short = excerpt(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), EXCERPT_CHARS + 3);
    }
}
