//! Command-line argument parsing for docqa
//!
//! Provides clap-based CLI with a `config` subcommand and verbosity control.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, EmbeddingBackend, LlmBackend};
use crate::embedding::local::DEFAULT_LOCAL_MODEL;

/// Default document, relative to the working directory
pub const DEFAULT_DOCUMENT: &str = "./Generative_AI_Overview.pdf";

/// Default question
pub const DEFAULT_QUESTION: &str = "What are the limitations of generative AI models?";

/// docqa - Answer questions about a document with retrieval-augmented generation
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(version)]
#[command(about = "Answer questions about a PDF or text document", long_about = None)]
pub struct Args {
    /// Document to query (.pdf, .txt or .md)
    #[arg(value_name = "FILE", default_value = DEFAULT_DOCUMENT)]
    pub file: PathBuf,

    /// Question to ask about the document
    #[arg(value_name = "QUESTION", default_value = DEFAULT_QUESTION)]
    pub question: String,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Generation backend
    #[arg(long, value_enum)]
    pub llm: Option<LlmChoice>,

    /// Embedding backend
    #[arg(long, value_enum)]
    pub embedder: Option<EmbedderChoice>,

    /// Verbosity level: -v shows sources, -vv adds debug logs
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only the answer)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print the effective configuration as TOML
    Config,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmChoice {
    Watsonx,
    Ollama,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderChoice {
    Ollama,
    Local,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }

        if let Some(llm) = self.llm {
            config.generation.backend = match llm {
                LlmChoice::Watsonx => LlmBackend::Watsonx,
                LlmChoice::Ollama => LlmBackend::Ollama,
            };
        }

        if let Some(embedder) = self.embedder {
            let backend = match embedder {
                EmbedderChoice::Ollama => EmbeddingBackend::Ollama,
                EmbedderChoice::Local => EmbeddingBackend::Local,
            };
            // An Ollama model tag means nothing to the Hugging Face hub
            if backend == EmbeddingBackend::Local && config.embedding.backend != backend {
                config.embedding.model = DEFAULT_LOCAL_MODEL.to_string();
            }
            config.embedding.backend = backend;
        }
    }
}

impl Verbosity {
    /// Default tracing filter directive
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::VeryVerbose => "trace",
        }
    }

    /// Check if should show the progress spinner
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should print retrieved sources
    pub fn show_sources(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("docqa").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.file, PathBuf::from(DEFAULT_DOCUMENT));
        assert_eq!(args.question, DEFAULT_QUESTION);
        assert_eq!(args.verbosity(), Verbosity::Normal);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_positionals() {
        let args = parse(&["paper.pdf", "What is attention?"]);
        assert_eq!(args.file, PathBuf::from("paper.pdf"));
        assert_eq!(args.question, "What is attention?");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["-q"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["-v"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["-vv"]).verbosity(), Verbosity::VeryVerbose);
        assert!(Args::try_parse_from(["docqa", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_log_filters() {
        assert_eq!(Verbosity::Quiet.log_filter(), "warn");
        assert_eq!(Verbosity::Normal.log_filter(), "info");
        assert_eq!(Verbosity::Verbose.log_filter(), "debug");
        assert_eq!(Verbosity::VeryVerbose.log_filter(), "trace");
    }

    #[test]
    fn test_config_subcommand() {
        let args = parse(&["config"]);
        assert_eq!(args.command, Some(Commands::Config));
    }

    #[test]
    fn test_overrides() {
        let args = parse(&["doc.txt", "q", "--top-k", "7", "--llm", "ollama", "--embedder", "local"]);
        let mut config = Config::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.retrieval.top_k, 7);
        assert_eq!(config.generation.backend, LlmBackend::Ollama);
        assert_eq!(config.embedding.backend, EmbeddingBackend::Local);
        assert_eq!(config.embedding.model, DEFAULT_LOCAL_MODEL);
    }

    #[test]
    fn test_no_overrides_leaves_config() {
        let mut config = Config::default();
        parse(&[]).apply_overrides(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_verbosity_methods() {
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Normal.show_progress());

        assert!(!Verbosity::Normal.show_sources());
        assert!(Verbosity::Verbose.show_sources());
    }
}
