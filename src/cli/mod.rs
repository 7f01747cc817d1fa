//! CLI module for docqa
//!
//! Handles command-line argument parsing and answer rendering.

pub mod args;
pub mod output;

pub use args::{Args, Commands, EmbedderChoice, LlmChoice, Verbosity};
pub use output::{render_answer, render_sources, BANNER_BOTTOM, BANNER_TOP};
