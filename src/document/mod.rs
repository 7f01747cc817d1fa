//! Document loading
//!
//! Turns a file on disk into an ordered sequence of page-level text units:
//! - PDF files via `pdf-extract`, one page per PDF page
//! - Plain text files, pages separated by form feeds

pub mod loader;
pub mod types;

pub use loader::DocumentLoader;
pub use types::{Document, Page};
