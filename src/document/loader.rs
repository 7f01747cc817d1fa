//! File loader for PDF and plain-text documents
//!
//! PDF extraction is CPU-bound and the parser can panic on malformed input,
//! so it runs on a blocking task. A panic surfaces as a join error and is
//! reported as a parse failure.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::document::types::Document;
use crate::errors::{QaError, Result};

/// Form feed separates pages in plain-text input
pub const PAGE_BREAK: char = '\x0C';

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    /// Detect format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" | "text" | "md" => Some(DocumentFormat::Text),
            _ => None,
        }
    }
}

/// Loads documents from disk
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    timeout: Duration,
}

impl DocumentLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Load a document, failing with `NotFound` or `Parse`
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<Document> {
        let path = path.as_ref().to_path_buf();

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(QaError::Parse(format!("{} is not a regular file", path.display())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QaError::NotFound { path })
            }
            Err(e) => return Err(QaError::Io(e)),
        }

        let format = DocumentFormat::from_path(&path).ok_or_else(|| {
            QaError::Parse(format!(
                "Unsupported file type: {} (expected .pdf, .txt or .md)",
                path.display()
            ))
        })?;

        debug!(path = %path.display(), ?format, "loading document");

        let pages = tokio::time::timeout(self.timeout, Self::read_pages(path.clone(), format))
            .await
            .map_err(|_| QaError::timeout("document load", self.timeout))??;

        let document = Document::from_pages(path, pages);
        info!(
            pages = document.page_count(),
            chars = document.char_count(),
            "document loaded"
        );
        Ok(document)
    }

    async fn read_pages(path: PathBuf, format: DocumentFormat) -> Result<Vec<String>> {
        let bytes = tokio::fs::read(&path).await?;

        match format {
            DocumentFormat::Pdf => {
                tokio::task::spawn_blocking(move || extract_pdf_pages(&bytes))
                    .await
                    .map_err(|e| QaError::Parse(format!("PDF parser crashed: {}", e)))?
            }
            DocumentFormat::Text => split_text_pages(bytes),
        }
    }
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| QaError::Parse(format!("PDF extraction failed: {}", e)))
}

/// Split UTF-8 text on form feeds. Empty input has zero pages.
fn split_text_pages(bytes: Vec<u8>) -> Result<Vec<String>> {
    let text = String::from_utf8(bytes)
        .map_err(|e| QaError::Parse(format!("File is not valid UTF-8: {}", e)))?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    Ok(text.split(PAGE_BREAK).map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.PDF")), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_path(Path::new("a.txt")), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_path(Path::new("notes.md")), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_path(Path::new("a.docx")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("README")), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let loader = DocumentLoader::default();
        let err = loader.load("/no/such/file.pdf").await.unwrap_err();
        assert!(matches!(err, QaError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_parse_error() {
        let file = write_temp(".docx", b"hello");
        let err = DocumentLoader::default().load(file.path()).await.unwrap_err();
        assert!(matches!(err, QaError::Parse(_)));
    }

    #[tokio::test]
    async fn test_text_pages_split_on_form_feed() {
        let file = write_temp(".txt", b"first page\x0Csecond page\x0Cthird");
        let doc = DocumentLoader::default().load(file.path()).await.unwrap();

        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages()[0].text, "first page");
        assert_eq!(doc.pages()[1].text, "second page");
        assert_eq!(doc.pages()[2].index, 2);
    }

    #[tokio::test]
    async fn test_empty_text_file_has_no_pages() {
        let file = write_temp(".txt", b"");
        let doc = DocumentLoader::default().load(file.path()).await.unwrap();
        assert_eq!(doc.page_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_parse_error() {
        let file = write_temp(".txt", &[0xff, 0xfe, 0x00, 0x80]);
        let err = DocumentLoader::default().load(file.path()).await.unwrap_err();
        assert!(matches!(err, QaError::Parse(_)));
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_parse_error() {
        let file = write_temp(".pdf", b"this is not a pdf at all");
        let err = DocumentLoader::default().load(file.path()).await.unwrap_err();
        assert!(matches!(err, QaError::Parse(_)));
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentLoader::default().load(dir.path()).await.unwrap_err();
        assert!(matches!(err, QaError::Parse(_)));
    }
}
