//! Text extraction from uploaded study material.

use neuronote_core::{Error, Result};
use std::path::Path;

/// File types accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    PlainText,
    Markdown,
    Pdf,
    Unknown,
}

impl FileType {
    /// Detect file type from extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Self::PlainText,
            "md" | "markdown" => Self::Markdown,
            "pdf" => Self::Pdf,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Turns a stored document into plain text for summarization.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Reads text and markdown directly and PDFs through `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let text = match FileType::from_path(path) {
            FileType::PlainText | FileType::Markdown => read_text(path)?,
            FileType::Pdf => extract_pdf(path)?,
            FileType::Unknown => {
                return Err(Error::ExtractionFailed(format!(
                    "Unsupported file type: {}",
                    path.display()
                )))
            }
        };
        tracing::debug!("Extracted {} chars from {}", text.len(), path.display());
        Ok(text)
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::ExtractionFailed(format!("Could not read {}: {}", path.display(), e)))
}

fn extract_pdf(path: &Path) -> Result<String> {
    // pdf-extract panics on some malformed inputs.
    match std::panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(Error::ExtractionFailed(format!(
            "Could not read PDF {}: {}",
            path.display(),
            e
        ))),
        Err(_) => {
            tracing::warn!("PDF parser panicked on {}", path.display());
            Err(Error::ExtractionFailed(format!(
                "Could not read PDF {}",
                path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension("md"), FileType::Markdown);
        assert_eq!(FileType::from_extension("txt"), FileType::PlainText);
        assert_eq!(FileType::from_extension("exe"), FileType::Unknown);
        assert!(!FileType::from_path(Path::new("noext")).is_supported());
    }

    #[test]
    fn test_extract_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Cells\nMitochondria make ATP.").unwrap();
        let text = FileExtractor.extract(&path).unwrap();
        assert!(text.contains("Mitochondria"));
    }

    #[test]
    fn test_unsupported_and_broken_files() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("blob.bin");
        std::fs::write(&bin, [0u8, 1, 2]).unwrap();
        assert!(matches!(
            FileExtractor.extract(&bin),
            Err(Error::ExtractionFailed(_))
        ));

        let latin1 = dir.path().join("latin1.txt");
        std::fs::write(&latin1, b"caf\xe9 notes about cells").unwrap();
        assert!(matches!(
            FileExtractor.extract(&latin1),
            Err(Error::ExtractionFailed(m)) if m.contains("latin1.txt")
        ));

        assert!(matches!(
            FileExtractor.extract(&dir.path().join("missing.md")),
            Err(Error::ExtractionFailed(_))
        ));

        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"not really a pdf").unwrap();
        assert!(matches!(
            FileExtractor.extract(&pdf),
            Err(Error::ExtractionFailed(_))
        ));
    }
}
