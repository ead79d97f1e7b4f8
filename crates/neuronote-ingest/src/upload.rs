//! Blob storage for uploaded documents under `data/uploads/`.

use std::path::{Path, PathBuf};

use neuronote_core::{Error, Result};
use tracing::{debug, warn};

use crate::file::FileType;

/// Strip directory components from a client-supplied file name.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.replace(['/', '\\'], "").replace("..", "");
    let name = name.trim();
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("unnamed")
        .to_string()
}

/// Write `bytes` to `<uploads_dir>/<key>.<ext>`, where `ext` comes from the
/// original file name. Rejects empty bodies and unsupported types.
pub fn save_upload(uploads_dir: &Path, key: &str, original_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    if bytes.is_empty() {
        return Err(Error::Validation("Uploaded file is empty".into()));
    }
    let safe_name = sanitize_filename(original_name);
    let ext = Path::new(&safe_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !FileType::from_extension(&ext).is_supported() {
        return Err(Error::Validation(format!(
            "Unsupported file type: {} (expected .pdf, .txt or .md)",
            safe_name
        )));
    }

    std::fs::create_dir_all(uploads_dir)?;
    let path = uploads_dir.join(format!("{}.{}", key, ext));
    std::fs::write(&path, bytes)?;
    debug!("Stored upload {} ({} bytes) at {}", safe_name, bytes.len(), path.display());
    Ok(path)
}

/// Remove a stored blob. A blob that is already gone is not an error.
pub fn remove_blob(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Blob already missing: {}", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("lecture 1.pdf"), "lecture 1.pdf");
        assert_eq!(sanitize_filename("..\\"), "unnamed");
        assert_eq!(sanitize_filename(""), "unnamed");
    }

    #[test]
    fn test_save_and_remove() {
        let dir = TempDir::new().unwrap();
        let path = save_upload(dir.path(), "abc123", "Lecture.PDF", b"%PDF-1.4").unwrap();
        assert_eq!(path, dir.path().join("abc123.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");

        remove_blob(&path).unwrap();
        assert!(!path.exists());
        remove_blob(&path).unwrap();
    }

    #[test]
    fn test_rejects_bad_uploads() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            save_upload(dir.path(), "k", "virus.exe", b"MZ"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            save_upload(dir.path(), "k", "empty.pdf", b""),
            Err(Error::Validation(_))
        ));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
