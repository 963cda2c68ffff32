//! Storage helpers for invoice files on disk.
//!
//! Binary content is never stored in the database; files are written to
//! the uploads directory under a UUID-prefixed name and only the path is
//! recorded on the invoice.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create uploads directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),
}

/// A file persisted to the uploads directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    /// SHA-256 of the content, recorded in audit metadata.
    pub content_hash: String,
    pub size: u64,
}

/// Compute the SHA-256 hash of file content.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Extract the extension from a filename, defaulting to `bin`.
pub fn file_extension(filename: &str) -> &str {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin")
}

/// Writes invoice files into the uploads directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    uploads_dir: PathBuf,
}

impl FileStore {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Save content under a UUID-prefixed name, preserving the original
    /// extension to keep downstream tooling working.
    pub fn save(&self, content: &[u8], original_filename: &str) -> Result<StoredFile, StorageError> {
        std::fs::create_dir_all(&self.uploads_dir)
            .map_err(|e| StorageError::CreateDir(self.uploads_dir.clone(), e))?;

        let name = format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            file_extension(original_filename)
        );
        let path = self.uploads_dir.join(name);
        std::fs::write(&path, content).map_err(|e| StorageError::Write(path.clone(), e))?;

        Ok(StoredFile {
            path,
            content_hash: content_hash(content),
            size: content.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash() {
        let hash = content_hash(b"Hello, World!");
        assert_eq!(hash.len(), 64); // SHA-256 produces 64 hex chars
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("invoice.pdf"), "pdf");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("no_extension"), "bin");
        assert_eq!(file_extension(""), "bin");
    }

    #[test]
    fn test_save_writes_uuid_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let stored = store.save(b"%PDF-1.4 content", "inv.pdf").unwrap();
        assert!(stored.path.exists());
        assert!(stored.path.extension().is_some_and(|e| e == "pdf"));
        assert_eq!(stored.size, 16);
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"%PDF-1.4 content");
    }
}
