//! Attachment byte store
//!
//! Files live flat under the configured directory, named by attachment id.
//! Metadata (original name, content type, checksum) lives in the database.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file of {size} bytes exceeds the {max} byte upload limit")]
    TooLarge { size: usize, max: usize },

    #[error("stored file for attachment {0} is missing")]
    Missing(Uuid),

    #[error("attachment storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Size and checksum of a written file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub size_bytes: i64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
    max_bytes: usize,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.root.join(id.simple().to_string())
    }

    /// Write the bytes of attachment `id`. The file appears atomically.
    pub async fn write(&self, id: Uuid, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        tokio::fs::create_dir_all(&self.root).await?;

        let final_path = self.path(id);
        let tmp_path = final_path.with_extension("part");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);

        tracing::debug!(attachment_id = %id, size = bytes.len(), "attachment stored");
        Ok(StoredFile {
            size_bytes: bytes.len() as i64,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    pub async fn read(&self, id: Uuid) -> Result<Vec<u8>, StorageError> {
        match tokio::fs::read(self.path(id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::Missing(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored file. Already-missing files are not an error.
    pub async fn remove(&self, id: Uuid) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reduce a client-supplied file name to a safe base name.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "file".to_owned()
    } else {
        cleaned.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().join("files"), 1024);
        let id = Uuid::new_v4();

        let stored = store.write(id, b"abc").await.unwrap();
        assert_eq!(stored.size_bytes, 3);
        assert_eq!(
            stored.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(store.read(id).await.unwrap(), b"abc");

        store.remove(id).await.unwrap();
        assert!(matches!(store.read(id).await, Err(StorageError::Missing(_))));
        store.remove(id).await.unwrap();
    }

    #[tokio::test]
    async fn oversized_upload_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path(), 4);

        let err = store.write(Uuid::new_v4(), b"too long").await.unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { size: 8, max: 4 }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\plan.xlsx"), "plan.xlsx");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name("a\u{0}b"), "ab");
        assert_eq!(sanitize_file_name(""), "file");
    }
}
