pub mod gcs;
pub mod local;

use crate::doc_processor::accepted_extension;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Signed URLs handed back for uploaded documents stay valid this long.
pub const SIGNED_URL_TTL_DAYS: i64 = 365;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Storage API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Storage auth error: {0}")]
    Auth(String),
    #[error("Blob not found: {0}")]
    NotFound(String),
    #[error("Invalid blob name: {0:?}")]
    InvalidName(String),
    #[cfg(test)]
    #[error("Signed URL is invalid: {0}")]
    InvalidSignature(String),
    #[cfg(test)]
    #[error("Signed URL expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Minimal blob store surface: write by name, read by name, sign a read URL.
/// Writing an existing name replaces it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, name: &str, bytes: &[u8]) -> std::result::Result<(), StorageError>;

    async fn get(&self, name: &str) -> std::result::Result<Vec<u8>, StorageError>;

    async fn signed_url(
        &self,
        name: &str,
        expires_in: Duration,
    ) -> std::result::Result<SignedUrl, StorageError>;
}

/// Blob names must be a single path component.
pub(crate) fn validate_blob_name(name: &str) -> std::result::Result<(), StorageError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
    {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub original_name: String,
    pub size: u64,
    pub local_path: PathBuf,
    pub signed_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Persists uploads to the blob store and keeps a local working copy.
pub struct DocumentStore {
    blobs: Arc<dyn BlobStore>,
    local_dir: PathBuf,
}

impl DocumentStore {
    pub fn new(blobs: Arc<dyn BlobStore>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            blobs,
            local_dir: local_dir.into(),
        }
    }

    /// Stage `source` in a temp file, upload it under its original file name,
    /// sign a read URL and materialize `<local_dir>/<base_name><ext>` from the
    /// stored blob. The staged copy is removed once the upload finishes.
    pub async fn upload(&self, source: &Path, base_name: &str) -> Result<StoredDocument> {
        accepted_extension(source)?;
        let original_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidName(source.display().to_string()))?
            .to_string();
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        tokio::fs::create_dir_all(&self.local_dir).await?;
        let staged = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.local_dir)?;
        tokio::fs::copy(source, staged.path()).await?;
        let bytes = tokio::fs::read(staged.path()).await?;
        if bytes.is_empty() {
            return Err(Error::EmptyDocument(original_name));
        }

        self.blobs.put(&original_name, &bytes).await?;
        drop(staged);
        tracing::info!(blob = %original_name, bytes = bytes.len(), "uploaded document");

        let signed = self
            .blobs
            .signed_url(&original_name, Duration::days(SIGNED_URL_TTL_DAYS))
            .await?;

        let stored = self.blobs.get(&original_name).await?;
        let local_path = self.local_dir.join(format!("{}{}", base_name, extension));
        tokio::fs::write(&local_path, &stored).await?;
        tracing::debug!(path = %local_path.display(), "materialized local copy");

        Ok(StoredDocument {
            original_name,
            size: bytes.len() as u64,
            local_path,
            signed_url: signed.url,
            expires_at: signed.expires_at,
        })
    }

    /// `None` in, `None` out: a missing selection is not an error.
    pub async fn upload_optional(
        &self,
        source: Option<&Path>,
        base_name: &str,
    ) -> Result<Option<StoredDocument>> {
        match source {
            Some(path) => self.upload(path, base_name).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::local::LocalBlobStore;
    use super::*;

    fn store(dir: &Path) -> (Arc<LocalBlobStore>, DocumentStore) {
        let blobs = Arc::new(LocalBlobStore::new(dir.join("bucket"), "secret").unwrap());
        let docs = DocumentStore::new(blobs.clone(), dir.join("work"));
        (blobs, docs)
    }

    #[test]
    fn test_validate_blob_name() {
        assert!(validate_blob_name("syllabus.txt").is_ok());
        assert!(validate_blob_name("../etc/passwd").is_err());
        assert!(validate_blob_name("").is_err());
    }

    #[tokio::test]
    async fn test_upload_materializes_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("CISC110.txt");
        std::fs::write(&source, "Course: CISC 110").unwrap();
        let (blobs, docs) = store(dir.path());

        let doc = docs.upload(&source, "syllabus1").await.unwrap();
        assert_eq!(doc.original_name, "CISC110.txt");
        assert_eq!(doc.local_path, dir.path().join("work").join("syllabus1.txt"));
        assert_eq!(
            std::fs::read_to_string(&doc.local_path).unwrap(),
            "Course: CISC 110"
        );
        let days = (doc.expires_at - Utc::now()).num_days();
        assert!((364..=365).contains(&days));
        assert_eq!(blobs.resolve(&doc.signed_url).unwrap(), b"Course: CISC 110");
    }

    #[tokio::test]
    async fn test_upload_leaves_no_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("IST110.md");
        std::fs::write(&source, "# IST 110").unwrap();
        let (_, docs) = store(dir.path());

        docs.upload(&source, "syllabus2").await.unwrap();
        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        assert!(docs.upload(&empty, "syllabus1").await.is_err());

        let mut names: Vec<String> = std::fs::read_dir(dir.path().join("work"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["syllabus2.md".to_string()]);
    }

    #[tokio::test]
    async fn test_same_name_overwrites_blob() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("syllabus.txt");
        let (blobs, docs) = store(dir.path());

        std::fs::write(&source, "first").unwrap();
        let first = docs.upload(&source, "syllabus1").await.unwrap();
        std::fs::write(&source, "second").unwrap();
        let second = docs.upload(&source, "syllabus1").await.unwrap();

        assert_eq!(blobs.blob_names().unwrap(), vec!["syllabus.txt".to_string()]);
        assert_eq!(blobs.resolve(&first.signed_url).unwrap(), b"second");
        assert_eq!(blobs.resolve(&second.signed_url).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_rejects_empty_and_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let (_, docs) = store(dir.path());

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(
            docs.upload(&empty, "syllabus1").await,
            Err(Error::EmptyDocument(_))
        ));

        let pdf = dir.path().join("syllabus.pdf");
        std::fs::write(&pdf, "%PDF").unwrap();
        assert!(matches!(
            docs.upload(&pdf, "syllabus1").await,
            Err(Error::UnsupportedFileType(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_optional_none() {
        let dir = tempfile::tempdir().unwrap();
        let (_, docs) = store(dir.path());
        assert!(docs.upload_optional(None, "syllabus2").await.unwrap().is_none());
    }
}
