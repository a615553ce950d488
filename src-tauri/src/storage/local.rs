//! Directory-backed bucket for development and offline use.
//!
//! Signed URLs are `file://` URLs to the blob carrying `expires` and
//! `signature` query parameters; the signature is SHA-256 over the signing
//! secret, blob name and expiry timestamp.

use super::{validate_blob_name, BlobStore, SignedUrl, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::PathBuf;

pub struct LocalBlobStore {
    root: PathBuf,
    secret: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, secret: impl Into<String>) -> std::io::Result<Self> {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            secret: secret.into(),
        })
    }

    fn signature(&self, name: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"\n");
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn sign_at(&self, name: &str, expires_at: DateTime<Utc>) -> Result<SignedUrl, StorageError> {
        validate_blob_name(name)?;
        let path = self.root.join(name);
        let mut url = Url::from_file_path(&path)
            .map_err(|_| StorageError::InvalidName(path.display().to_string()))?;
        let expires = expires_at.timestamp();
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signature(name, expires));
        Ok(SignedUrl {
            url: url.to_string(),
            expires_at,
        })
    }
}

/// Checks the signed URLs this store hands out, as a browser would.
#[cfg(test)]
impl LocalBlobStore {
    /// Verify a signed URL and return the blob it grants access to.
    pub fn resolve(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        self.resolve_at(url, Utc::now())
    }

    pub fn resolve_at(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<u8>, StorageError> {
        let url = Url::parse(url).map_err(|e| StorageError::InvalidSignature(e.to_string()))?;
        let path = url
            .to_file_path()
            .map_err(|_| StorageError::InvalidSignature("not a file URL".into()))?;
        if path.parent() != Some(self.root.as_path()) {
            return Err(StorageError::InvalidSignature("outside of bucket".into()));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidSignature("missing blob name".into()))?;

        let mut expires = None;
        let mut signature = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "expires" => expires = value.parse::<i64>().ok(),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }
        let expires =
            expires.ok_or_else(|| StorageError::InvalidSignature("missing expires".into()))?;
        let signature =
            signature.ok_or_else(|| StorageError::InvalidSignature("missing signature".into()))?;

        if signature != self.signature(name, expires) {
            return Err(StorageError::InvalidSignature("signature mismatch".into()));
        }
        if now.timestamp() >= expires {
            let expired_at = DateTime::from_timestamp(expires, 0).unwrap_or(now);
            return Err(StorageError::Expired(expired_at));
        }
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::Io(e),
        })
    }

    /// Names of every blob currently in the bucket, sorted.
    pub fn blob_names(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_blob_name(name)?;
        // Stage next to the target so the rename is atomic.
        let mut staged = tempfile::NamedTempFile::new_in(&self.root)?;
        staged.write_all(bytes)?;
        staged
            .persist(self.root.join(name))
            .map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_blob_name(name)?;
        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn signed_url(
        &self,
        name: &str,
        expires_in: Duration,
    ) -> Result<SignedUrl, StorageError> {
        self.sign_at(name, Utc::now() + expires_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signed_url_resolves_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "s3cret").unwrap();
        store.put("syllabus 1.txt", b"hello").await.unwrap();

        let signed = store
            .signed_url("syllabus 1.txt", Duration::days(365))
            .await
            .unwrap();
        assert_eq!(store.resolve(&signed.url).unwrap(), b"hello");

        let day_before = signed.expires_at - Duration::days(1);
        assert_eq!(store.resolve_at(&signed.url, day_before).unwrap(), b"hello");

        let after = signed.expires_at + Duration::seconds(1);
        assert!(matches!(
            store.resolve_at(&signed.url, after),
            Err(StorageError::Expired(_))
        ));
    }

    #[tokio::test]
    async fn test_tampered_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "s3cret").unwrap();
        store.put("a.txt", b"a").await.unwrap();
        store.put("b.txt", b"b").await.unwrap();

        let signed = store.signed_url("a.txt", Duration::days(1)).await.unwrap();
        let forged = signed.url.replace("a.txt", "b.txt");
        assert!(matches!(
            store.resolve(&forged),
            Err(StorageError::InvalidSignature(_))
        ));

        let other = LocalBlobStore::new(dir.path(), "different").unwrap();
        assert!(other.resolve(&signed.url).is_err());
    }

    #[tokio::test]
    async fn test_get_missing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "s").unwrap();
        assert!(matches!(
            store.get("nope.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
