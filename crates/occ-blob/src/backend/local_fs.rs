use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use crate::backend::BlobBackend;
use crate::error::{BlobError, Result};
use crate::types::BlobMetadata;

/// Local filesystem backend. Keys map directly onto relative paths under
/// `root`; the key's own `/` segments become directory components, so no
/// extra escaping is needed beyond rejecting `..` traversal.
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|seg| seg == "..") {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobBackend for LocalFsBackend {
    #[instrument(skip(self, bytes), fields(key, size = bytes.len()))]
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobMetadata> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len() as u64;
        tokio::fs::write(&path, bytes).await?;
        tokio::fs::write(content_type_sidecar(&path), content_type).await?;
        Ok(BlobMetadata {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size,
        })
    }

    #[instrument(skip(self), fields(key))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(key))]
    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        let _ = tokio::fs::remove_file(content_type_sidecar(&path)).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

fn content_type_sidecar(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".content-type");
    PathBuf::from(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        backend.store("2026/07/u1/upload_1_abc", b"hello".to_vec(), "text/plain").await.unwrap();
        let got = backend.get("2026/07/u1/upload_1_abc").await.unwrap();
        assert_eq!(got, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        assert_eq!(backend.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        let err = backend.store("../escape", vec![1], "x").await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn delete_reports_whether_it_existed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(dir.path());
        backend.store("k", vec![1], "x").await.unwrap();
        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
    }
}
