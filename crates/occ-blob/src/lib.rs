pub mod backend;
pub mod error;
pub mod facade;
pub mod key;
pub mod types;

pub use backend::{BlobBackend, LocalFsBackend, S3CompatibleBackend};
pub use error::{BlobError, Result};
pub use facade::BlobStore;
pub use types::BlobMetadata;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn store_new_generates_a_fresh_key_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(Arc::new(LocalFsBackend::new(dir.path())));
        let first = store.store_new("u1", "upload", b"a".to_vec(), "text/plain").await.unwrap();
        let second = store.store_new("u1", "upload", b"b".to_vec(), "text/plain").await.unwrap();
        assert_ne!(first.key, second.key);
        assert_eq!(store.get(&first.key).await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.get(&second.key).await.unwrap(), Some(b"b".to_vec()));
    }
}
