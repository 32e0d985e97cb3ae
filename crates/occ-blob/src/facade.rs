use std::sync::Arc;

use occ_core::config::BackendConfig;
use tracing::{info, instrument};

use crate::backend::{BlobBackend, LocalFsBackend, S3CompatibleBackend};
use crate::error::Result;
use crate::key::build_key;
use crate::types::BlobMetadata;

/// The uniform facade callers see regardless of which backend is active
/// (§4.C). Key generation lives here so every backend gets the same
/// unguessable, sortable key shape.
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
}

impl BlobStore {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self { backend }
    }

    /// Selects a backend from configuration per §6 "Object storage …
    /// Selection is automatic": explicit `blob_storage_type` wins;
    /// otherwise the presence of a provider's credentials (here, an S3
    /// endpoint) selects that backend; otherwise local filesystem.
    pub fn from_config(config: &BackendConfig) -> Self {
        let backend: Arc<dyn BlobBackend> = match config.blob_storage_type.as_deref() {
            Some("s3") => {
                info!("blob backend: s3-compatible (explicit BLOB_STORAGE_TYPE)");
                Arc::new(s3_backend_from(config))
            }
            Some("local") => {
                info!(root = %config.blob_local_root, "blob backend: local filesystem (explicit BLOB_STORAGE_TYPE)");
                Arc::new(LocalFsBackend::new(config.blob_local_root.clone()))
            }
            Some(other) => {
                info!(requested = other, root = %config.blob_local_root, "blob backend: unrecognized BLOB_STORAGE_TYPE, falling back to local filesystem");
                Arc::new(LocalFsBackend::new(config.blob_local_root.clone()))
            }
            None if config.blob_s3_endpoint.is_some() => {
                info!("blob backend: s3-compatible (credentials present)");
                Arc::new(s3_backend_from(config))
            }
            None => {
                info!(root = %config.blob_local_root, "blob backend: local filesystem (default)");
                Arc::new(LocalFsBackend::new(config.blob_local_root.clone()))
            }
        };
        Self::new(backend)
    }

    #[instrument(skip(self, bytes), fields(user_id, prefix))]
    pub async fn store_new(
        &self,
        user_id: &str,
        prefix: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<BlobMetadata> {
        let key = build_key(user_id, prefix);
        self.backend.store(&key, bytes, content_type).await
    }

    pub async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobMetadata> {
        self.backend.store(key, bytes, content_type).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.backend.get(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.backend.delete(key).await
    }

    pub async fn health_check(&self) -> Result<()> {
        self.backend.health_check().await
    }
}

fn s3_backend_from(config: &BackendConfig) -> S3CompatibleBackend {
    let auth = match (&config.blob_s3_auth_header, &config.blob_s3_auth_token) {
        (Some(name), Some(token)) => Some((name.clone(), token.clone())),
        _ => None,
    };
    S3CompatibleBackend::new(config.blob_s3_endpoint.clone().unwrap_or_default(), auth)
}

#[cfg(test)]
mod facade_config_tests {
    use super::*;

    fn base_config() -> BackendConfig {
        BackendConfig {
            blob_storage_type: None,
            blob_s3_endpoint: None,
            blob_s3_auth_header: None,
            blob_s3_auth_token: None,
            blob_local_root: "/tmp/occ-blob-test".to_string(),
            vector_backend_endpoint: None,
            identity_tenant_id: None,
            llm_base_url: "https://api.openai.com".to_string(),
            llm_api_key: String::new(),
            llm_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            oauth_token_endpoint: None,
            oauth_client_id: String::new(),
            oauth_client_secret: String::new(),
        }
    }

    #[test]
    fn defaults_to_local_filesystem_with_no_signals() {
        // Just exercises the selection path without panicking; backend
        // identity isn't observable from outside this crate.
        let _store = BlobStore::from_config(&base_config());
    }

    #[test]
    fn explicit_local_wins_even_with_s3_endpoint_present() {
        let mut config = base_config();
        config.blob_storage_type = Some("local".to_string());
        config.blob_s3_endpoint = Some("https://s3.example.com".to_string());
        let _store = BlobStore::from_config(&config);
    }

    #[test]
    fn s3_endpoint_alone_selects_the_s3_backend() {
        let mut config = base_config();
        config.blob_s3_endpoint = Some("https://s3.example.com".to_string());
        let _store = BlobStore::from_config(&config);
    }
}
