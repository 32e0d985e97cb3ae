use async_trait::async_trait;
use tracing::instrument;

use crate::backend::BlobBackend;
use crate::error::{BlobError, Result};
use crate::types::BlobMetadata;

/// Backend for any S3-compatible endpoint or cloud object-storage API that
/// speaks plain `PUT`/`GET`/`DELETE` object semantics over HTTPS — this
/// covers the S3-compatible endpoint and the two cloud object-storage APIs
/// named in §4.C, which differ only in their base URL and auth header.
pub struct S3CompatibleBackend {
    client: reqwest::Client,
    base_url: String,
    auth_header: Option<(String, String)>,
}

impl S3CompatibleBackend {
    pub fn new(base_url: impl Into<String>, auth_header: Option<(String, String)>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_header,
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_header {
            Some((name, value)) => req.header(name, value),
            None => req,
        }
    }
}

#[async_trait]
impl BlobBackend for S3CompatibleBackend {
    #[instrument(skip(self, bytes), fields(key, size = bytes.len()))]
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobMetadata> {
        let size = bytes.len() as u64;
        let req = self
            .client
            .put(self.url_for(key))
            .header("content-type", content_type)
            .body(bytes);
        let resp = self
            .request(req)
            .send()
            .await
            .map_err(|e| BlobError::BackendUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(BlobError::BackendUnavailable(format!(
                "store {key} returned {}",
                resp.status()
            )));
        }
        Ok(BlobMetadata {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size,
        })
    }

    #[instrument(skip(self), fields(key))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let req = self.client.get(self.url_for(key));
        let resp = self
            .request(req)
            .send()
            .await
            .map_err(|e| BlobError::BackendUnavailable(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(BlobError::BackendUnavailable(format!(
                "get {key} returned {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BlobError::BackendUnavailable(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    #[instrument(skip(self), fields(key))]
    async fn delete(&self, key: &str) -> Result<bool> {
        let req = self.client.delete(self.url_for(key));
        let resp = self
            .request(req)
            .send()
            .await
            .map_err(|e| BlobError::BackendUnavailable(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !resp.status().is_success() {
            return Err(BlobError::BackendUnavailable(format!(
                "delete {key} returned {}",
                resp.status()
            )));
        }
        Ok(true)
    }

    async fn health_check(&self) -> Result<()> {
        let req = self.client.head(&self.base_url);
        self.request(req)
            .send()
            .await
            .map_err(|e| BlobError::BackendUnavailable(e.to_string()))?;
        Ok(())
    }
}
