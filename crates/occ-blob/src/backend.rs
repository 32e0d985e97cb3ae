use async_trait::async_trait;

use crate::error::Result;
use crate::types::BlobMetadata;

/// Uniform backend surface behind the facade (§4.C). Exactly one backend is
/// active in a given deployment, chosen at startup from configuration.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobMetadata>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn health_check(&self) -> Result<()>;
}

pub mod local_fs;
pub mod s3_compatible;

pub use local_fs::LocalFsBackend;
pub use s3_compatible::S3CompatibleBackend;
