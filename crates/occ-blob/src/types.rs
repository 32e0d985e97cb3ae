use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BlobMetadata {
    pub key: String,
    pub content_type: String,
    pub size: u64,
}
