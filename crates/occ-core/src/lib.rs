pub mod config;
pub mod embedding;
pub mod error;
pub mod types;

pub use embedding::Embedder;
pub use error::{OrchestrationError, Result};
