pub mod db;
pub mod error;
pub mod recorder;
pub mod types;

pub use error::{AuditError, Result};
pub use recorder::AuditRecorder;
pub use types::{AdminAuditEntry, TierCounts, UsageRecord};
