pub mod catalog;

pub use catalog::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CatalogSyncError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Error retrieving content objects: {0}")]
    SourceUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Sync error: {0}")]
    Sync(String),
}

pub type Result<T> = std::result::Result<T, CatalogSyncError>;

/// Outcome contract returned to every caller of a migration pass, whether
/// the HTTP endpoint or the scheduler. Never replaced by a raw error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-pass reconciliation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed_writes: usize,
}
