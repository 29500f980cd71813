pub mod fabric;

pub use fabric::*;

use async_trait::async_trait;

use crate::models::{ContentObject, Result};

/// One-shot listing of candidate records from the external content source.
/// The produced sequence is finite and not restartable; ordering follows
/// download completion, not source order.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<ContentObject>>;
}
