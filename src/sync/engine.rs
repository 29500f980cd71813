use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{CatalogRecord, ContentObject, MigrationOutcome, ReconcileSummary, Result};
use crate::source::ContentSource;
use crate::storage::CatalogStore;

/// Create / update / no-op decision applied for a single candidate.
enum ReconcileAction {
    Created,
    Updated,
    Unchanged,
}

#[derive(Clone)]
pub struct SyncEngine {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn CatalogStore>,
    cfg: Config,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn ContentSource>, store: Arc<dyn CatalogStore>, cfg: Config) -> Self {
        Self { source, store, cfg }
    }

    /// One end-to-end pass: fetch, index, reconcile. Never propagates an
    /// error past this boundary; the HTTP endpoint and the scheduler both
    /// receive the same structured outcome.
    pub async fn run_pass(&self) -> MigrationOutcome {
        let pass_id = format!("pass_{}", Uuid::new_v4().simple());
        let start_time = Instant::now();
        tracing::info!(pass_id = %pass_id, "Starting migration pass");

        match self.execute_pass().await {
            Ok(summary) => {
                tracing::info!(
                    pass_id = %pass_id,
                    created = summary.created,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    failed_writes = summary.failed_writes,
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "Migration pass completed"
                );
                MigrationOutcome {
                    success: true,
                    message: "Content objects successfully migrated to the catalog store!"
                        .to_string(),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(pass_id = %pass_id, error = %e, "Error migrating content");
                MigrationOutcome {
                    success: false,
                    message: "Error migrating content".to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn execute_pass(&self) -> Result<ReconcileSummary> {
        let candidates = self.source.fetch_candidates().await?;
        let index = self.build_index().await?;
        self.reconcile(candidates, &index).await
    }

    /// Load the whole persisted collection into a lookup keyed by object id.
    /// Last write wins on duplicate keys.
    pub async fn build_index(&self) -> Result<HashMap<String, CatalogRecord>> {
        let existing = self.store.find_all().await?;
        let mut index = HashMap::with_capacity(existing.len());
        for record in existing {
            index.insert(record.object_id.clone(), record);
        }
        Ok(index)
    }

    /// Apply the create-or-update decision for every candidate. Writes run
    /// concurrently with bounded parallelism; a failed write is counted and
    /// does not abort siblings. Returns only after every candidate settles.
    pub async fn reconcile(
        &self,
        candidates: Vec<ContentObject>,
        index: &HashMap<String, CatalogRecord>,
    ) -> Result<ReconcileSummary> {
        let results: Vec<Result<ReconcileAction>> = stream::iter(candidates)
            .map(|candidate| {
                let existing = index.get(&candidate.object_id).cloned();
                async move {
                    let object_id = candidate.object_id.clone();
                    self.reconcile_one(candidate, existing).await.map_err(|e| {
                        tracing::warn!(
                            object_id = %object_id,
                            error = %e,
                            "Catalog write failed; continuing with remaining candidates"
                        );
                        e
                    })
                }
            })
            .buffer_unordered(self.cfg.write_parallelism.max(1))
            .collect()
            .await;

        let mut summary = ReconcileSummary::default();
        for result in results {
            match result {
                Ok(ReconcileAction::Created) => summary.created += 1,
                Ok(ReconcileAction::Updated) => summary.updated += 1,
                Ok(ReconcileAction::Unchanged) => summary.unchanged += 1,
                Err(_) => summary.failed_writes += 1,
            }
        }
        Ok(summary)
    }

    async fn reconcile_one(
        &self,
        candidate: ContentObject,
        existing: Option<CatalogRecord>,
    ) -> Result<ReconcileAction> {
        match existing {
            Some(mut record) => {
                if record.apply_candidate(&candidate) {
                    self.store.update(&record).await?;
                    Ok(ReconcileAction::Updated)
                } else {
                    Ok(ReconcileAction::Unchanged)
                }
            }
            None => {
                let record = CatalogRecord::from(candidate);
                self.store.insert(&record).await?;
                Ok(ReconcileAction::Created)
            }
        }
    }
}
