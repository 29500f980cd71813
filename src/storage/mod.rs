use async_trait::async_trait;
use futures::StreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use crate::models::{CatalogRecord, CatalogSyncError, Result};

const CATALOG_COLLECTION: &str = "catalogs";

/// Persistence seam for the reconciler: the catalog collection reduced to
/// find/insert/update. Records are never deleted through this interface.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<CatalogRecord>>;
    async fn insert(&self, record: &CatalogRecord) -> Result<()>;
    async fn update(&self, record: &CatalogRecord) -> Result<()>;
}

#[derive(Clone)]
pub struct MongoCatalogStore {
    db: Database,
}

impl MongoCatalogStore {
    pub fn with_db(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> Collection<CatalogRecord> {
        self.db.collection(CATALOG_COLLECTION)
    }
}

#[async_trait]
impl CatalogStore for MongoCatalogStore {
    async fn find_all(&self) -> Result<Vec<CatalogRecord>> {
        let mut cursor = self.collection().find(None, None).await?;
        let mut records = Vec::new();
        while let Some(record) = cursor.next().await {
            records.push(record?);
        }
        Ok(records)
    }

    async fn insert(&self, record: &CatalogRecord) -> Result<()> {
        self.collection().insert_one(record, None).await?;
        Ok(())
    }

    async fn update(&self, record: &CatalogRecord) -> Result<()> {
        let id = record.id.ok_or_else(|| {
            CatalogSyncError::Sync("cannot update a catalog record without a storage id".to_string())
        })?;
        self.collection()
            .replace_one(doc! { "_id": id }, record, None)
            .await?;
        Ok(())
    }
}
