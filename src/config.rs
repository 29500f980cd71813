use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    // Content fabric access
    pub fabric_config_url: String,
    pub fabric_library_id: String,
    pub fabric_private_key: String,
    pub http_timeout_ms: u64,
    pub http_user_agent: String,
    pub enable_scheduler: bool,
    pub sync_schedule: String,
    // Asset download budgeting; the concurrency bound is derived from these
    pub download_payload_budget_bytes: u64,
    pub expected_asset_size_bytes: u64,
    pub write_parallelism: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let get = |k: &str| std::env::var(k).ok();

        let port: u16 = get("PORT").and_then(|s| s.parse().ok()).unwrap_or(8087);
        let mongodb_uri = get("MONGODB_URI").unwrap_or_else(|| "mongodb://localhost:27017".to_string());
        let database_name = get("DATABASE_NAME").unwrap_or_else(|| "catalog".to_string());
        let fabric_config_url = get("FABRIC_CONFIG_URL").unwrap_or_else(|| "http://localhost:8008/config".to_string());
        let fabric_library_id = get("FABRIC_LIBRARY_ID").unwrap_or_default();
        let fabric_private_key = get("FABRIC_PRIVATE_KEY").unwrap_or_default();
        let http_timeout_ms: u64 = get("HTTP_TIMEOUT_MS").and_then(|s| s.parse().ok()).unwrap_or(60000);
        let http_user_agent = get("HTTP_USER_AGENT").unwrap_or_else(|| "catalog-sync-service/1.0".to_string());
        let enable_scheduler: bool = get("ENABLE_SCHEDULER").and_then(|s| s.parse().ok()).unwrap_or(true);
        let sync_schedule = get("SYNC_SCHEDULE").unwrap_or_else(|| "0 0 * * * *".to_string());
        let download_payload_budget_bytes: u64 = get("DOWNLOAD_PAYLOAD_BUDGET_BYTES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(4 * 1024 * 1024);
        let expected_asset_size_bytes: u64 = get("EXPECTED_ASSET_SIZE_BYTES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1024 * 1024);
        let write_parallelism: usize = get("WRITE_PARALLELISM").and_then(|s| s.parse().ok()).unwrap_or(4);

        Self {
            port,
            mongodb_uri,
            database_name,
            fabric_config_url,
            fabric_library_id,
            fabric_private_key,
            http_timeout_ms,
            http_user_agent,
            enable_scheduler,
            sync_schedule,
            download_payload_budget_bytes,
            expected_asset_size_bytes,
            write_parallelism,
        }
    }

    /// Bound on concurrently outstanding asset downloads: payload budget
    /// divided by the expected per-asset size, floored, at least 1.
    pub fn download_concurrency(&self) -> usize {
        (self.download_payload_budget_bytes / self.expected_asset_size_bytes.max(1)).max(1) as usize
    }
}
