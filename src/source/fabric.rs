use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;

use crate::config::Config;
use crate::models::{CatalogSyncError, ContentObject, Result};
use crate::source::ContentSource;

/// HTTP client for the content fabric. Built from configuration; the fabric
/// session itself is established anew inside each `fetch_candidates` call
/// and lives for that one pass only.
pub struct FabricClient {
    client: Client,
    config_url: String,
    library_id: String,
    private_key: String,
    download_limit: usize,
}

/// Node endpoint plus bearer token for one pass.
struct FabricSession {
    node_url: String,
    token: String,
}

/// A retained listing entry waiting on its asset download.
struct PendingDownload {
    candidate: ContentObject,
    file_path: String,
}

/// Per-entry download result; the caller keeps successes and drops failures.
enum DownloadOutcome {
    Fetched(ContentObject),
    Failed,
}

impl FabricClient {
    pub fn new(cfg: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.http_timeout_ms))
            .user_agent(cfg.http_user_agent.as_str())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config_url: cfg.fabric_config_url.clone(),
            library_id: cfg.fabric_library_id.clone(),
            private_key: cfg.fabric_private_key.clone(),
            download_limit: cfg.download_concurrency(),
        }
    }

    /// Resolve the configuration URL to a fabric node and authorize with the
    /// configured private key. Any failure here aborts the pass.
    async fn connect(&self) -> Result<FabricSession> {
        let config: Value = self
            .client
            .get(&self.config_url)
            .send()
            .await
            .map_err(source_error)?
            .error_for_status()
            .map_err(source_error)?
            .json()
            .await
            .map_err(source_error)?;

        let node_url = config
            .get("network")
            .and_then(|n| n.get("services"))
            .and_then(|s| s.get("fabric_api"))
            .and_then(|f| f.get(0))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                CatalogSyncError::SourceUnavailable(
                    "fabric configuration lists no fabric_api endpoint".to_string(),
                )
            })?
            .trim_end_matches('/')
            .to_string();

        let token_response: Value = self
            .client
            .post(format!("{}/authorize", node_url))
            .json(&serde_json::json!({ "private_key": self.private_key }))
            .send()
            .await
            .map_err(source_error)?
            .error_for_status()
            .map_err(source_error)?
            .json()
            .await
            .map_err(source_error)?;

        let token = token_response
            .get("token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                CatalogSyncError::SourceUnavailable(
                    "authorization response carries no token".to_string(),
                )
            })?
            .to_string();

        Ok(FabricSession { node_url, token })
    }

    /// List the library's content objects with the metadata select used for
    /// reconciliation, filtered to entries that reference an image asset.
    async fn list_contents(&self, session: &FabricSession) -> Result<Vec<Value>> {
        let url = format!("{}/qlibs/{}/q", session.node_url, self.library_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.token)
            .query(&[
                ("select", "public/name"),
                ("select", "public/asset_metadata/info"),
                ("select", "public/asset_metadata/display_title"),
                ("select", "public/asset_metadata/images"),
                ("filter", "public/asset_metadata/images:ctn:"),
            ])
            .send()
            .await
            .map_err(source_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogSyncError::SourceUnavailable(format!(
                "content listing failed with status: {} body={}",
                status, body
            )));
        }

        let body: Value = response.json().await.map_err(source_error)?;
        Ok(body
            .get("contents")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn download_asset(
        &self,
        session: &FabricSession,
        object_id: &str,
        file_path: &str,
    ) -> Result<Vec<u8>> {
        let url = format!(
            "{}/qlibs/{}/q/{}/files/{}",
            session.node_url, self.library_id, object_id, file_path
        );
        let response = self.client.get(&url).bearer_auth(&session.token).send().await?;
        if !response.status().is_success() {
            return Err(CatalogSyncError::Sync(format!(
                "asset download failed with status: {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ContentSource for FabricClient {
    async fn fetch_candidates(&self) -> Result<Vec<ContentObject>> {
        if self.library_id.is_empty() {
            return Err(CatalogSyncError::Configuration(
                "FABRIC_LIBRARY_ID is not set".to_string(),
            ));
        }
        let session = self.connect().await?;
        let entries = self.list_contents(&session).await?;

        let pending: Vec<(usize, PendingDownload)> = entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| parse_entry(entry).map(|p| (index, p)))
            .collect();

        tracing::info!(
            listed = entries.len(),
            retained = pending.len(),
            download_limit = self.download_limit,
            "Fetched content listing"
        );

        // At most `download_limit` downloads in flight; collecting the
        // stream is the join barrier for the stragglers.
        let session_ref = &session;
        let outcomes: Vec<DownloadOutcome> = stream::iter(pending)
            .map(|(index, p)| async move {
                match self
                    .download_asset(session_ref, &p.candidate.object_id, &p.file_path)
                    .await
                {
                    Ok(bytes) => {
                        // The download gates inclusion; the asset body is not
                        // persisted and the candidate keeps its placeholder.
                        tracing::debug!(
                            index,
                            object_id = %p.candidate.object_id,
                            bytes = bytes.len(),
                            "Asset download complete"
                        );
                        DownloadOutcome::Fetched(p.candidate)
                    }
                    Err(e) => {
                        tracing::warn!(
                            index,
                            object_id = %p.candidate.object_id,
                            error = %e,
                            "Error downloading image; dropping record from this pass"
                        );
                        DownloadOutcome::Failed
                    }
                }
            })
            .buffer_unordered(self.download_limit.max(1))
            .collect()
            .await;

        Ok(outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                DownloadOutcome::Fetched(candidate) => Some(candidate),
                DownloadOutcome::Failed => None,
            })
            .collect())
    }
}

fn source_error(e: reqwest::Error) -> CatalogSyncError {
    CatalogSyncError::SourceUnavailable(e.to_string())
}

/// Normalize one raw listing entry into a typed candidate plus the asset
/// file path to download. Entries lacking the public metadata block, the
/// image block, or the identity fields are skipped, not an error.
fn parse_entry(entry: &Value) -> Option<PendingDownload> {
    let version = entry.get("versions")?.get(0)?;
    let public = version.get("meta")?.get("public")?;
    let asset_metadata = public.get("asset_metadata")?;
    let images = asset_metadata.get("images")?;

    let object_id = version
        .get("id")?
        .as_str()
        .filter(|s| !s.is_empty())?
        .to_string();
    let version_hash = version.get("hash")?.as_str()?.to_string();
    let object_name = public.get("name")?.as_str()?.to_string();
    let display_title = asset_metadata.get("display_title")?.as_str()?.to_string();

    let info = asset_metadata.get("info");
    let info_field = |key: &str| -> Option<String> { info?.get(key)?.as_str().map(str::to_string) };

    let image_path = images.get("landscape")?.get("default")?.get("/")?.as_str()?;
    let file_path = image_path.rsplit('/').next()?.to_string();

    Some(PendingDownload {
        candidate: ContentObject {
            object_id,
            object_name,
            display_title,
            version_hash,
            image: None,
            copyright: info_field("copyright"),
            creator: info_field("creator"),
            release_date: info_field("release_date"),
            runtime: info_field("runtime"),
            synopsis: info_field("synopsis"),
        },
        file_path,
    })
}
