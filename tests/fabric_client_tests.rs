use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use catalog_sync_service::config::Config;
use catalog_sync_service::source::{ContentSource, FabricClient};

fn test_config(base: &str, payload_budget_bytes: u64) -> Config {
    Config {
        port: 0,
        mongodb_uri: "mongodb://localhost:27017".to_string(),
        database_name: "catalog-test".to_string(),
        fabric_config_url: format!("{}/config", base),
        fabric_library_id: "ilib_test".to_string(),
        fabric_private_key: "0xtestkey".to_string(),
        http_timeout_ms: 5000,
        http_user_agent: "catalog-sync-service/test".to_string(),
        enable_scheduler: false,
        sync_schedule: "0 0 * * * *".to_string(),
        download_payload_budget_bytes: payload_budget_bytes,
        expected_asset_size_bytes: 1024 * 1024,
        write_parallelism: 4,
    }
}

fn entry(object_id: &str) -> Value {
    json!({
        "id": object_id,
        "versions": [{
            "id": object_id,
            "hash": format!("hq__{object_id}"),
            "meta": {
                "public": {
                    "name": format!("Name {object_id}"),
                    "asset_metadata": {
                        "display_title": format!("Title {object_id}"),
                        "info": {
                            "copyright": "2023 Studio",
                            "creator": "Studio",
                            "release_date": "2023-01-01",
                            "runtime": "110",
                            "synopsis": "A feature film"
                        },
                        "images": {
                            "landscape": { "default": { "/": "./files/assets/landscape.jpg" } }
                        }
                    }
                }
            }
        }]
    })
}

/// Serve a throwaway fabric: /config resolves to this server, /authorize
/// hands out a token, /qlibs lists `entries`, and `files_route` plays the
/// asset download endpoint.
async fn spawn_fabric(entries: Vec<Value>, files_route: axum::routing::MethodRouter) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let config_base = base.clone();
    let app = Router::new()
        .route(
            "/config",
            get(move || {
                let config_base = config_base.clone();
                async move {
                    Json(json!({ "network": { "services": { "fabric_api": [config_base] } } }))
                }
            }),
        )
        .route(
            "/authorize",
            post(|| async { Json(json!({ "token": "tok_test" })) }),
        )
        .route(
            "/qlibs/{lib}/q",
            get(move || {
                let entries = entries.clone();
                async move { Json(json!({ "contents": entries })) }
            }),
        )
        .route("/qlibs/{lib}/q/{object}/files/{path}", files_route);

    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    base
}

#[tokio::test]
async fn fetch_candidates_filters_and_normalizes_entries() {
    let mut no_public = entry("iq__no_public");
    no_public["versions"][0]["meta"] = json!({});
    let mut no_images = entry("iq__no_images");
    no_images["versions"][0]["meta"]["public"]["asset_metadata"]
        .as_object_mut()
        .unwrap()
        .remove("images");

    let entries = vec![entry("iq__a"), no_public, entry("iq__b"), no_images];
    let files_route = get(|_: Path<(String, String, String)>| async { StatusCode::OK });
    let base = spawn_fabric(entries, files_route).await;

    let client = FabricClient::new(&test_config(&base, 4 * 1024 * 1024));
    let mut candidates = client.fetch_candidates().await.unwrap();
    candidates.sort_by(|a, b| a.object_id.cmp(&b.object_id));

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].object_id, "iq__a");
    assert_eq!(candidates[0].object_name, "Name iq__a");
    assert_eq!(candidates[0].display_title, "Title iq__a");
    assert_eq!(candidates[0].version_hash, "hq__iq__a");
    assert_eq!(candidates[0].image, None);
    assert_eq!(candidates[0].synopsis.as_deref(), Some("A feature film"));
    assert_eq!(candidates[1].object_id, "iq__b");
}

#[tokio::test]
async fn failed_download_drops_only_that_record() {
    let entries = vec![entry("iq__ok"), entry("iq__broken"), entry("iq__fine")];
    let files_route = get(
        |Path((_lib, object, _path)): Path<(String, String, String)>| async move {
            if object == "iq__broken" {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            }
        },
    );
    let base = spawn_fabric(entries, files_route).await;

    let client = FabricClient::new(&test_config(&base, 4 * 1024 * 1024));
    let mut candidates = client.fetch_candidates().await.unwrap();
    candidates.sort_by(|a, b| a.object_id.cmp(&b.object_id));

    let ids: Vec<&str> = candidates.iter().map(|c| c.object_id.as_str()).collect();
    assert_eq!(ids, vec!["iq__fine", "iq__ok"]);
}

#[tokio::test]
async fn unreachable_config_endpoint_fails_the_whole_fetch() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = Router::new().route(
        "/config",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down") }),
    );
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = FabricClient::new(&test_config(&base, 4 * 1024 * 1024));
    let err = client.fetch_candidates().await.err().unwrap();
    assert!(format!("{}", err).contains("Error retrieving content objects"));
}

struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

#[tokio::test]
async fn concurrent_downloads_never_exceed_the_derived_limit() {
    let entries: Vec<Value> = (0..12).map(|i| entry(&format!("iq__{i:02}"))).collect();

    let in_flight = Arc::new(InFlight {
        current: AtomicUsize::new(0),
        max: AtomicUsize::new(0),
    });
    let counter = in_flight.clone();
    let files_route = get(move |_: Path<(String, String, String)>| {
        let counter = counter.clone();
        async move {
            let now = counter.current.fetch_add(1, Ordering::SeqCst) + 1;
            counter.max.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(25)).await;
            counter.current.fetch_sub(1, Ordering::SeqCst);
            StatusCode::OK
        }
    });
    let base = spawn_fabric(entries, files_route).await;

    // 3 MiB budget over 1 MiB expected asset size bounds the fan-out at 3.
    let client = FabricClient::new(&test_config(&base, 3 * 1024 * 1024));
    let candidates = client.fetch_candidates().await.unwrap();

    assert_eq!(candidates.len(), 12);
    assert!(in_flight.max.load(Ordering::SeqCst) <= 3);
}
