use livesync::{fetch, FetchError, FetchResult, ReconciliationEngine, SnapshotFetcher};
use livesync_types::warehouse::Order;
use livesync_watch::{build_router, Mirror, StatusResponse};
use serde_json::{json, Value};
use std::sync::Arc;

fn orders_fetcher() -> Arc<dyn SnapshotFetcher<Order>> {
    Arc::new(fetch::from_fn(|| async {
        FetchResult::Ok(vec![Order::new("o1", "PENDING"), Order::new("o2", "SHIPPED")])
    }))
}

fn failing_fetcher() -> Arc<dyn SnapshotFetcher<Order>> {
    Arc::new(fetch::from_fn(|| async {
        FetchResult::<Vec<Order>>::Err(FetchError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        })
    }))
}

/// Spin up the HTTP server over an engine's view on an OS-assigned port,
/// returning the base URL.
async fn spawn_test_server(engine: &ReconciliationEngine<Order>) -> String {
    let app = build_router(Arc::new(Mirror::new("orders", engine.watch())));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

async fn get_status(base: &str) -> StatusResponse {
    let resp = reqwest::get(format!("{}/api/v1/status", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

// ── Status ──────────────────────────────────────────────────────

#[tokio::test]
async fn status_before_first_fetch() {
    let engine = ReconciliationEngine::new("orders", orders_fetcher());
    let base = spawn_test_server(&engine).await;

    let status = get_status(&base).await;

    assert_eq!(status.kind, "orders");
    assert_eq!(status.state, "uninitialized");
    assert_eq!(status.entity_count, 0);
    assert!(!status.is_loading);
    assert_eq!(status.fetch_count, 0);
    assert!(status.last_fetched_at.is_none());
}

#[tokio::test]
async fn status_after_initial_fetch() {
    let engine = ReconciliationEngine::new("orders", orders_fetcher());
    engine.initialize().await.unwrap();
    let base = spawn_test_server(&engine).await;

    let status = get_status(&base).await;

    assert_eq!(status.state, "live");
    assert_eq!(status.entity_count, 2);
    assert_eq!(status.fetch_count, 1);
    assert!(status.last_error.is_none());
    assert!(status.last_fetched_at.is_some());
}

#[tokio::test]
async fn status_reports_fetch_error() {
    let engine = ReconciliationEngine::new("orders", failing_fetcher());
    assert!(engine.initialize().await.is_err());
    let base = spawn_test_server(&engine).await;

    let status = get_status(&base).await;

    assert_eq!(status.state, "fetching");
    assert_eq!(
        status.last_error.as_deref(),
        Some("server returned 502: bad gateway")
    );
}

#[tokio::test]
async fn status_follows_view_updates() {
    let engine = ReconciliationEngine::new("orders", orders_fetcher());
    let base = spawn_test_server(&engine).await;
    assert_eq!(get_status(&base).await.fetch_count, 0);

    engine.initialize().await.unwrap();
    engine.refetch().await.unwrap();

    assert_eq!(get_status(&base).await.fetch_count, 2);
}

#[tokio::test]
async fn status_content_type_is_json() {
    let engine = ReconciliationEngine::new("orders", orders_fetcher());
    let base = spawn_test_server(&engine).await;
    let resp = reqwest::get(format!("{}/api/v1/status", base))
        .await
        .unwrap();

    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("application/json"));
}

// ── Snapshot ────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_unavailable_before_first_fetch() {
    let engine = ReconciliationEngine::new("orders", failing_fetcher());
    let _ = engine.initialize().await;
    let base = spawn_test_server(&engine).await;

    let resp = reqwest::get(format!("{}/api/v1/snapshot", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn snapshot_serves_entities_in_order() {
    let engine = ReconciliationEngine::new("orders", orders_fetcher());
    engine.initialize().await.unwrap();
    let base = spawn_test_server(&engine).await;

    let resp = reqwest::get(format!("{}/api/v1/snapshot", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!([
            { "id": "o1", "status": "PENDING" },
            { "id": "o2", "status": "SHIPPED" }
        ])
    );
}

#[tokio::test]
async fn snapshot_survives_teardown() {
    let engine = ReconciliationEngine::new("orders", orders_fetcher());
    engine.initialize().await.unwrap();
    engine.teardown();
    let base = spawn_test_server(&engine).await;

    let status = get_status(&base).await;
    assert_eq!(status.state, "unmounted");

    let resp = reqwest::get(format!("{}/api/v1/snapshot", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// ── Routing ─────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_route_returns_404() {
    let engine = ReconciliationEngine::new("orders", orders_fetcher());
    let base = spawn_test_server(&engine).await;
    let resp = reqwest::get(format!("{}/api/v1/nonexistent", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}
