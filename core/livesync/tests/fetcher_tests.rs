use livesync::fetch::from_fn;
use livesync::{
    FetchError, FetchResult, HttpFetcher, HttpFetcherConfig, LiveSyncConfig, ResponseShape,
    SnapshotFetcher,
};
use livesync_types::warehouse::{Order, Product};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, route: &str) -> HttpFetcherConfig {
    HttpFetcherConfig::new(server.uri(), route, &LiveSyncConfig::default())
}

#[tokio::test]
async fn fetches_plain_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "o1", "status": "PENDING", "total": 12.5 },
            { "id": "o2", "status": "SHIPPED" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher: HttpFetcher<Order> = HttpFetcher::new(config(&server, "/api/orders")).unwrap();
    let orders = fetcher.fetch_all().await.unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, "o1");
    assert_eq!(orders[0].extra.get("total"), Some(&json!(12.5)));
    assert_eq!(orders[1].status, "SHIPPED");
}

#[tokio::test]
async fn unwraps_envelope_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "p1", "sku": "SKU-1" }],
            "total": 1
        })))
        .mount(&server)
        .await;

    let fetcher: HttpFetcher<Product> = HttpFetcher::new(
        config(&server, "api/products").with_shape(ResponseShape::Field("data".into())),
    )
    .unwrap();
    let products = fetcher.fetch_all().await.unwrap();

    assert_eq!(products, vec![Product::new("p1", "SKU-1")]);
}

#[tokio::test]
async fn missing_envelope_field_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let fetcher: HttpFetcher<Order> = HttpFetcher::new(
        config(&server, "/api/orders").with_shape(ResponseShape::Field("data".into())),
    )
    .unwrap();

    assert!(matches!(fetcher.fetch_all().await, Err(FetchError::Decode(_))));
}

#[tokio::test]
async fn server_error_maps_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let fetcher: HttpFetcher<Order> = HttpFetcher::new(config(&server, "/api/orders")).unwrap();
    let err = fetcher.fetch_all().await.unwrap_err();

    assert_eq!(
        err,
        FetchError::Status {
            status: 502,
            body: "bad gateway".into()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "status": "NO_ID" }])))
        .mount(&server)
        .await;

    let fetcher: HttpFetcher<Order> = HttpFetcher::new(config(&server, "/api/orders")).unwrap();
    let err = fetcher.fetch_all().await.unwrap_err();

    assert!(matches!(err, FetchError::Decode(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher: HttpFetcher<Order> =
        HttpFetcher::new(config(&server, "/api/orders").with_bearer_token("s3cret")).unwrap();

    assert!(fetcher.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let mut cfg = config(&server, "/api/orders");
    cfg.timeout_ms = 100;
    let fetcher: HttpFetcher<Order> = HttpFetcher::new(cfg).unwrap();

    assert_eq!(fetcher.fetch_all().await.unwrap_err(), FetchError::Timeout);
}

#[test]
fn url_joins_with_single_slash() {
    let cfg = HttpFetcherConfig::new("http://wms.local/", "/api/orders", &LiveSyncConfig::default());
    assert_eq!(cfg.url(), "http://wms.local/api/orders");
    let cfg = HttpFetcherConfig::new("http://wms.local", "api/orders", &LiveSyncConfig::default());
    assert_eq!(cfg.url(), "http://wms.local/api/orders");
}

#[tokio::test]
async fn closure_fetcher() {
    let fetcher = from_fn(|| async { FetchResult::Ok(vec![Order::new("o1", "PENDING")]) });
    let orders = fetcher.fetch_all().await.unwrap();
    assert_eq!(orders, vec![Order::new("o1", "PENDING")]);
}
