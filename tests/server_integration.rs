//! HTTP surface tests
//!
//! Drives the axum router directly with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screeps_exporter::config::{Config, ServerEntry};
use screeps_exporter::server::{router, AppState};
use screeps_exporter::transformer::CONTENT_TYPE;

fn config_for(servers: Vec<ServerEntry>) -> Config {
    let mut config = Config::default();
    config.http.timeout_ms = 500;
    config.servers = servers;
    config
}

fn token_entry(name: &str, host: String) -> ServerEntry {
    ServerEntry {
        name: name.to_string(),
        host: Some(host),
        shard: Some("shard2".to_string()),
        path: Some("metrics".to_string()),
        token: Some("abc".to_string()),
        ..Default::default()
    }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_scraped_samples() {
    let screeps = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/memory"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Ratelimit-Remaining", "88")
                .set_body_json(common::memory_body(&common::sample_metrics())),
        )
        .mount(&screeps)
        .await;

    let state = tokio_test::assert_ok!(AppState::from_config(config_for(vec![token_entry(
        "mmo",
        screeps.uri()
    )])));
    let (status, content_type, body) = get(router(state), "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(CONTENT_TYPE));
    assert!(body.contains("# TYPE screeps_cpu_used gauge"));
    assert!(body.contains("screeps_cpu_used{shard=\"shard2\"} 14.2"));
    assert!(body.contains("# TYPE screeps_creeps_spawned_total counter"));
    assert!(body.contains("screeps_creeps_spawned_total{room=\"W8N3\",shard=\"shard2\"} 310"));
    assert!(body.contains("# HELP screeps_api_rate_limit_remaining Screeps API rate limit"));
    assert!(body.contains("screeps_api_rate_limit_remaining{server=\"mmo\"} 88"));
    assert!(body.contains("screeps_exporter_target_up{server=\"mmo\"} 1"));
    assert!(body.contains("screeps_exporter_targets 1"));
}

/// Bot metrics cannot shadow the exporter's own series
#[tokio::test]
async fn test_exporter_metrics_win_name_clashes() {
    let screeps = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/memory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::memory_body(
            &serde_json::json!([
                { "key": "screeps_exporter_targets", "value": 99 },
                { "key": "screeps_exporter_target_up", "value": 0, "labels": { "server": "mmo" } },
                { "key": "screeps_rooms", "value": 3 }
            ]),
        )))
        .mount(&screeps)
        .await;

    let state = AppState::from_config(config_for(vec![token_entry("mmo", screeps.uri())])).unwrap();
    let (status, _, body) = get(router(state), "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("screeps_rooms 3"));
    assert_eq!(
        body.lines()
            .filter(|l| l.starts_with("screeps_exporter_targets "))
            .collect::<Vec<_>>(),
        vec!["screeps_exporter_targets 1"]
    );
    assert_eq!(
        body.lines()
            .filter(|l| l.starts_with("screeps_exporter_target_up"))
            .collect::<Vec<_>>(),
        vec!["screeps_exporter_target_up{server=\"mmo\"} 1"]
    );
}

/// A failing target still yields a 200 with the other targets' samples
#[tokio::test]
async fn test_metrics_endpoint_with_failing_target() {
    let healthy = MockServer::start().await;
    let broken = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/user/memory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::memory_body(&common::sample_metrics())),
        )
        .mount(&healthy)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user/memory"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&broken)
        .await;

    let state = AppState::from_config(config_for(vec![
        token_entry("good", healthy.uri()),
        token_entry("bad", broken.uri()),
    ]))
    .unwrap();
    let (status, _, body) = get(router(state), "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("screeps_cpu_used"));
    assert!(body.contains("screeps_exporter_target_up{server=\"good\"} 1"));
    assert!(body.contains("screeps_exporter_target_up{server=\"bad\"} 0"));
}

#[tokio::test]
async fn test_custom_metrics_path() {
    let mut config = config_for(Vec::new());
    config.server.path = "/stats".to_string();
    let state = AppState::from_config(config).unwrap();

    let (status, _, body) = get(router(state.clone()), "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("screeps_exporter_targets 0"));

    let (status, _, _) = get(router(state), "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = AppState::from_config(config_for(vec![token_entry(
        "mmo",
        "http://127.0.0.1:1".to_string(),
    )]))
    .unwrap();
    let (status, _, body) = get(router(state), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["targets"], 1);
}

#[tokio::test]
async fn test_root_links_metrics_path() {
    let state = AppState::from_config(config_for(Vec::new())).unwrap();
    let (status, _, body) = get(router(state), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Screeps Exporter"));
    assert!(body.contains("href=\"/metrics\""));
}
