//! Application wiring tests against a temporary store and a mock upstream.

use landfall_app::AppContext;
use landfall_common::resilience::CircuitState;
use landfall_domain::Config;
use landfall_infra::SchedulerError;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(dir: &TempDir, server: &MockServer) -> Config {
    let mut config = Config::default();
    config.database.path = dir.path().join("app.db").to_string_lossy().into_owned();
    config.upstream.url = format!("{}/resource/gh4g-9sfh.json", server.uri());
    config.upstream.timeout_secs = 5;
    config.resilience.retry.max_attempts = 1;
    config.resilience.circuit_breaker.failure_threshold = 1;
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_pass_populates_store_and_cache() {
    let dir = TempDir::new().expect("temp dir");
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "name": "Aachen", "year": "1880-01-01T00:00:00.000", "mass": "21"},
            {"id": "2", "name": "Aarhus", "year": "1951-01-01T00:00:00.000", "mass": "720"}
        ])))
        .mount(&server)
        .await;

    let ctx = AppContext::new(config_for(&dir, &server)).expect("context builds");
    let report = ctx.run_once().await.expect("pass succeeds");

    assert_eq!(report.added, 2);
    let cached = ctx.cache.all_landings(ctx.repository.as_ref()).await.unwrap();
    assert_eq!(cached.len(), 2);
    assert!(ctx.cache.contains("landings:all").await);
    assert_eq!(cached.iter().filter(|r| r.year == Some(1951)).count(), 1);
    assert_eq!(ctx.db.schema_version().unwrap(), Some(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_upstream_opens_circuit_until_reset() {
    let dir = TempDir::new().expect("temp dir");
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

    let ctx = AppContext::new(config_for(&dir, &server)).expect("context builds");

    let first = ctx.run_once().await.unwrap_err();
    assert!(matches!(first, SchedulerError::Pass(_)));
    assert_eq!(ctx.scheduler.circuit_state(), CircuitState::Open);

    let second = ctx.run_once().await.unwrap_err();
    assert!(second.to_string().contains("circuit"), "got {second}");
    assert_eq!(server.received_requests().await.map_or(0, |r| r.len()), 1);

    assert!(ctx.scheduler.reset_circuit());
    assert_eq!(ctx.scheduler.circuit_state(), CircuitState::Closed);
}

#[tokio::test(flavor = "multi_thread")]
async fn scheduler_starts_and_shuts_down() {
    let dir = TempDir::new().expect("temp dir");
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut ctx = AppContext::new(config_for(&dir, &server)).expect("context builds");
    ctx.start().await.expect("worker starts");
    assert!(ctx.scheduler.is_running());

    ctx.shutdown().await.expect("worker stops");
    assert!(!ctx.scheduler.is_running());
    ctx.shutdown().await.expect("second shutdown is a no-op");
}
