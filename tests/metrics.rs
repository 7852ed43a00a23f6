// tests/metrics.rs
//
// One test per binary: the Prometheus recorder is process-global.
use shuttle_axum::axum::body::{self, Body};
use shuttle_axum::axum::http::{Request, StatusCode};
use tower::ServiceExt as _;

use job_radar::app::open_store_with_metrics;
use job_radar::store::LoadStatus;

#[tokio::test]
async fn startup_store_recovery_is_visible_on_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");
    std::fs::write(&path, "{ not json").unwrap();

    let (metrics, store) = open_store_with_metrics(&path).unwrap();
    assert!(matches!(store.load_status(), LoadStatus::Recovered { .. }));

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert_eq!(sample(&text, "radar_store_load_errors_total"), Some(1.0), "{text}");
    assert_eq!(sample(&text, "radar_store_records"), Some(0.0), "{text}");
}

fn sample(exposition: &str, name: &str) -> Option<f64> {
    exposition
        .lines()
        .filter(|l| !l.starts_with('#'))
        .find_map(|l| l.strip_prefix(name)?.strip_prefix(' ')?.trim().parse().ok())
}
