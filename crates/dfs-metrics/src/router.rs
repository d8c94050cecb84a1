use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the process-wide Prometheus recorder and returns a render
/// handle. Must be called exactly once per process, before any `metrics::`
/// macro use -- mirrors the original's package-level `var` block of
/// `prometheus.New*Vec` registrations, except here registration happens
/// lazily the first time each named metric is recorded.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new().install_recorder().expect("failed to install prometheus recorder")
}

/// Builds the `/metrics` router served on `metrics_addr`/`metrics_path`
/// (`SPEC_FULL.md` §6's configuration surface). Grounded on the teacher's
/// own `dekaf::metrics_server::build_router`.
pub fn build_router(handle: PrometheusHandle, path: &str) -> Router {
    Router::new().route(path, get(render)).with_state(handle)
}

async fn render(State(handle): State<PrometheusHandle>) -> (StatusCode, String) {
    (StatusCode::OK, handle.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn serves_rendered_metrics_on_the_configured_path() {
        let handle = install_recorder();
        metrics::counter!("dfs_test_counter").increment(1);
        let app = build_router(handle, "/metrics");

        let response = app.oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
