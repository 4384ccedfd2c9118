//! Axum router and HTTP handlers.
//!
//! `build_router` is the single entry point; `main.rs` attaches the trace
//! layer so tests can drive the bare router.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::error;

use crate::{
    api_types::{HealthResponse, StatusResponse, VersionResponse},
    state::{uptime_secs, AppState},
};

/// Build the exporter router. The metrics route lives at `info.metrics_path`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let metrics_path = state.info.metrics_path.clone();
    Router::new()
        .route("/", get(landing))
        .route("/healthz", get(health))
        .route("/version", get(version))
        .route("/v1/status", get(status_handler))
        .route(&metrics_path, get(metrics))
        .with_state(state)
}

pub(crate) async fn metrics(State(st): State<Arc<AppState>>) -> Response {
    match st.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, st.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics exposition failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub(crate) async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}

pub(crate) async fn version(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let cluster = st.info.cluster.as_ref();
    Json(VersionResponse {
        service: st.build.service.to_string(),
        version: st.build.version.to_string(),
        config_hash: st.info.config_hash.clone(),
        repository: st.engine.repository().to_string(),
        cluster_name: cluster.map(|c| c.cluster_name.clone()),
        cluster_version: cluster.map(|c| c.version.number.clone()),
    })
}

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let last_cycle = st.last_cycle.read().await.clone();
    Json(StatusResponse {
        repository: st.engine.repository().to_string(),
        schedule: st.info.schedule.clone(),
        threads: st.engine.threads(),
        cycle_running: st.engine.is_running(),
        uptime_secs: uptime_secs(),
        last_cycle,
    })
}

pub(crate) async fn landing(State(st): State<Arc<AppState>>) -> Html<String> {
    let path = &st.info.metrics_path;
    Html(format!(
        "<html>\n\
         <head><title>Elasticsearch Snapshot Exporter</title></head>\n\
         <body>\n\
         <h1>Elasticsearch Snapshot Exporter</h1>\n\
         <p>Repository: {repo}</p>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        repo = st.engine.repository(),
    ))
}
