use crate::dashboard::Snapshot;
use crate::export::export_csv_string;
use crate::history::load_history;
use crate::metrics;
use crate::model::{LedState, PerMetric};
use crate::series::ChartData;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::error;

#[derive(Debug, Clone)]
struct AppState {
    snapshots: watch::Receiver<Snapshot>,
    history_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub latest: PerMetric<Option<f64>>,
    pub led_state: LedState,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn create_router(snapshots: watch::Receiver<Snapshot>, history_dir: Option<PathBuf>) -> Router {
    let state = AppState {
        snapshots,
        history_dir,
    };

    Router::new()
        .route("/api/v1/latest", get(get_latest))
        .route("/api/v1/series", get(get_series))
        .route("/api/v1/export.csv", get(get_export))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn get_latest(State(state): State<AppState>) -> Json<LatestResponse> {
    let snapshot = state.snapshots.borrow();
    Json(LatestResponse {
        latest: snapshot.latest.clone(),
        led_state: snapshot.led_state,
        updated_at: snapshot.updated_at,
    })
}

async fn get_series(State(state): State<AppState>) -> Json<PerMetric<ChartData>> {
    Json(state.snapshots.borrow().series.clone())
}

async fn get_export(State(state): State<AppState>) -> std::result::Result<Response, AppError> {
    let Some(dir) = &state.history_dir else {
        return Ok((StatusCode::NOT_FOUND, "History is not enabled").into_response());
    };

    let history = load_history(dir).await?;
    let body = export_csv_string(&history)?;
    let filename = format!(
        "attachment; filename=\"sensor_data_{}.csv\"",
        Utc::now().format("%Y%m%d_%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        body,
    )
        .into_response())
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
