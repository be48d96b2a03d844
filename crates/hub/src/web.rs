use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use irrigation_controller::Intent;
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::state::{SeriesPoint, SharedState, StatusResponse};

const INDEX_HTML: &str = include_str!("ui/index.html");

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(api_status))
        .route("/api/series", get(api_series))
        .route("/api/mode/toggle", post(toggle_mode))
        .route("/api/pump/toggle", post(toggle_pump))
        .route("/api/thresholds/soil", put(set_soil_threshold))
        .route("/api/thresholds/humidity", put(set_humidity_threshold))
        .route("/api/intent", post(post_intent))
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], INDEX_HTML)
}

async fn api_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(state.to_status(&state.control.snapshot()))
}

async fn api_series(State(state): State<SharedState>) -> Json<Vec<SeriesPoint>> {
    let snapshot = state.control.snapshot();
    Json(snapshot.series.iter().map(SeriesPoint::from).collect())
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ThresholdBody {
    value: i64,
}

async fn toggle_mode(State(state): State<SharedState>) -> Result<Json<StatusResponse>, ApiError> {
    dispatch(&state, Intent::ToggleMode).await
}

async fn toggle_pump(State(state): State<SharedState>) -> Result<Json<StatusResponse>, ApiError> {
    dispatch(&state, Intent::ToggleManualPump).await
}

async fn set_soil_threshold(
    State(state): State<SharedState>,
    Json(body): Json<ThresholdBody>,
) -> Result<Json<StatusResponse>, ApiError> {
    dispatch(&state, Intent::SetSoilThreshold(body.value)).await
}

async fn set_humidity_threshold(
    State(state): State<SharedState>,
    Json(body): Json<ThresholdBody>,
) -> Result<Json<StatusResponse>, ApiError> {
    dispatch(&state, Intent::SetHumidityThreshold(body.value)).await
}

/// Generic form: `{"intent": "set_soil_threshold", "value": 35}`.
async fn post_intent(
    State(state): State<SharedState>,
    Json(intent): Json<Intent>,
) -> Result<Json<StatusResponse>, ApiError> {
    dispatch(&state, intent).await
}

async fn dispatch(state: &SharedState, intent: Intent) -> Result<Json<StatusResponse>, ApiError> {
    let snapshot = state.control.send(intent).await.map_err(ApiError)?;
    Ok(Json(state.to_status(&snapshot)))
}

/// The only runtime failure: the control loop is gone.
struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("intent rejected: {:#}", self.0);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": format!("{:#}", self.0) })),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(state: SharedState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {port}"))?;

    tracing::info!("web ui listening on http://{addr}");

    axum::serve(listener, router(state))
        .await
        .context("web server error")
}

// ===========================================================================
// Tests
// ===========================================================================
