//! HTTP API over the quadrant aggregator.
//!
//! Routes:
//! - `GET /api/stars`: flattened `{x, y, z, parallax}` array
//! - `GET /api/stars/report`: stars plus per-quadrant status
//! - `GET /api/quadrants`: the partitioned fetch tasks
//!
//! Aggregation blocks on network I/O, so each request runs it on the tokio
//! blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use starstream::{AggregateResult, Aggregator, Quadrant, QuadrantSource, QuadrantStatus, StarPoint};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared state for all handlers.
pub struct AppState {
    aggregator: Aggregator,
    source: Box<dyn QuadrantSource>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, source: impl QuadrantSource + 'static) -> Self {
        Self {
            aggregator,
            source: Box::new(source),
        }
    }

    fn run(&self) -> AggregateResult {
        self.aggregator.run(self.source.as_ref())
    }
}

/// Body of `GET /api/stars/report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarReport {
    pub stars: Vec<StarPoint>,
    pub quadrants: Vec<QuadrantStatus>,
}

impl From<AggregateResult> for StarReport {
    fn from(result: AggregateResult) -> Self {
        let quadrants = result.statuses();
        Self {
            stars: result.into_stars(),
            quadrants,
        }
    }
}

/// Handler failure returned as a JSON error body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Aggregation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("{self}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

async fn aggregate_blocking(state: Arc<AppState>) -> Result<AggregateResult, ApiError> {
    Ok(tokio::task::spawn_blocking(move || state.run()).await?)
}

async fn get_stars(State(state): State<Arc<AppState>>) -> Result<Json<Vec<StarPoint>>, ApiError> {
    let result = aggregate_blocking(state).await?;
    Ok(Json(result.into_stars()))
}

async fn get_report(State(state): State<Arc<AppState>>) -> Result<Json<StarReport>, ApiError> {
    let result = aggregate_blocking(state).await?;
    Ok(Json(result.into()))
}

async fn get_quadrants(State(state): State<Arc<AppState>>) -> Json<Vec<Quadrant>> {
    Json(state.aggregator.tasks().to_vec())
}

/// Build the API router. CORS is open to any origin for GET.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/api/stars", get(get_stars))
        .route("/api/stars/report", get(get_report))
        .route("/api/quadrants", get(get_quadrants))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until the process exits.
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Star server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(Arc::new(state))).await?;
    Ok(())
}
