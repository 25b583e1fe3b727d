//! JSON query surface over the engine state

use crate::history::AlertHistoryEntry;
use crate::mood::MarketMood;
use crate::runner::{Monitor, ReportError};
use crate::state::SymbolState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use market_data::{Interval, SourceHealth};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

pub type AppState = Arc<Monitor>;

pub fn router(monitor: AppState) -> Router {
    Router::new()
        .route("/api/symbols", get(get_symbols))
        .route("/api/history", get(get_history))
        .route("/api/mood", get(get_mood))
        .route("/api/report/:symbol/:interval", post(post_report))
        .route("/api/history/:id/annotation", post(post_annotation))
        .route("/health", get(health_check))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(monitor)
}

/// GET /api/symbols - current snapshot per (symbol, interval)
pub async fn get_symbols(State(monitor): State<AppState>) -> Json<Vec<SymbolState>> {
    let state = monitor.state();
    let state = state.read().await;
    Json(state.symbols().cloned().collect())
}

/// GET /api/history - newest first
pub async fn get_history(State(monitor): State<AppState>) -> Json<Vec<AlertHistoryEntry>> {
    let state = monitor.state();
    let snapshot = state.read().await.history().snapshot();
    Json(snapshot)
}

pub async fn get_mood(State(monitor): State<AppState>) -> Json<MarketMood> {
    let state = monitor.state();
    let mood = state.read().await.mood().clone();
    Json(mood)
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub symbol: String,
    pub interval: Interval,
    pub text: String,
}

/// POST /api/report/:symbol/:interval - fetch, compute and send a report now
pub async fn post_report(
    State(monitor): State<AppState>,
    Path((symbol, interval)): Path<(String, String)>,
) -> Result<Json<ReportResponse>, (StatusCode, String)> {
    let interval: Interval = interval
        .parse()
        .map_err(|e: market_data::MarketDataError| (StatusCode::BAD_REQUEST, e.to_string()))?;

    info!("Manual report requested for {} {}", symbol, interval);

    match monitor.manual_report(&symbol, interval).await {
        Ok(text) => Ok(Json(ReportResponse {
            symbol: symbol.to_uppercase(),
            interval,
            text,
        })),
        Err(e @ ReportError::Untracked(..)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e @ ReportError::Indicator(_)) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
        Err(e) => {
            warn!("Manual report for {} {} failed: {}", symbol, interval, e);
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnnotationRequest {
    pub text: String,
}

/// POST /api/history/:id/annotation
pub async fn post_annotation(
    State(monitor): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnnotationRequest>,
) -> Result<Json<AlertHistoryEntry>, (StatusCode, String)> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "annotation text is empty".to_string()));
    }

    monitor
        .annotate(id, text)
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("alert {} is not in history", id)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub pairs: usize,
    pub source: SourceHealth,
}

pub async fn health_check(State(monitor): State<AppState>) -> Json<HealthResponse> {
    let source = monitor.source_health().await;
    Json(HealthResponse {
        status: if source.is_healthy { "ok" } else { "degraded" },
        pairs: monitor.pairs().len(),
        source,
    })
}
