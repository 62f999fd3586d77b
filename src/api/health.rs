//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::audience::RosterStats;
use crate::broadcast::BroadcastStatsSnapshot;
use crate::localizer::LocalizerStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub catalog: CatalogHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct CatalogHealthResponse {
    pub generation: u64,
    pub templates: usize,
    pub default_language: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub localization: LocalizerStats,
    pub roster: RosterStats,
    pub broadcasts: BroadcastStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.localizer.templates();
    // An empty registry renders every message as its key
    let status = if registry.is_empty() { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        catalog: CatalogHealthResponse {
            generation: registry.generation(),
            templates: registry.len(),
            default_language: state.localizer.languages().default_code().to_string(),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        localization: state.localizer.stats(),
        roster: state.roster.stats(),
        broadcasts: state.broadcaster.stats().snapshot(),
    })
}
