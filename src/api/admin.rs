use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::AppState;
use crate::template::RegistryReport;

/// POST /api/v1/admin/reload - Re-read the catalog directory and palette
#[tracing::instrument(name = "http.reload", skip(state))]
pub async fn reload_catalog(State(state): State<AppState>) -> Result<Json<RegistryReport>> {
    let localizer = state.localizer.clone();
    // File I/O; keep it off the async workers
    let report = tokio::task::spawn_blocking(move || localizer.reload())
        .await
        .map_err(|e| crate::error::AppError::Internal(format!("Reload task failed: {}", e)))??;
    Ok(Json(report))
}
