use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use super::AppState;

/// Admin key middleware.
/// Validates the X-Admin-Key header against `server.admin_key`
pub async fn admin_key_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // No key configured: admin routes are open (development mode)
    let Some(expected_key) = &state.settings.server.admin_key else {
        return Ok(next.run(req).await);
    };

    let admin_key = req
        .headers()
        .get("X-Admin-Key")
        .and_then(|v| v.to_str().ok());

    match admin_key {
        Some(key) if key == expected_key => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("Invalid admin key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing X-Admin-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
