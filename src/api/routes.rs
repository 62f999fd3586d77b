use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::server::{admin_key_auth, AppState};

use super::admin::reload_catalog;
use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::players::{broadcast, join_player, leave_player, player_messages, set_language};
use super::render::render_preview;
use super::template::{get_sign, get_template, list_templates};

pub fn api_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/reload", post(reload_catalog))
        .route_layer(middleware::from_fn_with_state(state, admin_key_auth));

    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Templates
                .route("/templates", get(list_templates))
                .route("/templates/{key}", get(get_template))
                .route("/signs/{sign_key}", get(get_sign))
                .route("/render", post(render_preview))
                // Roster & broadcasts
                .route("/players", post(join_player))
                .route("/players/{id}", delete(leave_player))
                .route("/players/{id}/language", put(set_language))
                .route("/players/{id}/messages", get(player_messages))
                .route("/broadcast", post(broadcast))
                // Admin
                .nest("/admin", admin),
        )
}
