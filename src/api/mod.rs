//! API layer - HTTP endpoint handlers organized by concern.

mod admin;
mod health;
mod metrics;
mod players;
mod render;
mod routes;
mod template;

pub use admin::reload_catalog;
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use players::{broadcast, join_player, leave_player, player_messages, set_language};
pub use render::{convert_args, render_preview, ArgValue, RenderRequest, RenderResponse};
pub use routes::api_routes;
pub use template::{get_sign, get_template, list_templates};
