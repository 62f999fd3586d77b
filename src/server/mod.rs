mod app;
mod middleware;
mod state;

pub use app::create_app;
pub use middleware::admin_key_auth;
pub use state::AppState;
