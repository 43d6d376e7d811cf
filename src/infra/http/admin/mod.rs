mod cache;
mod groups;
mod health;
mod state;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::middleware::{log_responses, set_request_context};

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/_admin/cache/clear", post(cache::clear_cache))
        .route(
            "/_admin/groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route("/_health/db", get(health::admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
