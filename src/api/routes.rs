use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::auth::{require_identity, AuthService};

use super::analytics::get_link_analytics;
use super::handlers::{
    create_link, delete_link, get_link, health_check, list_links, update_link, ApiState,
};

/// Routes served under `/api`. Everything but `/health` requires an identity.
pub fn create_api_router(state: Arc<ApiState>, auth_service: Arc<AuthService>) -> Router {
    let protected_routes = Router::new()
        .route("/links", get(list_links).post(create_link))
        .route(
            "/links/{id}",
            get(get_link).put(update_link).delete(delete_link),
        )
        .route("/links/{id}/analytics", get(get_link_analytics))
        .route_layer(middleware::from_fn_with_state(auth_service, require_identity))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
}
