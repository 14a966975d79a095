use axum::{routing::get, Router};
use std::sync::Arc;

use crate::config::{AnalyticsConfig, RedirectMode};

use super::handlers::{redirect_url, RedirectState};
use super::resolver::RedirectResolver;

pub fn create_redirect_router(
    resolver: Arc<RedirectResolver>,
    analytics_config: AnalyticsConfig,
    redirect_mode: RedirectMode,
) -> Router {
    let state = Arc::new(RedirectState {
        resolver,
        analytics_config,
        redirect_mode,
    });

    Router::new()
        .route("/{short_code}", get(redirect_url))
        .with_state(state)
}
