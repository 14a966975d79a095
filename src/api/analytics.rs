//! Analytics API handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

use super::handlers::ApiState;
use crate::analytics::LinkAnalytics;
use crate::auth::Identity;
use crate::error::LinkError;

/// Click statistics for one of the caller's links
pub async fn get_link_analytics(
    State(state): State<Arc<ApiState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<LinkAnalytics>, LinkError> {
    let analytics = state
        .analytics
        .get_analytics(&id, &identity.tenant_id)
        .await?;
    Ok(Json(analytics))
}
