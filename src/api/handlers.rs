use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::analytics::AnalyticsAggregator;
use crate::auth::Identity;
use crate::error::LinkError;
use crate::links::LinkRegistry;
use crate::models::{CreateLinkRequest, LinkResponse, UpdateLinkRequest};

pub struct ApiState {
    pub registry: Arc<LinkRegistry>,
    pub analytics: Arc<AnalyticsAggregator>,
    pub base_url: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
}

/// Malformed bodies get the same `{"error": ...}` shape as other failures
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, LinkError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| LinkError::Validation(rejection.body_text()))
}

/// Create a new short link
pub async fn create_link(
    State(state): State<Arc<ApiState>>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LinkResponse>), LinkError> {
    let request = body(payload)?;
    let link = state.registry.create(request, &identity).await?;
    Ok((
        StatusCode::CREATED,
        Json(LinkResponse::from_link(link, &state.base_url)),
    ))
}

/// All links of the caller's tenant, newest first
pub async fn list_links(
    State(state): State<Arc<ApiState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<LinkResponse>>, LinkError> {
    let links = state.registry.list(&identity.tenant_id).await?;
    Ok(Json(
        links
            .into_iter()
            .map(|link| LinkResponse::from_link(link, &state.base_url))
            .collect(),
    ))
}

pub async fn get_link(
    State(state): State<Arc<ApiState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<LinkResponse>, LinkError> {
    let link = state.registry.get(&id, &identity.tenant_id).await?;
    Ok(Json(LinkResponse::from_link(link, &state.base_url)))
}

/// Only the description can change
pub async fn update_link(
    State(state): State<Arc<ApiState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateLinkRequest>, JsonRejection>,
) -> Result<Json<LinkResponse>, LinkError> {
    let request = body(payload)?;
    let link = state
        .registry
        .update(&id, &identity.tenant_id, request.description)
        .await?;
    Ok(Json(LinkResponse::from_link(link, &state.base_url)))
}

pub async fn delete_link(
    State(state): State<Arc<ApiState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<StatusCode, LinkError> {
    state.registry.delete(&id, &identity.tenant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Wren URL shortener",
        version: env!("CARGO_PKG_VERSION"),
    })
}
