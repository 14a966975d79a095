use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use super::resolver::RedirectResolver;
use crate::analytics::client_address;
use crate::config::{AnalyticsConfig, RedirectMode};
use crate::error::LinkError;
use crate::models::ClickMetadata;

pub struct RedirectState {
    pub resolver: Arc<RedirectResolver>,
    pub analytics_config: AnalyticsConfig,
    pub redirect_mode: RedirectMode,
}

/// Redirect to original URL
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    request: Request,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let headers = request.headers();

    let click = ClickMetadata {
        ip_address: client_address(headers, peer, &state.analytics_config)
            .map(|ip| ip.to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    match state.resolver.resolve(&code, click).await {
        Ok(url) => match location(&url) {
            Some(location) => (
                state.redirect_mode.status_code(),
                [(header::LOCATION, location)],
            )
                .into_response(),
            None => {
                tracing::error!(short_code = %code, "stored URL cannot be sent as a Location header");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        },
        Err(LinkError::NotFound) => (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(err) => {
            tracing::error!(short_code = %code, error = %err, "redirect lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// The stored URL in its serialized form, which percent-encodes non-ASCII
/// text. Only a URL that no longer parses is sent as stored.
fn location(url: &str) -> Option<HeaderValue> {
    match url::Url::parse(url) {
        Ok(parsed) => HeaderValue::from_str(parsed.as_str()).ok(),
        Err(_) => HeaderValue::from_str(url).ok(),
    }
}
