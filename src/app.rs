//! Application assembly: storage, collaborators and the HTTP router

use anyhow::{Context, Result};
use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::analytics::{AnalyticsAggregator, ClickRecorder};
use crate::api::{self, ApiState};
use crate::auth::AuthService;
use crate::config::{AuthMode, Config};
use crate::links::LinkRegistry;
use crate::redirect::{self, RedirectResolver};
use crate::shortcode::generator_for;
use crate::storage::{CachedStorage, SqliteStorage, Storage};

/// The router plus the handles the server needs at shutdown
pub struct App {
    pub router: Router,
    pub resolver: Arc<RedirectResolver>,
}

/// Open the configured database and create the schema. Wraps the store in
/// the short-code cache unless `max_entries` is zero.
pub async fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    info!("Using SQLite storage: {}", config.database.url);
    let sqlite = SqliteStorage::new(&config.database.url, config.database.max_connections)
        .await
        .context("failed to open database")?;
    sqlite.init().await.context("failed to initialize schema")?;

    if config.cache.max_entries == 0 {
        info!("Short-code cache disabled");
        return Ok(Arc::new(sqlite));
    }

    Ok(Arc::new(CachedStorage::new(
        Arc::new(sqlite),
        config.cache.max_entries,
        config.cache.ttl_secs,
    )))
}

/// Wire every collaborator around `storage` and `auth_service`
pub fn create_app(storage: Arc<dyn Storage>, auth_service: Arc<AuthService>, config: &Config) -> App {
    let generator = generator_for(&config.short_code);
    info!(strategy = generator.name(), "Short code generator ready");

    let registry = Arc::new(LinkRegistry::new(
        Arc::clone(&storage),
        generator,
        &config.short_code,
    ));
    let analytics = Arc::new(AnalyticsAggregator::new(
        Arc::clone(&storage),
        config.analytics.recent_limit,
    ));
    let recorder = Arc::new(ClickRecorder::from_config(
        Arc::clone(&storage),
        &config.analytics,
    ));
    let resolver = Arc::new(RedirectResolver::new(Arc::clone(&storage), recorder));

    let api_state = Arc::new(ApiState {
        registry,
        analytics,
        base_url: config.base_url.clone(),
    });

    let router = Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health_check))
        .nest("/api", api::create_api_router(api_state, auth_service))
        .merge(redirect::create_redirect_router(
            Arc::clone(&resolver),
            config.analytics.clone(),
            config.redirect_status,
        ))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    App { router, resolver }
}

/// Load everything from configuration
pub async fn build(config: &Config) -> Result<App> {
    let storage = open_storage(config).await?;

    let auth_service = Arc::new(
        AuthService::from_config(&config.auth)
            .await
            .context("failed to initialize authentication")?,
    );

    match config.auth.mode {
        AuthMode::None => {
            warn!(
                tenant_id = %config.auth.dev_identity.tenant_id,
                "Authentication is disabled - every API request uses the development identity"
            );
        }
        AuthMode::Oauth => {
            if let Some(oauth) = config.auth.oauth.as_ref() {
                info!(
                    "OAuth authentication enabled (issuer: {}, audience: {})",
                    oauth.issuer_url, oauth.audience
                );
            }
        }
    }

    Ok(create_app(storage, auth_service, config))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    base.allow_origin(origins)
}
