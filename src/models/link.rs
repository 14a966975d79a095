use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored short link. Timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: String,
    pub original_url: String,
    pub short_code: String,
    pub description: Option<String>,
    pub click_count: i64,
    pub created_at: i64,
    pub created_by: String,
    pub created_by_name: String,
    pub tenant_id: String,
}

/// Fields supplied by the registry when inserting a link
#[derive(Debug, Clone)]
pub struct NewLink {
    pub id: String,
    pub original_url: String,
    pub short_code: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_by_name: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Click {
    pub id: i64,
    pub link_id: String,
    pub clicked_at: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Request details captured when a short code is followed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Lower bounds (unix ms) of the analytics windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickWindows {
    pub today: i64,
    pub week: i64,
    pub month: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct ClickWindowCounts {
    pub today: i64,
    pub week: i64,
    pub month: i64,
}

/// A link whose cached counter disagrees with its click rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CountDrift {
    pub id: String,
    pub short_code: String,
    pub click_count: i64,
    pub actual: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub original_url: String,
    #[serde(default)]
    pub custom_short_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLinkRequest {
    #[serde(default)]
    pub description: Option<String>,
}

/// API representation of a link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResponse {
    pub id: String,
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub description: Option<String>,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub created_by_name: String,
    pub tenant_id: String,
}

impl LinkResponse {
    pub fn from_link(link: Link, base_url: &str) -> Self {
        let short_url = format!("{}/{}", base_url.trim_end_matches('/'), link.short_code);
        Self {
            id: link.id,
            original_url: link.original_url,
            short_code: link.short_code,
            short_url,
            description: link.description,
            click_count: link.click_count,
            created_at: millis_to_datetime(link.created_at),
            created_by: link.created_by,
            created_by_name: link.created_by_name,
            tenant_id: link.tenant_id,
        }
    }
}

pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
