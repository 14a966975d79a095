//! Data models for analytics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{millis_to_datetime, Click};

/// Click statistics of one link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkAnalytics {
    pub link_id: String,
    /// The link's `click_count`
    pub total_clicks: i64,
    /// Since 00:00 UTC today
    pub clicks_today: i64,
    /// Since 00:00 UTC seven days ago
    pub clicks_this_week: i64,
    /// Since 00:00 UTC thirty days ago
    pub clicks_this_month: i64,
    /// Newest first
    pub recent_clicks: Vec<RecentClick>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentClick {
    pub clicked_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<Click> for RecentClick {
    fn from(click: Click) -> Self {
        Self {
            clicked_at: millis_to_datetime(click.clicked_at),
            ip_address: click.ip_address,
            user_agent: click.user_agent,
        }
    }
}
