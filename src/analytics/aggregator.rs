//! Per-link click statistics read from stored click rows

use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::analytics::models::{LinkAnalytics, RecentClick};
use crate::error::{LinkError, LinkResult};
use crate::models::ClickWindows;
use crate::storage::Storage;

pub struct AnalyticsAggregator {
    storage: Arc<dyn Storage>,
    recent_limit: i64,
}

impl AnalyticsAggregator {
    pub fn new(storage: Arc<dyn Storage>, recent_limit: i64) -> Self {
        Self {
            storage,
            recent_limit: recent_limit.max(1),
        }
    }

    /// Statistics for a tenant's link; [`LinkError::NotFound`] for any other
    /// tenant's link.
    pub async fn get_analytics(&self, link_id: &str, tenant_id: &str) -> LinkResult<LinkAnalytics> {
        let link = self
            .storage
            .get_link(link_id, tenant_id)
            .await?
            .ok_or(LinkError::NotFound)?;

        let windows = window_cutoffs(Utc::now());
        let counts = self.storage.click_window_counts(&link.id, windows).await?;
        let recent = self.storage.recent_clicks(&link.id, self.recent_limit).await?;

        debug!(
            short_code = %link.short_code,
            recent = recent.len(),
            "computed link analytics"
        );

        Ok(LinkAnalytics {
            link_id: link.id,
            total_clicks: link.click_count,
            clicks_today: counts.today,
            clicks_this_week: counts.week,
            clicks_this_month: counts.month,
            recent_clicks: recent.into_iter().map(RecentClick::from).collect(),
        })
    }
}

/// Window starts: midnight UTC today, seven days before that, thirty days before that
pub fn window_cutoffs(now: DateTime<Utc>) -> ClickWindows {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    ClickWindows {
        today: midnight.timestamp_millis(),
        week: (midnight - Duration::days(7)).timestamp_millis(),
        month: (midnight - Duration::days(30)).timestamp_millis(),
    }
}
