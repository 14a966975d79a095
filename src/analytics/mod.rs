//! Click analytics: recording clicks on redirect, client address extraction
//! and per-link statistics.

pub mod aggregator;
pub mod ip_extractor;
pub mod models;
pub mod recorder;

pub use aggregator::AnalyticsAggregator;
pub use ip_extractor::{client_address, extract_client_ip};
pub use models::{LinkAnalytics, RecentClick};
pub use recorder::ClickRecorder;
