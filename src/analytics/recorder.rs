//! Click recording, either inside the redirect request or through a single
//! background writer fed by a bounded channel.
//!
//! The background writer is an actor: it owns the receiving end and applies
//! each click with the same transaction the inline path uses, so counters
//! never drift. When the queue is full the click is dropped with a warning.
//! A click whose link has vanished evicts the short code from any lookup
//! cache, so later redirects miss.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{AnalyticsConfig, ClickRecordingMode};
use crate::models::ClickMetadata;
use crate::storage::Storage;

struct ClickEvent {
    link_id: String,
    short_code: String,
    metadata: ClickMetadata,
}

enum WriterMessage {
    Record(ClickEvent),
    /// Acknowledged once every click queued before it has been written
    Flush(oneshot::Sender<()>),
}

struct ClickWriter {
    receiver: mpsc::Receiver<WriterMessage>,
    storage: Arc<dyn Storage>,
}

impl ClickWriter {
    async fn run(mut self) {
        while let Some(message) = self.receiver.recv().await {
            match message {
                WriterMessage::Record(event) => {
                    let storage = self.storage.as_ref();
                    if !write_click(storage, &event.link_id, &event.metadata).await {
                        storage.evict_short_code(&event.short_code).await;
                    }
                }
                WriterMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        info!("Click writer stopped");
    }
}

enum Mode {
    Inline(Arc<dyn Storage>),
    Background(mpsc::Sender<WriterMessage>),
}

pub struct ClickRecorder {
    mode: Mode,
}

impl ClickRecorder {
    pub fn inline(storage: Arc<dyn Storage>) -> Self {
        Self {
            mode: Mode::Inline(storage),
        }
    }

    /// Spawns the writer task; must be called inside a tokio runtime
    pub fn background(storage: Arc<dyn Storage>, queue_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        let writer = ClickWriter { receiver, storage };
        tokio::spawn(writer.run());

        Self {
            mode: Mode::Background(sender),
        }
    }

    pub fn from_config(storage: Arc<dyn Storage>, config: &AnalyticsConfig) -> Self {
        match config.click_recording {
            ClickRecordingMode::Inline => Self::inline(storage),
            ClickRecordingMode::Background => Self::background(storage, config.queue_size),
        }
    }

    pub fn mode(&self) -> ClickRecordingMode {
        match self.mode {
            Mode::Inline(_) => ClickRecordingMode::Inline,
            Mode::Background(_) => ClickRecordingMode::Background,
        }
    }

    /// Record one click. Failures are logged, never returned: a redirect
    /// must not fail because analytics could not be written.
    ///
    /// Returns `false` only when the link is known to be gone, which inline
    /// mode learns from the write. Queued clicks always report `true`.
    pub async fn record(&self, link_id: &str, short_code: &str, metadata: ClickMetadata) -> bool {
        match &self.mode {
            Mode::Inline(storage) => write_click(storage.as_ref(), link_id, &metadata).await,
            Mode::Background(sender) => {
                let event = ClickEvent {
                    link_id: link_id.to_string(),
                    short_code: short_code.to_string(),
                    metadata,
                };
                match sender.try_send(WriterMessage::Record(event)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(link_id, "Click queue full, dropping click");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!(link_id, "Click writer is gone, dropping click");
                    }
                }
                true
            }
        }
    }

    /// Wait until every click queued so far has been written
    pub async fn flush(&self) {
        if let Mode::Background(sender) = &self.mode {
            let (ack, done) = oneshot::channel();
            if sender.send(WriterMessage::Flush(ack)).await.is_ok() {
                let _ = done.await;
            }
        }
    }
}

/// `false` when the link no longer exists; write errors count as recorded
async fn write_click(storage: &dyn Storage, link_id: &str, metadata: &ClickMetadata) -> bool {
    match storage.record_click(link_id, metadata).await {
        Ok(true) => true,
        Ok(false) => {
            debug!(link_id, "link deleted before its click was recorded");
            false
        }
        Err(e) => {
            warn!(link_id, error = %e, "Failed to record click");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLink;
    use crate::storage::test_support::FaultyStorage;
    use crate::storage::{CachedStorage, SqliteStorage};
    use std::sync::atomic::Ordering;

    async fn storage_with_link() -> Arc<dyn Storage> {
        let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
        storage.init().await.unwrap();
        storage
            .insert_link(&NewLink {
                id: "link-1".to_string(),
                original_url: "https://example.com".to_string(),
                short_code: "abc".to_string(),
                description: None,
                created_by: "u".to_string(),
                created_by_name: "U".to_string(),
                tenant_id: "t".to_string(),
            })
            .await
            .unwrap();
        Arc::new(storage)
    }

    #[tokio::test]
    async fn inline_writes_before_returning() {
        let storage = storage_with_link().await;
        let recorder = ClickRecorder::inline(Arc::clone(&storage));

        assert!(recorder.record("link-1", "abc", ClickMetadata::default()).await);

        assert_eq!(storage.count_clicks("link-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn background_writes_are_visible_after_flush() {
        let storage = storage_with_link().await;
        let recorder = ClickRecorder::background(Arc::clone(&storage), 100);
        assert_eq!(recorder.mode(), ClickRecordingMode::Background);

        for _ in 0..20 {
            assert!(recorder.record("link-1", "abc", ClickMetadata::default()).await);
        }
        recorder.flush().await;

        let link = storage.get_link("link-1", "t").await.unwrap().unwrap();
        assert_eq!(link.click_count, 20);
        assert_eq!(storage.count_clicks("link-1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn missing_link_is_not_an_error() {
        let storage = storage_with_link().await;
        let recorder = ClickRecorder::inline(Arc::clone(&storage));

        assert!(!recorder.record("gone", "gone", ClickMetadata::default()).await);

        assert_eq!(storage.count_orphan_clicks().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn write_failure_still_reports_recorded() {
        let faulty = FaultyStorage::new().await;
        faulty.fail_clicks.store(true, Ordering::SeqCst);
        let recorder = ClickRecorder::inline(Arc::new(faulty));

        assert!(recorder.record("link-1", "abc", ClickMetadata::default()).await);
    }

    #[tokio::test]
    async fn background_writer_evicts_vanished_code() {
        let sqlite = storage_with_link().await;
        let cached: Arc<dyn Storage> = Arc::new(CachedStorage::new(Arc::clone(&sqlite), 100, 300));
        assert!(cached.get_link_by_code("abc").await.unwrap().is_some());

        // Deleted behind the cache's back
        sqlite.delete_link("link-1", "t").await.unwrap();
        assert!(cached.get_link_by_code("abc").await.unwrap().is_some());

        let recorder = ClickRecorder::background(Arc::clone(&cached), 10);
        assert!(recorder.record("link-1", "abc", ClickMetadata::default()).await);
        recorder.flush().await;

        assert!(cached.get_link_by_code("abc").await.unwrap().is_none());
    }
}
