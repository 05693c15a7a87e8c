//! Media sync
//!
//! Background reconciliation between cards and the media host:
//! - a periodic sweep uploads images that are still stored inline
//! - deletion notices from the backend's realtime channel destroy media
//!   whose card was removed elsewhere
//!
//! Both loops stop when their [`CancellationToken`] fires. Losing the
//! realtime channel only delays cleanup.

use crate::manager::BoardManager;
use crate::services::media_pipeline::ImageSource;
use aac_common::events::BoardEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A card row deleted on the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionNotice {
    pub card_id: String,
    /// Media handle of the deleted card, if it had one
    pub media_id: Option<String>,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub uploaded: usize,
    pub failed: usize,
    /// Nothing to do, or no media host to upload to
    pub skipped: bool,
}

pub struct MediaSync {
    manager: Arc<BoardManager>,
}

impl MediaSync {
    pub fn new(manager: Arc<BoardManager>) -> Self {
        Self { manager }
    }

    /// Upload every inline user image once
    pub async fn sweep(&self) -> SweepReport {
        let pipeline = self.manager.pipeline();
        if !pipeline.has_host() {
            debug!("No media host configured, sweep skipped");
            return SweepReport {
                skipped: true,
                ..Default::default()
            };
        }

        let pending = self.manager.pending_uploads().await;
        if pending.is_empty() {
            return SweepReport {
                skipped: true,
                ..Default::default()
            };
        }

        info!(pending = pending.len(), "Media sync sweep started");
        let mut report = SweepReport::default();

        for card in pending {
            let media = match pipeline.ingest(ImageSource::DataUri(card.image_url.clone())).await {
                Ok(media) => media,
                Err(e) => {
                    warn!(card_id = %card.id, error = %e, "Inline image upload failed");
                    report.failed += 1;
                    continue;
                }
            };

            match self.manager.attach_media(&card.id, &media).await {
                Ok(_) => report.uploaded += 1,
                Err(e) => {
                    warn!(card_id = %card.id, error = %e, "Could not store hosted image, discarding upload");
                    if let Some(public_id) = &media.public_id {
                        pipeline.delete(public_id).await;
                    }
                    report.failed += 1;
                }
            }
        }

        info!(uploaded = report.uploaded, failed = report.failed, "Media sync sweep finished");
        self.manager.events().emit_lossy(BoardEvent::MediaSyncCompleted {
            uploaded: report.uploaded,
            failed: report.failed,
        });
        report
    }

    /// Sweep every `interval` until cancelled
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Media sync stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Destroy media for cards deleted on the backend
    ///
    /// Returns the number of media deletions that succeeded.
    pub async fn watch_deletions(&self, mut notices: mpsc::Receiver<DeletionNotice>, cancel: CancellationToken) -> usize {
        let pipeline = self.manager.pipeline();
        let mut destroyed = 0;

        loop {
            let notice = tokio::select! {
                _ = cancel.cancelled() => break,
                notice = notices.recv() => notice,
            };

            let Some(notice) = notice else {
                debug!("Deletion channel closed");
                break;
            };

            match &notice.media_id {
                Some(public_id) => {
                    if pipeline.delete(public_id).await {
                        debug!(card_id = %notice.card_id, public_id = %public_id, "Orphaned media destroyed");
                        destroyed += 1;
                    }
                }
                None => debug!(card_id = %notice.card_id, "Deleted card had no hosted media"),
            }
        }

        destroyed
    }
}
