/*!
 * Upload session manager.
 *
 * This module handles:
 * - Batch intake of candidate files
 * - Driving every admitted file through its own upload task
 * - Simulated progress while a collaborator call is outstanding
 * - Snapshots, change notifications and cleanup for the UI layer
 */

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::errors::UploadError;
use crate::uploader::{UploadReceipt, Uploader};

use super::intake;
use super::models::{SessionEvent, SessionSummary, SourceFile, UploadId, UploadItem, UploadStatus};
use super::progress::ProgressSimulation;

/// Tuning for an upload session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Progress simulation while uploads are outstanding
    pub progress: ProgressSimulation,
    /// Buffered change notifications per subscriber before it lags
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            progress: ProgressSimulation::default(),
            event_capacity: 256,
        }
    }
}

/// A tracked item plus the ticker driving its simulated progress
#[derive(Debug)]
struct Entry {
    item: UploadItem,
    ticker: Option<JoinHandle<()>>,
}

impl Entry {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    /// Items in insertion order. Every mutation happens under this lock.
    entries: Mutex<Vec<Entry>>,
    uploader: Arc<dyn Uploader>,
    options: SessionOptions,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionInner {
    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Advance simulated progress; returns false once the ticker should stop
    fn tick(&self, id: UploadId) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.iter_mut().find(|e| e.item.id() == id) else {
            return false;
        };
        if entry.item.status() != UploadStatus::Uploading {
            return false;
        }
        if let Some(next) = self.options.progress.next(entry.item.progress()) {
            if entry.item.advance_to(next) {
                self.publish(SessionEvent::Progressed { id, progress: next });
            }
        }
        true
    }

    fn finish(&self, id: UploadId, result: Result<UploadReceipt, UploadError>) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.iter_mut().find(|e| e.item.id() == id) else {
            debug!("Discarding upload result for removed item {}", id);
            return;
        };
        entry.stop_ticker();
        let name = entry.item.source_file().name().to_string();

        match result {
            Ok(receipt) => {
                if entry.item.complete() {
                    debug!("Uploaded {} (document id: {:?})", name, receipt.id);
                    self.publish(SessionEvent::Completed { id });
                }
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", name, e);
                if entry.item.fail(e.message()) {
                    let detail = entry.item.error_detail().unwrap_or_default().to_string();
                    self.publish(SessionEvent::Failed { id, detail });
                }
            }
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        for entry in self.entries.get_mut().iter_mut() {
            entry.stop_ticker();
        }
    }
}

/// Owns a batch of uploads and their lifecycle.
///
/// Cloning yields another handle to the same session. Uploads run as Tokio
/// tasks; files submitted outside a runtime are tracked but stay `Pending`.
#[derive(Debug, Clone)]
pub struct UploadSessionManager {
    inner: Arc<SessionInner>,
}

impl UploadSessionManager {
    /// Create a session that hands files to `uploader`
    pub fn new(uploader: Arc<dyn Uploader>, options: SessionOptions) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            inner: Arc::new(SessionInner {
                entries: Mutex::new(Vec::new()),
                uploader,
                options,
                events,
            }),
        }
    }

    /// Create a session with default options
    pub fn with_uploader(uploader: Arc<dyn Uploader>) -> Self {
        Self::new(uploader, SessionOptions::default())
    }

    /// Receive a `SessionEvent` for every change made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Intake
    // =========================================================================

    /// Admit the acceptable candidates and start uploading each of them.
    ///
    /// Candidates of an unsupported type or over the size limit are dropped
    /// without creating an item. Returns the ids of the admitted items in
    /// submission order.
    pub fn submit_files(&self, candidates: impl IntoIterator<Item = SourceFile>) -> Vec<UploadId> {
        let mut admitted = Vec::new();
        for file in candidates {
            match intake::check(&file) {
                Ok(()) => admitted.push(UploadItem::new(file)),
                Err(reason) => debug!("Skipping {}: {}", file.name(), reason),
            }
        }
        if admitted.is_empty() {
            return Vec::new();
        }

        let ids: Vec<UploadId> = admitted.iter().map(|item| item.id()).collect();
        info!("Queued {} file(s) for upload", ids.len());

        {
            let mut entries = self.inner.entries.lock();
            for item in admitted {
                let id = item.id();
                entries.push(Entry { item, ticker: None });
                self.inner.publish(SessionEvent::Added { id });
            }
        }

        if Handle::try_current().is_err() {
            warn!("No Tokio runtime available; {} upload(s) left pending", ids.len());
            return ids;
        }
        for id in &ids {
            self.start(*id);
        }
        ids
    }

    /// `Pending -> Uploading`: start the progress ticker and the collaborator call
    fn start(&self, id: UploadId) {
        let file = {
            let mut entries = self.inner.entries.lock();
            let Some(entry) = entries.iter_mut().find(|e| e.item.id() == id) else {
                return;
            };
            if !entry.item.begin() {
                return;
            }
            entry.ticker = Some(self.spawn_ticker(id));
            self.inner.publish(SessionEvent::Started { id });
            entry.item.source_file().clone()
        };

        let session = Arc::downgrade(&self.inner);
        let uploader = Arc::clone(&self.inner.uploader);
        tokio::spawn(async move {
            let result = uploader.upload(&file).await;
            match session.upgrade() {
                Some(session) => session.finish(id, result),
                None => debug!("Session dropped before upload of {} resolved", file.name()),
            }
        });
    }

    fn spawn_ticker(&self, id: UploadId) -> JoinHandle<()> {
        let session: Weak<SessionInner> = Arc::downgrade(&self.inner);
        // tokio rejects a zero period
        let period = self.inner.options.progress.interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                if !session.tick(id) {
                    break;
                }
            }
        })
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Snapshot of every item in insertion order
    pub fn items(&self) -> Vec<UploadItem> {
        self.inner.entries.lock().iter().map(|e| e.item.clone()).collect()
    }

    /// Items not yet complete (pending, uploading or failed), in insertion order
    pub fn active_items(&self) -> Vec<UploadItem> {
        self.filtered(|item| !item.is_complete())
    }

    /// Completed items in insertion order
    pub fn completed_items(&self) -> Vec<UploadItem> {
        self.filtered(UploadItem::is_complete)
    }

    fn filtered(&self, keep: impl Fn(&UploadItem) -> bool) -> Vec<UploadItem> {
        self.inner
            .entries
            .lock()
            .iter()
            .filter(|e| keep(&e.item))
            .map(|e| e.item.clone())
            .collect()
    }

    pub fn get(&self, id: UploadId) -> Option<UploadItem> {
        self.inner
            .entries
            .lock()
            .iter()
            .find(|e| e.item.id() == id)
            .map(|e| e.item.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item counts per status
    pub fn summary(&self) -> SessionSummary {
        self.inner.entries.lock().iter().map(|e| &e.item).collect()
    }

    /// True when no item is waiting on its collaborator call
    pub fn is_settled(&self) -> bool {
        self.summary().outstanding() == 0
    }

    /// Resolve once every remaining item has reached a terminal state
    pub async fn wait_until_settled(&self) {
        let mut events = self.subscribe();
        while !self.is_settled() {
            match events.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Discard one item regardless of its status.
    ///
    /// Removing an uploading item stops its progress ticker; the collaborator
    /// call keeps running and its result is ignored. Returns whether an item
    /// was removed.
    pub fn remove_item(&self, id: UploadId) -> bool {
        let mut entries = self.inner.entries.lock();
        let Some(index) = entries.iter().position(|e| e.item.id() == id) else {
            return false;
        };
        let mut entry = entries.remove(index);
        entry.stop_ticker();
        if entry.item.status() == UploadStatus::Uploading {
            debug!(
                "Removed {} while uploading; the in-flight request will be ignored",
                entry.item.source_file().name()
            );
        }
        self.inner.publish(SessionEvent::Removed { id });
        true
    }

    /// Remove every completed item. Returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let mut entries = self.inner.entries.lock();
        let ids: Vec<UploadId> = entries
            .iter()
            .filter(|e| e.item.is_complete())
            .map(|e| e.item.id())
            .collect();
        if ids.is_empty() {
            return 0;
        }
        entries.retain(|e| !e.item.is_complete());
        let count = ids.len();
        self.inner.publish(SessionEvent::Cleared { ids });
        count
    }
}
