/*!
 * Mock uploader used in demo mode and tests.
 *
 * Simulates the document API without a network:
 * - `MockUploader::working(delay_ms)` - Always succeeds after a delay
 * - `MockUploader::failing(message)` - Always fails with the given message
 * - `MockUploader::intermittent(n)` - Fails every Nth upload
 */

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::UploadError;
use crate::upload::SourceFile;

use super::{UploadReceipt, Uploader};

/// Behavior mode for the mock uploader
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Succeeds after the given delay
    Working { delay_ms: u64 },
    /// Fails after the given delay with this message
    Failing { delay_ms: u64, message: String },
    /// Fails every Nth upload (1-based), succeeds otherwise
    Intermittent { fail_every: usize },
}

/// In-process stand-in for the document API
#[derive(Debug, Clone)]
pub struct MockUploader {
    behavior: MockBehavior,
    /// Shared between clones so call counts survive being handed to the session
    request_count: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockUploader {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create an uploader that always succeeds after `delay_ms`
    pub fn working(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Working { delay_ms })
    }

    /// Create an uploader that always fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(MockBehavior::Failing {
            delay_ms: 0,
            message: message.into(),
        })
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Number of uploads attempted so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Names of the files handed over, in call order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    fn receipt(file: &SourceFile, count: usize) -> UploadReceipt {
        UploadReceipt {
            id: Some(format!("demo-{}", count + 1)),
            title: Some(file.name().to_string()),
        }
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload(&self, file: &SourceFile) -> Result<UploadReceipt, UploadError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.received.lock().push(file.name().to_string());
        debug!("Mock upload #{} for {}", count + 1, file.name());

        match &self.behavior {
            MockBehavior::Working { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(Self::receipt(file, count))
            }

            MockBehavior::Failing { delay_ms, message } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Err(UploadError::RequestFailed(message.clone()))
            }

            MockBehavior::Intermittent { fail_every } => {
                if *fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(UploadError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (upload #{})", count + 1),
                    })
                } else {
                    Ok(Self::receipt(file, count))
                }
            }
        }
    }
}
