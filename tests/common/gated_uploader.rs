/*!
 * Uploader whose calls resolve only when the test says so
 *
 * Each file name can be given a gate; the upload of that file waits until the
 * gate is opened with a success or a failure message. Files without a gate
 * succeed immediately.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

use instimem::errors::UploadError;
use instimem::upload::SourceFile;
use instimem::uploader::{UploadReceipt, Uploader};

/// Opens the gate of one pending upload
pub type Gate = oneshot::Sender<Result<(), String>>;

#[derive(Debug, Default)]
pub struct GatedUploader {
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<(), String>>>>,
    calls: AtomicUsize,
}

impl GatedUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the upload of `name` until the returned gate is used
    pub fn gate(&self, name: &str) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(name.to_string(), rx);
        tx
    }

    /// Number of upload calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Uploader for GatedUploader {
    async fn upload(&self, file: &SourceFile) -> Result<UploadReceipt, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().remove(file.name());
        let Some(gate) = gate else {
            return Ok(UploadReceipt::default());
        };

        match gate.await {
            Ok(Ok(())) => Ok(UploadReceipt {
                id: None,
                title: Some(file.name().to_string()),
            }),
            Ok(Err(message)) => Err(UploadError::RequestFailed(message)),
            Err(_) => Err(UploadError::ConnectionError("gate dropped".to_string())),
        }
    }
}
