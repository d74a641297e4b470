/*!
 * Upload item model and its state machine.
 *
 * An `UploadItem` only changes through its transition methods, which refuse
 * anything outside `Pending -> Uploading -> {Complete | Error}`. That keeps
 * `progress == 100` tied to `Complete` and the error detail tied to `Error`.
 */

use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Failure reason used when a collaborator error carries no message
pub const FALLBACK_ERROR_DETAIL: &str = "Upload failed";

/// Progress value of a finished upload
pub const PROGRESS_COMPLETE: f64 = 100.0;

/// Opaque identifier of a tracked upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A candidate file: its metadata plus the bytes to send
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    media_type: String,
    size: u64,
    payload: Bytes,
}

impl SourceFile {
    /// Create a file from its full content; the size is the payload length
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        let payload = payload.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: payload.len() as u64,
            payload,
        }
    }

    /// Create a candidate whose content was never loaded.
    ///
    /// Only the declared metadata is available, which is enough for intake to
    /// turn it down without reading a large file into memory.
    pub fn metadata_only(name: impl Into<String>, media_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size,
            payload: Bytes::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared media type, e.g. `application/pdf`
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// Lifecycle state of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Complete,
    Error,
}

impl UploadStatus {
    /// `Complete` and `Error` never transition again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        write!(f, "{}", label)
    }
}

/// One file's tracked upload
#[derive(Debug, Clone)]
pub struct UploadItem {
    id: UploadId,
    source_file: SourceFile,
    progress: f64,
    status: UploadStatus,
    error_detail: Option<String>,
}

impl UploadItem {
    /// A new item in `Pending` with zero progress
    pub fn new(source_file: SourceFile) -> Self {
        Self {
            id: UploadId::new(),
            source_file,
            progress: 0.0,
            status: UploadStatus::Pending,
            error_detail: None,
        }
    }

    pub fn id(&self) -> UploadId {
        self.id
    }

    pub fn source_file(&self) -> &SourceFile {
        &self.source_file
    }

    /// Percentage in `[0, 100]`
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    /// Failure reason, present only in `Error`
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.status == UploadStatus::Complete
    }

    /// `Pending -> Uploading`, resetting progress to zero
    pub(crate) fn begin(&mut self) -> bool {
        if self.status != UploadStatus::Pending {
            return false;
        }
        self.status = UploadStatus::Uploading;
        self.progress = 0.0;
        true
    }

    /// Move progress forward while uploading. Never moves it backwards.
    pub(crate) fn advance_to(&mut self, progress: f64) -> bool {
        if self.status != UploadStatus::Uploading || progress <= self.progress || progress >= PROGRESS_COMPLETE {
            return false;
        }
        self.progress = progress;
        true
    }

    /// `Uploading -> Complete`; progress jumps to 100
    pub(crate) fn complete(&mut self) -> bool {
        if self.status != UploadStatus::Uploading {
            return false;
        }
        self.status = UploadStatus::Complete;
        self.progress = PROGRESS_COMPLETE;
        true
    }

    /// `Uploading -> Error`; progress stays where the simulation left it
    pub(crate) fn fail(&mut self, detail: impl Into<String>) -> bool {
        if self.status != UploadStatus::Uploading {
            return false;
        }
        let detail = detail.into();
        self.status = UploadStatus::Error;
        self.error_detail = Some(if detail.trim().is_empty() {
            FALLBACK_ERROR_DETAIL.to_string()
        } else {
            detail
        });
        true
    }
}

/// Change notification published by the session manager.
///
/// Every mutation of the collection or of an item's fields produces exactly
/// one event, so a UI can re-render from it.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An admitted file became a tracked item
    Added { id: UploadId },
    /// The item entered `Uploading`
    Started { id: UploadId },
    /// Simulated progress moved forward
    Progressed { id: UploadId, progress: f64 },
    /// The collaborator accepted the file
    Completed { id: UploadId },
    /// The collaborator rejected the file
    Failed { id: UploadId, detail: String },
    /// The caller discarded the item
    Removed { id: UploadId },
    /// `clear_completed` dropped these items
    Cleared { ids: Vec<UploadId> },
}

impl SessionEvent {
    /// Ids touched by this event
    pub fn ids(&self) -> Vec<UploadId> {
        match self {
            Self::Added { id }
            | Self::Started { id }
            | Self::Progressed { id, .. }
            | Self::Completed { id }
            | Self::Failed { id, .. }
            | Self::Removed { id } => vec![*id],
            Self::Cleared { ids } => ids.clone(),
        }
    }
}

/// Item counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub pending: usize,
    pub uploading: usize,
    pub complete: usize,
    pub failed: usize,
}

impl SessionSummary {
    pub fn total(&self) -> usize {
        self.pending + self.uploading + self.complete + self.failed
    }

    /// Items still waiting on their collaborator call
    pub fn outstanding(&self) -> usize {
        self.pending + self.uploading
    }
}

impl<'a> FromIterator<&'a UploadItem> for SessionSummary {
    fn from_iter<I: IntoIterator<Item = &'a UploadItem>>(iter: I) -> Self {
        let mut summary = Self::default();
        for item in iter {
            match item.status() {
                UploadStatus::Pending => summary.pending += 1,
                UploadStatus::Uploading => summary.uploading += 1,
                UploadStatus::Complete => summary.complete += 1,
                UploadStatus::Error => summary.failed += 1,
            }
        }
        summary
    }
}
