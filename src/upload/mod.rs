/*!
 * Client-side upload pipeline.
 *
 * This module provides:
 * - Intake filtering of candidate files by media type and size
 * - Per-file upload state tracking with simulated progress
 * - Aggregate views, change notifications and cleanup
 */

pub mod intake;
pub mod manager;
pub mod models;
pub mod progress;

// Re-export main types
pub use intake::{ALLOWED_MEDIA_TYPES, MAX_FILE_SIZE, Rejection};
pub use manager::{SessionOptions, UploadSessionManager};
pub use models::{SessionEvent, SessionSummary, SourceFile, UploadId, UploadItem, UploadStatus};
pub use progress::{PROGRESS_CEILING, ProgressSimulation};
