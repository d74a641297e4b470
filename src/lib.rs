/*!
 * # Instimem - document uploader
 *
 * A Rust library for uploading documents to the Instimem knowledge base,
 * tracking every file's upload independently.
 *
 * ## Features
 *
 * - Intake filtering: PDF, DOCX, DOC and plain text up to 50 MiB
 * - Concurrent uploads, one task per file, no ordering between completions
 * - Simulated progress while a request is outstanding
 * - Change notifications for progress rendering
 * - REST uploader with injected bearer credentials, plus a demo uploader
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `upload`: the upload session manager and its item model:
 *   - `upload::intake`: media type and size policy
 *   - `upload::manager`: per-item lifecycle, views and cleanup
 *   - `upload::progress`: progress simulation
 * - `uploader`: collaborators that actually persist files:
 *   - `uploader::rest`: multipart POST to the document API
 *   - `uploader::mock`: in-process demo uploader
 * - `credentials`: bearer token providers
 * - `app_config`: Configuration management
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]

// Public modules
pub mod app_config;
pub mod credentials;
pub mod errors;
pub mod file_utils;
pub mod upload;
pub mod uploader;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, UploadError};
pub use upload::{SessionEvent, SourceFile, UploadId, UploadItem, UploadSessionManager, UploadStatus};
pub use uploader::{MockUploader, RestUploader, UploadReceipt, Uploader};
