/*!
 * Upload collaborators.
 *
 * The session manager never transmits bytes itself; it hands each admitted
 * file to an `Uploader`:
 * - `rest`: multipart POST to the document API
 * - `mock`: in-process uploader for demo mode and tests
 */

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;

use crate::errors::UploadError;
use crate::upload::SourceFile;

/// What the collaborator reports back for an accepted file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UploadReceipt {
    /// Id assigned to the stored document, when the backend returns one
    #[serde(default)]
    pub id: Option<String>,
    /// Title the backend stored the document under
    #[serde(default)]
    pub title: Option<String>,
}

/// Common trait for everything that can persist a file
///
/// Implementations must be usable from many concurrent upload tasks.
#[async_trait]
pub trait Uploader: Send + Sync + Debug {
    /// Persist/ingest one file
    ///
    /// # Returns
    /// * `Result<UploadReceipt, UploadError>` - The receipt, or an error whose
    ///   message is shown next to the failed item
    async fn upload(&self, file: &SourceFile) -> Result<UploadReceipt, UploadError>;
}

pub mod mock;
pub mod rest;

pub use mock::{MockBehavior, MockUploader};
pub use rest::RestUploader;
