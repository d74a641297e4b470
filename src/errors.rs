/*!
 * Error types for the instimem uploader.
 *
 * This module contains custom error types for the upload collaborators and
 * the application shell, using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur while handing a file to an upload collaborator
#[derive(Error, Debug)]
pub enum UploadError {
    /// Error when building or sending the upload request fails
    #[error("Upload request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing the upload response fails
    #[error("Failed to parse upload response: {0}")]
    ParseError(String),

    /// Error returned by the document API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// The API rejected the stored credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error reading the file payload
    #[error("File error: {0}")]
    File(String),
}

impl UploadError {
    /// The human-readable failure reason shown next to a failed upload.
    ///
    /// Unlike `Display`, this carries no category prefix: an API error yields
    /// exactly the message the server sent.
    pub fn message(&self) -> String {
        match self {
            Self::RequestFailed(message)
            | Self::ParseError(message)
            | Self::ConnectionError(message)
            | Self::File(message) => message.clone(),
            Self::ApiError { message, .. } => message.clone(),
            Self::Unauthorized => "Unauthorized".to_string(),
        }
    }

    /// HTTP status code, when the failure came from the API
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status_code, .. } => Some(*status_code),
            Self::Unauthorized => Some(401),
            _ => None,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from an upload collaborator
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
