use async_trait::async_trait;
use log::{debug, error};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::credentials::CredentialProvider;
use crate::errors::UploadError;
use crate::upload::SourceFile;

use super::{UploadReceipt, Uploader};

/// Uploader that posts files to the document API
#[derive(Debug)]
pub struct RestUploader {
    /// HTTP client for API requests
    client: Client,
    /// API base URL, e.g. `http://localhost:8000/api/v1`
    base_url: String,
    /// Supplies the bearer token
    credentials: Arc<dyn CredentialProvider>,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl RestUploader {
    /// Create a new REST uploader
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            credentials,
        }
    }

    pub fn from_config(config: &Config, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::new(
            config.api_url.clone(),
            credentials,
            Duration::from_secs(config.upload.timeout_secs),
        )
    }

    /// Full URL of the upload endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/documents/upload", self.base_url.trim_end_matches('/'))
    }

    fn form_for(file: &SourceFile) -> Result<Form, UploadError> {
        let part = Part::bytes(file.payload().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.media_type())
            .map_err(|e| UploadError::RequestFailed(format!("Invalid media type '{}': {}", file.media_type(), e)))?;
        Ok(Form::new().part("file", part))
    }
}

/// Pick the message shown for a failed request.
///
/// Prefers the `message` field of a JSON error body, falling back to the
/// status's canonical reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

/// Parse a success body; an empty body yields an empty receipt
pub fn parse_receipt(body: &str) -> Result<UploadReceipt, UploadError> {
    if body.trim().is_empty() {
        return Ok(UploadReceipt::default());
    }
    serde_json::from_str(body).map_err(|e| UploadError::ParseError(e.to_string()))
}

#[async_trait]
impl Uploader for RestUploader {
    async fn upload(&self, file: &SourceFile) -> Result<UploadReceipt, UploadError> {
        let url = self.endpoint();
        let mut request = self.client.post(&url).multipart(Self::form_for(file)?);
        if let Some(token) = self.credentials.token() {
            request = request.bearer_auth(token);
        }

        debug!("POST {} ({}, {} bytes)", url, file.name(), file.size());
        let response = request.send().await.map_err(|e| {
            error!("Upload of {} failed to reach {}: {}", file.name(), url, e);
            UploadError::ConnectionError(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.credentials.clear();
            return Err(UploadError::Unauthorized);
        }

        let body = response
            .text()
            .await
            .map_err(|e| UploadError::ParseError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = error_message(status, &body);
            error!("Document API error ({}) for {}: {}", status, file.name(), message);
            return Err(UploadError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        parse_receipt(&body)
    }
}
