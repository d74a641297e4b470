/*!
 * Credential providers for the REST uploader.
 *
 * The bearer token is injected into the uploader rather than read from
 * ambient state, so the upload pipeline can be tested in isolation.
 */

use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::RwLock;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of the bearer token sent with uploads
pub trait CredentialProvider: Send + Sync + Debug {
    /// Current token, if one is available
    fn token(&self) -> Option<String>;

    /// Forget the token after the API rejected it
    fn clear(&self);
}

/// Token held in memory, e.g. from the command line
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: RwLock::new((!token.trim().is_empty()).then_some(token)),
        }
    }

    /// No token at all; requests go out unauthenticated
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn clear(&self) {
        *self.token.write() = None;
    }
}

/// Token persisted in a file between runs.
///
/// The file is read once when the provider is built; `store` and `clear`
/// keep the in-memory copy and the file in step.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
    token: Arc<RwLock<Option<String>>>,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let token = Self::read_token(&path);
        Self {
            path,
            token: Arc::new(RwLock::new(token)),
        }
    }

    /// `<config dir>/instimem/token`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("instimem").join("token"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a token, creating the parent directory if needed
    pub fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create token directory: {:?}", parent))?;
        }
        let token = token.trim();
        fs::write(&self.path, token)
            .with_context(|| format!("Failed to write token file: {:?}", self.path))?;
        *self.token.write() = (!token.is_empty()).then(|| token.to_string());
        debug!("Stored token in {:?}", self.path);
        Ok(())
    }

    fn read_token(path: &Path) -> Option<String> {
        let token = fs::read_to_string(path).ok()?;
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

impl CredentialProvider for FileCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn clear(&self) {
        *self.token.write() = None;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed token file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove token file {:?}: {}", self.path, e),
        }
    }
}
