//! File-backed credential persistence.

use async_trait::async_trait;
use relay_core::{
    config::{shellexpand, SessionConfig},
    error::RelayError,
    session::Credentials,
    traits::CredentialStore,
};
use std::path::PathBuf;
use tracing::debug;

/// Stores credentials as a single JSON file. Writes go through a temp file
/// and a rename so a crash mid-write never leaves a torn file behind.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            path: PathBuf::from(shellexpand(&cfg.credentials_path)),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, RelayError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let creds = serde_json::from_slice(&content)?;
        Ok(Some(creds))
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), RelayError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(credentials)?;
        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Credentials saved to {}", self.path.display());
        Ok(())
    }
}
