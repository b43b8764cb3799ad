use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::{error::SyncError, fs::operations::append_json_lines};

use super::queue::PendingAction;

/// Destination pending actions are replayed against.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Applies `actions` in order. An error means none of them can be considered applied.
    async fn push(&self, actions: &[PendingAction]) -> Result<(), SyncError>;
}

/// Appends replayed actions to a JSON lines journal. Acts as a local mirror that an external
/// sync tool can pick up.
#[derive(Debug, Clone)]
pub struct JournalRemote {
    path: PathBuf,
}

impl JournalRemote {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }
}

#[async_trait]
impl RemoteStore for JournalRemote {
    async fn push(&self, actions: &[PendingAction]) -> Result<(), SyncError> {
        debug!("Journaling {} actions into {:?}", actions.len(), self.path);
        append_json_lines(&self.path, actions)
            .await
            .map_err(|e| SyncError::Unavailable(format!("{e:#}")))
    }
}
