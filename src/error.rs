//! Error taxonomy of the data layer. Application level code wraps these into [anyhow::Error].

use thiserror::Error;

/// Failures of the local persistence cache.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Stored data under a key could not be parsed. Recovered locally by discarding the entry.
    #[error("malformed data under key {key}: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A collection could not be written. The mutation only survives in memory.
    #[error("failed to write key {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize value for key {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Keys become file names, so only a conservative alphabet is allowed.
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while replaying pending actions against a remote store.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store rejected action {action_id}: {reason}")]
    Rejected { action_id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_names_the_key() {
        let err = StorageError::Write {
            key: "tasks".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "quota"),
        };
        assert_eq!(format!("{err}"), "failed to write key tasks: quota");
    }

    #[test]
    fn rejection_names_the_action() {
        let err = SyncError::Rejected {
            action_id: "42".into(),
            reason: "conflict".into(),
        };
        assert_eq!(format!("{err}"), "remote store rejected action 42: conflict");
    }

    #[test]
    fn io_errors_convert() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = StorageError::from(io_err);
        let display = format!("{err}");
        assert!(display.contains("file missing"), "got: {display}");
    }
}
