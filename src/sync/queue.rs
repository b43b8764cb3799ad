use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    fs::operations::{append_json_lines, read_locked, write_locked, LockedFile},
    storage::entities::EntityKind,
    utils::{clock::Clock, dir::ensure_dir},
};

use super::remote::RemoteStore;

const QUEUE_FILE: &str = "pending-actions.jsonl";
const STATE_FILE: &str = "state.json";

/// First retry delay of a failed action in seconds. Doubles with every attempt.
const BACKOFF_BASE_SECONDS: i64 = 5;
const BACKOFF_MAX_SECONDS: i64 = 15 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

/// A mutation waiting to be replayed against the remote store. `payload` is a full snapshot of
/// the entity at the time of the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub entity: EntityKind,
    #[serde(rename = "data")]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt: Option<DateTime<Utc>>,
}

impl PendingAction {
    pub fn new(
        kind: ActionKind,
        entity: EntityKind,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            entity,
            payload,
            timestamp,
            attempts: 0,
            next_attempt: None,
        }
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(|v| v.as_str())
    }

    fn entity_key(&self) -> Option<(EntityKind, String)> {
        self.entity_id().map(|id| (self.entity, id.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Online, nothing in flight.
    Idle,
    /// Offline, mutations are appended to the queue.
    Recording,
    /// Online, queued actions are being replayed.
    Syncing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FlushPolicy {
    /// Push everything as one batch, then clear the queue whether the push worked or not.
    Clear,
    /// Push actions one by one, keep the ones that failed and retry them with backoff.
    #[default]
    Outbox,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub pushed: usize,
    pub retained: usize,
    /// Actions removed from the queue without reaching the remote.
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    Pushed,
    /// Only the local cache has the mutation.
    LocalOnly,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    connectivity: Connectivity,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

pub fn backoff(attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    Duration::seconds((BACKOFF_BASE_SECONDS << exponent).min(BACKOFF_MAX_SECONDS))
}

/// Durable FIFO of [PendingAction]s plus the online/offline state machine driving it.
///
/// The queue lives in a JSON lines file so separate processes share it; every access happens
/// under an advisory lock. The last known connectivity is persisted next to it, so a process
/// that starts while offline keeps recording.
pub struct OfflineQueue {
    queue_path: PathBuf,
    state_path: PathBuf,
    policy: FlushPolicy,
    clock: Box<dyn Clock>,
    state: std::sync::Mutex<QueueState>,
    io: Mutex<()>,
}

impl OfflineQueue {
    pub async fn open(dir: PathBuf, policy: FlushPolicy, clock: Box<dyn Clock>) -> Result<Self> {
        let dir = ensure_dir(dir)?;
        let state_path = dir.join(STATE_FILE);
        let persisted = read_state(&state_path).await;
        let state = match persisted.connectivity {
            Connectivity::Online => QueueState::Idle,
            Connectivity::Offline => QueueState::Recording,
        };
        debug!("Opened offline queue in {dir:?} as {state:?}");

        Ok(Self {
            queue_path: dir.join(QUEUE_FILE),
            state_path,
            policy,
            clock,
            state: std::sync::Mutex::new(state),
            io: Mutex::new(()),
        })
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    pub fn state(&self) -> QueueState {
        *self.state.lock().unwrap_or_else(|v| v.into_inner())
    }

    fn set_state(&self, state: QueueState) {
        *self.state.lock().unwrap_or_else(|v| v.into_inner()) = state;
    }

    pub fn is_offline(&self) -> bool {
        self.state() == QueueState::Recording
    }

    /// Everything currently queued, oldest first.
    pub async fn pending(&self) -> Result<Vec<PendingAction>> {
        let _io = self.io.lock().await;
        let mut file = LockedFile::open_exclusive(&self.queue_path).await?;
        let actions = file.read_json_lines::<PendingAction>().await;
        file.unlock().await?;
        Ok(actions?)
    }

    /// Appends an action regardless of the current state.
    pub async fn enqueue(&self, action: PendingAction) -> Result<()> {
        let _io = self.io.lock().await;
        debug!("Queueing {:?} {} {:?}", action.kind, action.entity, action.entity_id());
        append_json_lines(&self.queue_path, std::slice::from_ref(&action)).await
    }

    /// Hands a mutation over for replication. Offline (or mid-sync) it is queued. Online it is
    /// pushed straight to `remote`; a failed push is queued for retry under
    /// [FlushPolicy::Outbox] and only logged under [FlushPolicy::Clear]. Under
    /// [FlushPolicy::Outbox] an entity with actions still queued keeps queueing until those are
    /// synced.
    pub async fn submit(
        &self,
        action: PendingAction,
        remote: Option<&dyn RemoteStore>,
    ) -> Result<Submission> {
        match self.state() {
            QueueState::Recording | QueueState::Syncing => {
                self.enqueue(action).await?;
                Ok(Submission::Queued)
            }
            QueueState::Idle => {
                let Some(remote) = remote else {
                    return Ok(Submission::LocalOnly);
                };
                if self.policy == FlushPolicy::Outbox && self.has_pending_for(&action).await? {
                    debug!(
                        "Queueing {} behind earlier actions of the same {}",
                        action.id, action.entity
                    );
                    self.enqueue(action).await?;
                    return Ok(Submission::Queued);
                }
                match remote.push(std::slice::from_ref(&action)).await {
                    Ok(()) => Ok(Submission::Pushed),
                    Err(e) => match self.policy {
                        FlushPolicy::Outbox => {
                            warn!("Direct push of {} failed, queueing it: {e}", action.id);
                            let mut action = action;
                            action.attempts = 1;
                            action.next_attempt = Some(self.clock.time() + backoff(1));
                            self.enqueue(action).await?;
                            Ok(Submission::Queued)
                        }
                        FlushPolicy::Clear => {
                            error!("Direct push of {} failed: {e}", action.id);
                            Ok(Submission::LocalOnly)
                        }
                    },
                }
            }
        }
    }

    /// Whether an earlier action for the same entity is still queued. A later action pushed
    /// ahead of it would be overwritten once the earlier one is retried.
    async fn has_pending_for(&self, action: &PendingAction) -> Result<bool> {
        let Some(key) = action.entity_key() else {
            return Ok(false);
        };
        Ok(self
            .pending()
            .await?
            .iter()
            .any(|queued| queued.entity_key().as_ref() == Some(&key)))
    }

    /// Connectivity lost: start recording.
    pub async fn go_offline(&self) -> Result<()> {
        if self.state() != QueueState::Recording {
            info!("Connectivity lost, recording mutations");
        }
        self.set_state(QueueState::Recording);
        self.persist(Connectivity::Offline).await
    }

    /// Connectivity restored: replay everything queued, ignoring backoff, then become idle.
    #[instrument(skip_all)]
    pub async fn go_online(&self, remote: &dyn RemoteStore) -> Result<FlushReport> {
        info!("Connectivity restored, syncing pending actions");
        // Stays in the previous state when the switch can't be persisted.
        self.persist(Connectivity::Online).await?;
        self.set_state(QueueState::Syncing);
        let result = self.flush_queue(remote, true).await;
        self.set_state(QueueState::Idle);
        result
    }

    /// Retries queued actions whose backoff elapsed. Does nothing unless idle and online.
    pub async fn retry(&self, remote: &dyn RemoteStore) -> Result<FlushReport> {
        if self.state() != QueueState::Idle {
            return Ok(FlushReport::default());
        }
        self.set_state(QueueState::Syncing);
        let result = self.flush_queue(remote, false).await;
        self.set_state(QueueState::Idle);
        result
    }

    async fn persist(&self, connectivity: Connectivity) -> Result<()> {
        let state = PersistedState {
            connectivity,
            updated_at: Some(self.clock.time()),
        };
        write_locked(&self.state_path, &serde_json::to_vec(&state)?).await?;
        Ok(())
    }

    async fn flush_queue(
        &self,
        remote: &dyn RemoteStore,
        ignore_backoff: bool,
    ) -> Result<FlushReport> {
        let _io = self.io.lock().await;
        let mut file = LockedFile::open_exclusive(&self.queue_path).await?;
        let result = self.flush_file(&mut file, remote, ignore_backoff).await;
        file.unlock().await?;
        result
    }

    async fn flush_file(
        &self,
        file: &mut LockedFile,
        remote: &dyn RemoteStore,
        ignore_backoff: bool,
    ) -> Result<FlushReport> {
        let actions = file.read_json_lines::<PendingAction>().await?;
        if actions.is_empty() {
            return Ok(FlushReport::default());
        }
        info!("Syncing {} pending actions", actions.len());

        let mut report = FlushReport::default();
        match self.policy {
            FlushPolicy::Clear => {
                match remote.push(&actions).await {
                    Ok(()) => report.pushed = actions.len(),
                    Err(e) => {
                        error!("Failed to sync {} pending actions: {e}", actions.len());
                        report.dropped = actions.len();
                    }
                }
                file.rewrite_json_lines::<PendingAction>(&[]).await?;
            }
            FlushPolicy::Outbox => {
                let now = self.clock.time();
                let mut retained = vec![];
                // Entities with an earlier action still queued. Their later actions wait too.
                let mut blocked = HashSet::<(EntityKind, String)>::new();

                for mut action in actions {
                    let key = action.entity_key();
                    let held = key.as_ref().is_some_and(|k| blocked.contains(k));
                    let waiting = !ignore_backoff && action.next_attempt.is_some_and(|t| t > now);

                    if held || waiting {
                        blocked.extend(key);
                        retained.push(action);
                        continue;
                    }

                    match remote.push(std::slice::from_ref(&action)).await {
                        Ok(()) => report.pushed += 1,
                        Err(e) => {
                            action.attempts += 1;
                            action.next_attempt = Some(now + backoff(action.attempts));
                            warn!(
                                "Failed to sync action {} (attempt {}): {e}",
                                action.id, action.attempts
                            );
                            blocked.extend(key);
                            retained.push(action);
                        }
                    }
                }

                report.retained = retained.len();
                file.rewrite_json_lines(&retained).await?;
            }
        }

        info!(
            "Sync finished: {} pushed, {} retained, {} dropped",
            report.pushed, report.retained, report.dropped
        );
        Ok(report)
    }
}

async fn read_state(path: &Path) -> PersistedState {
    match read_locked(path).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring malformed sync state: {e}");
            PersistedState::default()
        }),
        Ok(None) => PersistedState::default(),
        Err(e) => {
            warn!("Couldn't read sync state: {e}");
            PersistedState::default()
        }
    }
}
