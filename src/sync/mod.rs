//! Replication of local mutations. Mutations made while offline are recorded in a durable queue
//! and replayed against a [remote::RemoteStore] once connectivity returns.

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use connectivity::{ConnectivityEvent, ConnectivityMonitor, TcpProbe};
use queue::{FlushPolicy, OfflineQueue, QueueState};
use remote::{JournalRemote, RemoteStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::{Clock, DefaultClock};

pub mod args;
pub mod connectivity;
pub mod queue;
pub mod remote;
pub mod shutdown;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub fn sync_dir(dir: &Path) -> std::path::PathBuf {
    dir.join("sync")
}

pub fn default_journal(dir: &Path) -> std::path::PathBuf {
    dir.join("remote").join("journal.jsonl")
}

/// Long running sync service: watches connectivity and keeps the queue drained while online.
pub async fn start_sync(dir: &Path, policy: FlushPolicy, args: args::SyncArgs) -> Result<()> {
    let queue = Arc::new(OfflineQueue::open(sync_dir(dir), policy, Box::new(DefaultClock)).await?);
    let remote = JournalRemote::new(args.journal.unwrap_or_else(|| default_journal(dir)))?;

    let (sender, receiver) = mpsc::channel::<ConnectivityEvent>(10);
    // Whatever was left over from a previous run gets replayed right away.
    sender.send(ConnectivityEvent::SyncRequested).await?;

    let shutdown_token = CancellationToken::new();

    let monitor = ConnectivityMonitor::new(
        sender,
        Box::new(TcpProbe::new(args.probe, PROBE_TIMEOUT)),
        shutdown_token.clone(),
        Duration::from_secs(args.probe_interval.max(1)),
        Box::new(DefaultClock),
    );

    let sync = SyncModule::new(
        receiver,
        queue,
        Box::new(remote),
        shutdown_token.clone(),
        Duration::from_secs(args.retry_interval.max(1)),
        Box::new(DefaultClock),
    );

    info!("Sync service started");
    let (_, monitor_result, sync_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        monitor.run(),
        sync.run(),
    );

    if let Err(monitor_result) = monitor_result {
        error!("Connectivity monitor got an error {:?}", monitor_result);
    }

    if let Err(sync_result) = sync_result {
        error!("Sync module got an error {:?}", sync_result);
    }

    Ok(())
}

/// Drives an [OfflineQueue] from connectivity events, and retries retained actions on a fixed
/// interval while online.
pub struct SyncModule {
    events: mpsc::Receiver<ConnectivityEvent>,
    queue: Arc<OfflineQueue>,
    remote: Box<dyn RemoteStore>,
    shutdown: CancellationToken,
    retry_interval: Duration,
    clock: Box<dyn Clock>,
}

impl SyncModule {
    pub fn new(
        events: mpsc::Receiver<ConnectivityEvent>,
        queue: Arc<OfflineQueue>,
        remote: Box<dyn RemoteStore>,
        shutdown: CancellationToken,
        retry_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            events,
            queue,
            remote,
            shutdown,
            retry_interval,
            clock,
        }
    }

    async fn handle(&self, event: ConnectivityEvent) {
        let result = match event {
            ConnectivityEvent::Offline => self.queue.go_offline().await,
            ConnectivityEvent::Online => self.queue.go_online(self.remote.as_ref()).await.map(drop),
            ConnectivityEvent::SyncRequested if self.queue.is_offline() => {
                debug!("Sync requested while offline, skipping");
                Ok(())
            }
            ConnectivityEvent::SyncRequested => {
                self.queue.go_online(self.remote.as_ref()).await.map(drop)
            }
        };
        if let Err(e) = result {
            error!("Failed to handle {event:?} {e:?}");
        }
    }

    async fn retry(&self) {
        if self.queue.state() != QueueState::Idle {
            return;
        }
        if let Err(e) = self.queue.retry(self.remote.as_ref()).await {
            error!("Retrying pending actions failed {e:?}");
        }
    }

    /// Runs until shutdown or until every event sender is gone.
    pub async fn run(mut self) -> Result<()> {
        let mut retry_point = self.clock.instant() + self.retry_interval;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle(event).await,
                        None => return Ok(()),
                    }
                }
                _ = self.clock.sleep_until(retry_point) => {
                    retry_point += self.retry_interval;
                    self.retry().await;
                }
            }
        }
    }
}
