use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
    /// Explicit request to replay the queue, independent of a connectivity change.
    SyncRequested,
}

/// Answers whether the remote side can currently be reached.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Considers the network reachable when a TCP connection to `addr` opens within `timeout`.
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: String, timeout: Duration) -> Self {
        Self { addr, timeout }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Probe to {} failed {e}", self.addr);
                false
            }
            Err(_) => {
                debug!("Probe to {} timed out", self.addr);
                false
            }
        }
    }
}

/// Polls a [ConnectivityProbe] and reports transitions. The first probe always produces an event
/// so consumers start from a known state.
pub struct ConnectivityMonitor {
    next: mpsc::Sender<ConnectivityEvent>,
    probe: Box<dyn ConnectivityProbe>,
    shutdown: CancellationToken,
    probe_interval: Duration,
    clock: Box<dyn Clock>,
    reachable: Option<bool>,
}

impl ConnectivityMonitor {
    pub fn new(
        next: mpsc::Sender<ConnectivityEvent>,
        probe: Box<dyn ConnectivityProbe>,
        shutdown: CancellationToken,
        probe_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            probe,
            shutdown,
            probe_interval,
            clock,
            reachable: None,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut probe_point = self.clock.instant();
        loop {
            probe_point += self.probe_interval;

            let reachable = self.probe.is_reachable().await;
            if self.reachable != Some(reachable) {
                let event = if reachable {
                    ConnectivityEvent::Online
                } else {
                    ConnectivityEvent::Offline
                };
                info!("Connectivity changed: {event:?}");
                self.next
                    .send(event)
                    .await
                    .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                self.reachable = Some(reachable);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(probe_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::utils::{clock::DefaultClock, logging::TEST_LOGGING};

    use super::{ConnectivityEvent, ConnectivityMonitor, MockConnectivityProbe};

    #[tokio::test(start_paused = true)]
    async fn test_emits_only_transitions() -> Result<()> {
        *TEST_LOGGING;
        let mut probe = MockConnectivityProbe::new();
        let mut answers = vec![true, true, false, true].into_iter();
        probe
            .expect_is_reachable()
            .returning(move || answers.next().unwrap_or(true));

        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let monitor = ConnectivityMonitor::new(
            sender,
            Box::new(probe),
            shutdown.clone(),
            Duration::from_secs(1),
            Box::new(DefaultClock),
        );

        let (result, _) = tokio::join!(monitor.run(), async {
            tokio::time::sleep(Duration::from_millis(4500)).await;
            shutdown.cancel();
        });
        result?;

        let mut events = vec![];
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ConnectivityEvent::Online,
                ConnectivityEvent::Offline,
                ConnectivityEvent::Online
            ]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_offline() -> Result<()> {
        let mut probe = MockConnectivityProbe::new();
        probe.expect_is_reachable().returning(|| false);

        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        ConnectivityMonitor::new(
            sender,
            Box::new(probe),
            shutdown,
            Duration::from_secs(1),
            Box::new(DefaultClock),
        )
        .run()
        .await?;

        assert_eq!(receiver.recv().await, Some(ConnectivityEvent::Offline));
        assert_eq!(receiver.recv().await, None);
        Ok(())
    }
}
