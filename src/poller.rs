//! # ECU Poller
//!
//! The telemetry source: one poller per monitored pid, querying the
//! transport on its own interval and emitting [`TelemetryEvent`]s onto a
//! subscription channel.
//!
//! Pollers never touch the output sink themselves; every emitted event is
//! forwarded by the monitor driver into the single write queue, which is
//! what keeps rotation decisions race-free.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pids::PidDescriptor;
use crate::telemetry::TelemetryEvent;
use crate::transport::Transport;

/// Polls one pid at a fixed interval, or once when no interval is set
pub struct EcuPoller {
    pid: &'static PidDescriptor,
    /// `None` means one-shot poll-and-resolve (the `poll` command path)
    poll_interval: Option<Duration>,
    transport: Arc<dyn Transport>,
}

impl EcuPoller {
    pub fn new(
        pid: &'static PidDescriptor,
        poll_interval: Option<Duration>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            pid,
            poll_interval,
            transport,
        }
    }

    /// Read a single value for this poller's pid
    ///
    /// # Errors
    ///
    /// Propagates transport failures to the caller.
    pub async fn poll_once(&self) -> Result<TelemetryEvent> {
        self.transport.query(self.pid).await
    }

    /// Start emitting events onto `events` until `stop` flips to true
    ///
    /// Stopping is fire-and-forget from the caller's perspective: the flip
    /// is observed at the poller's next suspension point, so an event
    /// already being read may still be emitted afterwards.
    pub fn start_polling(
        self,
        events: mpsc::UnboundedSender<TelemetryEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let Some(period) = self.poll_interval else {
                // One-shot pollers resolve a single value and finish
                match self.poll_once().await {
                    Ok(event) => {
                        let _ = events.send(event);
                    }
                    Err(e) => warn!(pid = self.pid.code, "Poll failed: {}", e),
                }
                return;
            };

            let mut ticker = interval(period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.poll_once().await {
                            Ok(event) => {
                                // Receiver gone means the driver already shut down
                                if events.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(pid = self.pid.code, "Poll failed: {}", e),
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!(pid = self.pid.code, "Poller stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pids;
    use crate::transport::mocks::MockTransport;

    fn mock_transport() -> Arc<MockTransport> {
        Arc::new(MockTransport::new())
    }

    #[tokio::test]
    async fn test_one_shot_poller_emits_single_event_and_exits() {
        let transport = mock_transport();
        let pid = pids::resolve("0C").unwrap();
        let poller = EcuPoller::new(pid, None, transport.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);

        poller.start_polling(tx, stop_rx).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.pid, "0C");
        assert!(rx.recv().await.is_none(), "Channel must close after one-shot poll");
        assert_eq!(transport.query_count(), 1);
    }

    #[tokio::test]
    async fn test_interval_poller_emits_until_stopped() {
        let transport = mock_transport();
        let pid = pids::resolve("0D").unwrap();
        let poller = EcuPoller::new(pid, Some(Duration::from_millis(5)), transport.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = poller.start_polling(tx, stop_rx);

        // First tick fires immediately, so at least one event arrives
        let first = rx.recv().await.unwrap();
        assert_eq!(first.name, "Vehicle Speed");

        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(transport.query_count() >= 1);

        // Drain any tail emitted before the stop was observed, then the
        // channel must close
        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_poller_stops_when_subscriber_drops() {
        let transport = mock_transport();
        let pid = pids::resolve("05").unwrap();
        let poller = EcuPoller::new(pid, Some(Duration::from_millis(1)), transport);

        let (tx, rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let handle = poller.start_polling(tx, stop_rx);

        drop(rx);
        handle.await.unwrap();
    }
}
