//! # Monitor Command
//!
//! Continuous polling of a set of pids, each at its own interval, with
//! every emitted event persisted through a single serialized write queue.
//!
//! Wiring: one [`EcuPoller`] per `PID:INTERVAL` entry, all emitting onto a
//! shared subscription channel; the driver forwards each event into the
//! write queue, so ordering across pids is interleaved by arrival time.
//! SIGINT hands control to the [`ShutdownCoordinator`], which stops the
//! pollers, drains the queue and closes the active sink before the process
//! exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::error::{ObdError, Result};
use crate::pids::{self, PidDescriptor};
use crate::poller::EcuPoller;
use crate::transport::Transport;

pub mod queue;
pub mod shutdown;
pub mod sink;

use queue::{WriteCommand, WriteQueue};
use shutdown::ShutdownCoordinator;
use sink::SinkConfig;

/// One pid scheduled for continuous polling
#[derive(Debug, Clone)]
pub struct MonitorEntry {
    pub pid: &'static PidDescriptor,
    pub interval: Duration,
}

/// Output settings for the monitor command
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    /// Base output directory; absent means records go to stdout
    pub outdir: Option<PathBuf>,
    /// Gzip compress output files
    pub zip: bool,
}

/// Parse `PID:INTERVAL` tokens into monitor entries, fail-fast
///
/// # Errors
///
/// Any malformed token (missing or non-positive interval) or unknown pid
/// fails the whole parse before a single source is started.
pub fn parse_monitor_entries(tokens: &[String]) -> Result<Vec<MonitorEntry>> {
    tokens
        .iter()
        .map(|token| {
            let (code, interval) = token
                .split_once(':')
                .ok_or_else(|| ObdError::InvalidMonitorSpec(token.clone()))?;

            let millis: u64 = interval
                .parse()
                .map_err(|_| ObdError::InvalidMonitorSpec(token.clone()))?;

            if code.is_empty() || millis == 0 {
                return Err(ObdError::InvalidMonitorSpec(token.clone()));
            }

            Ok(MonitorEntry {
                pid: pids::resolve(code)?,
                interval: Duration::from_millis(millis),
            })
        })
        .collect()
}

/// Run the monitor command until interrupted with Ctrl+C
pub async fn run(
    tokens: &[String],
    options: MonitorOptions,
    transport: Arc<dyn Transport>,
) -> Result<()> {
    monitor(tokens, options, transport, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Monitor driver with an injectable shutdown trigger
///
/// The signal future resolving plays the role of SIGINT; after it fires
/// no further signals are observed, so a second Ctrl+C during the drain
/// is ignored.
async fn monitor<S>(
    tokens: &[String],
    options: MonitorOptions,
    transport: Arc<dyn Transport>,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()>,
{
    // Fail-fast: both steps run before any source starts
    let entries = parse_monitor_entries(tokens)?;
    transport.connect().await?;

    let (queue_tx, write_queue) =
        WriteQueue::channel(SinkConfig::new(options.outdir.clone(), options.zip));
    let queue_task = tokio::spawn(write_queue.run());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (stop_tx, _stop_rx) = watch::channel(false);

    let mut pollers = Vec::with_capacity(entries.len());
    for entry in &entries {
        info!(
            "Polling {} ({}) every {}ms",
            entry.pid.name,
            entry.pid.code,
            entry.interval.as_millis()
        );
        let poller = EcuPoller::new(entry.pid, Some(entry.interval), Arc::clone(&transport));
        pollers.push(poller.start_polling(event_tx.clone(), stop_tx.subscribe()));
    }
    drop(event_tx);

    let coordinator = ShutdownCoordinator::new(stop_tx, queue_tx.clone());

    tokio::pin!(shutdown_signal);
    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => match maybe_event {
                // Poller callbacks only ever enqueue; all I/O stays inside
                // the single queue consumer
                Some(event) => {
                    let _ = queue_tx.send(WriteCommand::Record(event));
                }
                None => break,
            },
            _ = &mut shutdown_signal => break,
        }
    }

    // Forward the tail that arrived before the stop; anything emitted
    // after this point is dropped, not written
    while let Ok(event) = event_rx.try_recv() {
        let _ = queue_tx.send(WriteCommand::Record(event));
    }

    coordinator.shutdown().await?;

    for poller in pollers {
        let _ = poller.await;
    }
    queue_task
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    Ok(())
}
