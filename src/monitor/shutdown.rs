//! # Shutdown Coordinator
//!
//! Drives the graceful-shutdown sequence after SIGINT:
//! `Running -> Stopping -> Draining -> Closed`.
//!
//! Stopping tells every poller to stop emitting; events already handed to
//! the queue still land. Draining enqueues one final command whose only job
//! is to resolve and close the active sink; the queue is FIFO, so that
//! command runs only after every previously queued write completed. Only
//! one shutdown sequence can run because `shutdown` consumes the
//! coordinator; the driver stops listening for further signals once the
//! first one arrives, so a second SIGINT during the drain is ignored.

use std::io;

use tokio::sync::{oneshot, watch};
use tracing::info;

use crate::error::Result;

use super::queue::{DrainOutcome, WriteCommand, WriteSender};

/// Phases of the shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Stopping,
    Draining,
    Closed,
}

/// Coordinates stopping sources, draining the queue and closing the sink
pub struct ShutdownCoordinator {
    state: watch::Sender<ShutdownState>,
    stop: watch::Sender<bool>,
    queue: WriteSender,
}

impl ShutdownCoordinator {
    pub fn new(stop: watch::Sender<bool>, queue: WriteSender) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self { state, stop, queue }
    }

    /// Observe the current shutdown phase
    pub fn subscribe_state(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Run the full shutdown sequence
    ///
    /// Resolves once the queue acknowledged the drain: for file sinks that
    /// means the final flush-and-close completed; for stdout there is
    /// nothing to close beyond the OS's own buffering.
    pub async fn shutdown(self) -> Result<DrainOutcome> {
        info!("Shutting process down gracefully. Please wait");

        // Stopping: fire-and-forget, pollers observe the flip at their
        // next suspension point
        let _ = self.state.send(ShutdownState::Stopping);
        let _ = self.stop.send(true);

        // Draining: FIFO places this behind every pending write
        let _ = self.state.send(ShutdownState::Draining);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queue
            .send(WriteCommand::Drain(reply_tx))
            .map_err(|_| queue_gone())?;

        let outcome = reply_rx.await.map_err(|_| queue_gone())??;

        if outcome == DrainOutcome::FileClosed {
            info!("Streams have finished writing. Exiting");
        }

        let _ = self.state.send(ShutdownState::Closed);
        Ok(outcome)
    }
}

fn queue_gone() -> crate::error::ObdError {
    io::Error::new(io::ErrorKind::BrokenPipe, "write queue stopped before drain").into()
}
