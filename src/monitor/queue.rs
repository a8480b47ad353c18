//! # Write Queue
//!
//! Single-flight serialization of all sink access.
//!
//! Every telemetry write and every sink acquisition or rotation passes
//! through one unbounded channel with exactly one consumer task, which owns
//! the sink factory and the active handle. Tasks therefore run strictly in
//! submission order and rotation decisions always see a consistent byte
//! count; two pollers emitting near-simultaneously can never both write
//! past the cap or race the next sequence number.
//!
//! The channel is unbounded on purpose: a source emitting faster than the
//! sink can absorb grows the queue rather than dropping events.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::telemetry::TelemetryEvent;

use super::sink::{needs_rotation, SinkConfig, SinkFactory, SinkHandle};

/// Work accepted by the write queue
pub enum WriteCommand {
    /// Persist one telemetry event
    Record(TelemetryEvent),
    /// Resolve and close the active sink, acknowledge, then stop
    Drain(oneshot::Sender<Result<DrainOutcome>>),
}

/// What the final drain found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The active sink was stdout; nothing to close
    Stdout,
    /// The active file sink was flushed and closed
    FileClosed,
}

/// Sending half handed to the monitor driver and shutdown coordinator
pub type WriteSender = mpsc::UnboundedSender<WriteCommand>;

/// The queue consumer: owns the sink and processes commands in order
pub struct WriteQueue {
    receiver: mpsc::UnboundedReceiver<WriteCommand>,
    factory: SinkFactory,
    active: Option<SinkHandle>,
}

impl WriteQueue {
    /// Create the queue and its sending half
    pub fn channel(config: SinkConfig) -> (WriteSender, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            receiver,
            factory: SinkFactory::new(config),
            active: None,
        };
        (sender, queue)
    }

    /// Process commands until drained or all senders are gone
    ///
    /// A record that fails to write is logged and does not stop the queue;
    /// subsequent commands still run.
    pub async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            match command {
                WriteCommand::Record(event) => {
                    if let Err(e) = self.write_event(&event).await {
                        error!("Failed to write telemetry record: {}", e);
                    }
                }
                WriteCommand::Drain(reply) => {
                    let outcome = self.finish().await;
                    let _ = reply.send(outcome);
                    break;
                }
            }
        }

        // All senders dropped without a drain: still close what we hold
        if let Some(sink) = self.active.take() {
            if let Err(e) = sink.close().await {
                error!("Failed to close output sink: {}", e);
            }
        }

        debug!("Write queue stopped");
    }

    /// Serialize and persist one event through the current sink
    async fn write_event(&mut self, event: &TelemetryEvent) -> Result<()> {
        let line = event.to_json_line()?;
        let sink = self.resolve_sink().await?;
        sink.write_all(&line).await?;
        Ok(())
    }

    /// Return the active sink, creating or rotating it first if needed
    ///
    /// The rotation check runs before the write, so a file can overshoot
    /// the cap by at most one record.
    async fn resolve_sink(&mut self) -> Result<&mut SinkHandle> {
        let cap = self.factory.max_file_size();
        let stdout_mode = self.factory.is_stdout_mode();

        let sink = match self.active.take() {
            // Rotation and the cap never apply to stdout
            Some(sink) if stdout_mode || !needs_rotation(Some(&sink), cap) => sink,
            Some(previous) => {
                info!("Out file size exceeded {}KB - rotating...", cap / 1024);
                previous.close().await?;
                self.factory.acquire().await?
            }
            None => self.factory.acquire().await?,
        };

        Ok(self.active.insert(sink))
    }

    /// Final drain task: resolve the current sink and close it
    ///
    /// Runs only after every previously queued write completed (FIFO), so
    /// the resolved handle is the post-drain sink. Mirrors the normal
    /// resolve path, so a drain with no prior writes still creates the
    /// trip's first (empty) file.
    async fn finish(&mut self) -> Result<DrainOutcome> {
        self.resolve_sink().await?;

        match self.active.take() {
            Some(sink) if sink.is_stdout() => Ok(DrainOutcome::Stdout),
            Some(sink) => {
                sink.close().await?;
                Ok(DrainOutcome::FileClosed)
            }
            // resolve_sink always leaves an active sink behind
            None => Ok(DrainOutcome::Stdout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use chrono::TimeZone;
    use tempfile::tempdir;

    use crate::telemetry::TelemetryValue;

    fn event(n: u32) -> TelemetryEvent {
        TelemetryEvent {
            ts: chrono::Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            pid: "0C".into(),
            name: "Engine RPM".into(),
            value: TelemetryValue::Number(f64::from(n)),
            unit: Some("rpm".into()),
        }
    }

    async fn drain(sender: &WriteSender) -> DrainOutcome {
        let (tx, rx) = oneshot::channel();
        sender.send(WriteCommand::Drain(tx)).unwrap();
        rx.await.unwrap().unwrap()
    }

    /// The single trip directory created under `base`
    fn trip_dir(base: &Path) -> PathBuf {
        let date = std::fs::read_dir(base).unwrap().next().unwrap().unwrap();
        let trip = std::fs::read_dir(date.path()).unwrap().next().unwrap().unwrap();
        trip.path()
    }

    fn sorted_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort_by_key(|n| n.split('.').next().unwrap().parse::<u64>().unwrap());
        names
    }

    #[tokio::test]
    async fn test_records_land_in_submission_order() {
        let dir = tempdir().unwrap();
        let (sender, queue) = WriteQueue::channel(SinkConfig::new(Some(dir.path().into()), false));
        let task = tokio::spawn(queue.run());

        for n in 0..20 {
            sender.send(WriteCommand::Record(event(n))).unwrap();
        }
        assert_eq!(drain(&sender).await, DrainOutcome::FileClosed);
        task.await.unwrap();

        let trip = trip_dir(dir.path());
        let contents = std::fs::read_to_string(trip.join("0.json")).unwrap();
        let values: Vec<f64> = contents
            .lines()
            .map(|line| {
                let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
                parsed["value"].as_f64().unwrap()
            })
            .collect();

        let expected: Vec<f64> = (0..20).map(f64::from).collect();
        assert_eq!(values, expected, "FIFO order must be preserved on disk");
    }

    #[tokio::test]
    async fn test_rotation_happens_on_pre_write_check() {
        let dir = tempdir().unwrap();

        // Cap sized so exactly two records fit before the pre-write check
        // trips: first write sees 0 bytes, second sees one record (< cap),
        // third sees two records (>= cap) and rotates
        let record_len = event(0).to_json_line().unwrap().len() as u64;
        let mut config = SinkConfig::new(Some(dir.path().into()), false);
        config.max_file_size = record_len + 1;

        let (sender, queue) = WriteQueue::channel(config);
        let task = tokio::spawn(queue.run());

        for n in 0..3 {
            sender.send(WriteCommand::Record(event(n))).unwrap();
        }
        drain(&sender).await;
        task.await.unwrap();

        let trip = trip_dir(dir.path());
        assert_eq!(sorted_files(&trip), vec!["0.json", "1.json"]);

        let first = std::fs::read_to_string(trip.join("0.json")).unwrap();
        let second = std::fs::read_to_string(trip.join("1.json")).unwrap();
        assert_eq!(first.lines().count(), 2, "Cap overshoot is at most one record");
        assert_eq!(second.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_drain_without_writes_creates_empty_first_file() {
        let dir = tempdir().unwrap();
        let (sender, queue) = WriteQueue::channel(SinkConfig::new(Some(dir.path().into()), false));
        let task = tokio::spawn(queue.run());

        assert_eq!(drain(&sender).await, DrainOutcome::FileClosed);
        task.await.unwrap();

        let trip = trip_dir(dir.path());
        assert_eq!(sorted_files(&trip), vec!["0.json"]);
        assert_eq!(std::fs::metadata(trip.join("0.json")).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_drain_in_stdout_mode_reports_stdout() {
        let (sender, queue) = WriteQueue::channel(SinkConfig::new(None, false));
        let task = tokio::spawn(queue.run());

        sender.send(WriteCommand::Record(event(1))).unwrap();
        assert_eq!(drain(&sender).await, DrainOutcome::Stdout);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_record_is_written_before_drain_completes() {
        let dir = tempdir().unwrap();
        let (sender, queue) = WriteQueue::channel(SinkConfig::new(Some(dir.path().into()), false));
        let task = tokio::spawn(queue.run());

        // Enqueue a record and immediately the drain behind it; FIFO means
        // the record must be on disk when the drain acknowledges
        sender.send(WriteCommand::Record(event(7))).unwrap();
        assert_eq!(drain(&sender).await, DrainOutcome::FileClosed);
        task.await.unwrap();

        let trip = trip_dir(dir.path());
        let contents = std::fs::read_to_string(trip.join("0.json")).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"value\":7.0"));
    }

    #[tokio::test]
    async fn test_gzip_rotation_keeps_zip_extension() {
        let dir = tempdir().unwrap();
        let (sender, queue) = WriteQueue::channel(SinkConfig::new(Some(dir.path().into()), true));
        let task = tokio::spawn(queue.run());

        sender.send(WriteCommand::Record(event(3))).unwrap();
        assert_eq!(drain(&sender).await, DrainOutcome::FileClosed);
        task.await.unwrap();

        let trip = trip_dir(dir.path());
        assert_eq!(sorted_files(&trip), vec!["0.json.zip"]);

        let raw = std::fs::read(trip.join("0.json.zip")).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b], "Missing gzip magic bytes");
    }
}
