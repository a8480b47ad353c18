//! # Output Sinks
//!
//! Where monitor records go: the process stdout, or sequentially numbered
//! files under `<outdir>/<UTC-date>/<trip-uuid>/`, optionally gzip
//! compressed in flight.
//!
//! Rotation is decided before each write from the raw on-disk byte count,
//! so a file may overshoot the cap by at most one record. When compression
//! is on, writes go to the gzip stage which is piped into the file; the
//! byte count still tracks the underlying file, not the compressor input.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_compression::tokio::write::GzipEncoder;
use chrono::Utc;
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// Size cap after which the active output file is rotated (128 KiB)
pub const MAX_FILE_SIZE: u64 = 128 * 1024;

/// Decide whether the active sink must be rotated before the next write
///
/// True when no sink exists yet (first write) or the sink's raw byte count
/// has reached the cap. Pure function, no side effects.
pub fn needs_rotation(sink: Option<&SinkHandle>, cap: u64) -> bool {
    match sink {
        None => true,
        Some(sink) => sink.bytes_written() >= cap,
    }
}

/// Derive the next numeric filename from a directory listing
///
/// Entries whose base name parses as a non-negative integer are considered;
/// everything else is ignored. Comparison is numeric, so `9` precedes `10`.
pub fn next_file_name(listing: &[String], zip: bool) -> String {
    let ext = file_ext(zip);

    let largest = listing
        .iter()
        .filter_map(|name| name.split('.').next())
        .filter_map(|stem| stem.parse::<u64>().ok())
        .max();

    match largest {
        None => format!("0{}", ext),
        Some(n) => format!("{}{}", n + 1, ext),
    }
}

/// Extension for monitor output files
fn file_ext(zip: bool) -> &'static str {
    if zip {
        ".json.zip"
    } else {
        ".json"
    }
}

/// `AsyncWrite` wrapper that counts bytes accepted by the inner writer
///
/// Sits directly on the file handle so the count reflects on-disk growth
/// even while a compression stage above it is still buffering.
pub struct CountingWriter<W> {
    inner: W,
    bytes: Arc<AtomicU64>,
}

impl<W> CountingWriter<W> {
    pub fn new(inner: W, bytes: Arc<AtomicU64>) -> Self {
        Self { inner, bytes }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let me = self.get_mut();
        match Pin::new(&mut me.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(written)) => {
                me.bytes.fetch_add(written as u64, Ordering::Relaxed);
                Poll::Ready(Ok(written))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// The write target behind the active sink
enum SinkWriter {
    Stdout(Stdout),
    Plain(CountingWriter<File>),
    Gzip(GzipEncoder<CountingWriter<File>>),
}

/// The currently active writable destination
///
/// Exactly one handle is live at a time; a superseded handle is closed and
/// never reused. Callers always write through the handle, never directly to
/// a file that is also fed by the compressor.
pub struct SinkHandle {
    writer: SinkWriter,
    bytes: Arc<AtomicU64>,
    path: Option<PathBuf>,
}

impl SinkHandle {
    /// Handle for the process standard output stream
    pub fn stdout() -> Self {
        Self {
            writer: SinkWriter::Stdout(tokio::io::stdout()),
            bytes: Arc::new(AtomicU64::new(0)),
            path: None,
        }
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self.writer, SinkWriter::Stdout(_))
    }

    /// Raw bytes accepted by the underlying file so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write one serialized record through the active stage
    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match &mut self.writer {
            SinkWriter::Stdout(out) => {
                out.write_all(buf).await?;
                // stdout is line-oriented for consumers piping our output
                out.flush().await
            }
            SinkWriter::Plain(file) => file.write_all(buf).await,
            SinkWriter::Gzip(encoder) => encoder.write_all(buf).await,
        }
    }

    /// Flush remaining buffers and close the sink
    ///
    /// Ending the gzip stage writes the trailer and shuts down the file
    /// underneath it. Resolves only once the file has accepted everything,
    /// which is the close notification shutdown waits on. Stdout is flushed
    /// but never closed.
    pub async fn close(mut self) -> io::Result<()> {
        match &mut self.writer {
            SinkWriter::Stdout(out) => out.flush().await,
            SinkWriter::Plain(file) => file.shutdown().await,
            SinkWriter::Gzip(encoder) => encoder.shutdown().await,
        }
    }
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("path", &self.path)
            .field("bytes_written", &self.bytes_written())
            .finish_non_exhaustive()
    }
}

/// Sink settings resolved from CLI flags
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Base output directory; `None` means write to stdout
    pub outdir: Option<PathBuf>,
    /// Gzip compress output files
    pub zip: bool,
    /// Rotation threshold in bytes
    pub max_file_size: u64,
}

impl SinkConfig {
    pub fn new(outdir: Option<PathBuf>, zip: bool) -> Self {
        Self {
            outdir,
            zip,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

/// Produces writable destinations for monitor output
///
/// In file mode each acquired sink is the next numbered file under
/// `<outdir>/<UTC-date>/<trip-uuid>/`. The nested directory is resolved on
/// the first acquisition and cached for the rest of the process, so a run
/// spanning a UTC date rollover keeps writing into the original day's
/// directory.
pub struct SinkFactory {
    config: SinkConfig,
    trip_id: String,
    resolved_dir: Option<PathBuf>,
}

impl SinkFactory {
    pub fn new(config: SinkConfig) -> Self {
        Self {
            config,
            trip_id: Uuid::new_v4().to_string(),
            resolved_dir: None,
        }
    }

    /// Whether records go to stdout (no output directory configured)
    pub fn is_stdout_mode(&self) -> bool {
        self.config.outdir.is_none()
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Unique token segregating this run's output from other runs
    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    /// Open the next writable destination
    ///
    /// Stdout mode returns the stdout handle and never touches the
    /// filesystem. File mode ensures the output directory tree exists,
    /// derives the next numbered filename and opens it, wrapping the file
    /// in a gzip stage when compression is enabled.
    ///
    /// # Errors
    ///
    /// Directory creation, listing and file-open failures propagate to the
    /// caller; they are not retried.
    pub async fn acquire(&mut self) -> Result<SinkHandle> {
        if self.config.outdir.is_none() {
            return Ok(SinkHandle::stdout());
        }

        let dir = self.output_dir()?;

        info!("Creating new output file in {}...", dir.display());

        fs::create_dir_all(&dir).await?;

        let listing = list_dir(&dir).await?;
        let filename = next_file_name(&listing, self.config.zip);
        let path = dir.join(&filename);

        let file = File::create(&path).await?;

        info!("Created new output file {}...", filename);

        let bytes = Arc::new(AtomicU64::new(0));
        let counted = CountingWriter::new(file, Arc::clone(&bytes));

        let writer = if self.config.zip {
            SinkWriter::Gzip(GzipEncoder::new(counted))
        } else {
            SinkWriter::Plain(counted)
        };

        Ok(SinkHandle {
            writer,
            bytes,
            path: Some(path),
        })
    }

    /// Resolve `<outdir>/<UTC-date>/<trip-uuid>` once and cache it
    fn output_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.resolved_dir {
            return Ok(dir.clone());
        }

        let base = self
            .config
            .outdir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let dir = base
            .join(Utc::now().format("%Y-%m-%d").to_string())
            .join(&self.trip_id);

        let dir = if dir.is_absolute() {
            dir
        } else {
            std::env::current_dir()?.join(dir)
        };

        self.resolved_dir = Some(dir.clone());
        Ok(dir)
    }
}

/// List the file names in a directory
async fn list_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }

    Ok(names)
}
