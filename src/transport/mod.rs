//! # Transport Module
//!
//! Connection glue for talking to the vehicle interface.
//!
//! The rest of the tool only sees the [`Transport`] trait: connect once,
//! then query one pid at a time. Two implementations exist:
//! - `fake`: a development transport that synthesizes plausible values,
//!   useful for testing the recording pipeline without a car
//! - `serial`: an ELM327-style adapter reached over a serial port
//!
//! Protocol decoding is deliberately out of scope; the serial transport
//! hands back the adapter's raw reply text.

use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;

use crate::error::Result;
use crate::pids::PidDescriptor;
use crate::telemetry::TelemetryEvent;

pub mod fake;
pub mod serial;

/// Trait for vehicle transport implementations
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection. Called exactly once before any query.
    async fn connect(&self) -> Result<()>;

    /// Read one value for the given pid
    async fn query(&self, pid: &PidDescriptor) -> Result<TelemetryEvent>;
}

/// Connection type selected with `-c/--connection`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConnectionKind {
    /// Development transport emitting synthesized values
    Fake,
    /// ELM327-style serial adapter
    Serial,
}

/// Connection settings resolved from CLI flags
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub kind: ConnectionKind,
    /// Serial device path, e.g `/dev/ttyUSB0`; common paths are tried
    /// when absent
    pub interface: Option<String>,
    /// Serial baud rate, defaults to 38400
    pub baudrate: Option<u32>,
}

/// Build the transport selected by the connection options
pub fn create(options: &ConnectionOptions) -> Arc<dyn Transport> {
    match options.kind {
        ConnectionKind::Fake => Arc::new(fake::FakeTransport::new()),
        ConnectionKind::Serial => Arc::new(serial::SerialTransport::new(
            options.interface.clone(),
            options.baudrate.unwrap_or(serial::DEFAULT_BAUD_RATE),
        )),
    }
}
