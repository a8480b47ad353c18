//! Serial transport for ELM327-style OBD adapters.
//!
//! Opens the configured device (or probes common paths), writes mode 01
//! requests and reads raw reply text up to the adapter's `>` prompt. The
//! reply is emitted verbatim as the event value; decoding it is out of
//! scope for this tool.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{ObdError, Result};
use crate::pids::PidDescriptor;
use crate::telemetry::{TelemetryEvent, TelemetryValue};

use super::Transport;

/// Default OBD adapter baud rate
pub const DEFAULT_BAUD_RATE: u32 = 38_400;

/// Device paths to try when no interface was given (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters (most common for ELM327 clones)
    "/dev/ttyACM0", // USB CDC devices
];

/// ELM327 serial transport
pub struct SerialTransport {
    interface: Option<String>,
    baud_rate: u32,
    port: Mutex<Option<tokio_serial::SerialStream>>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("interface", &self.interface)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    pub fn new(interface: Option<String>, baud_rate: u32) -> Self {
        Self {
            interface,
            baud_rate,
            port: Mutex::new(None),
        }
    }

    /// Open the first device path that accepts our settings
    fn open_port(&self) -> Result<tokio_serial::SerialStream> {
        let candidates: Vec<&str> = match &self.interface {
            Some(path) => vec![path.as_str()],
            None => DEFAULT_DEVICE_PATHS.to_vec(),
        };

        for path in &candidates {
            debug!("Trying to open serial port: {}", path);

            match tokio_serial::new(*path, self.baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .open_native_async()
            {
                Ok(port) => {
                    info!("Successfully opened OBD adapter at {}", path);
                    return Ok(port);
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(ObdError::Connection(format!(
            "no OBD adapter found at {}",
            candidates.join(", ")
        )))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.port.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_port()?);
        }
        Ok(())
    }

    async fn query(&self, pid: &PidDescriptor) -> Result<TelemetryEvent> {
        let mut guard = self.port.lock().await;
        let port = guard
            .as_mut()
            .ok_or_else(|| ObdError::Connection("serial transport is not connected".into()))?;

        let request = format!("01{}\r", pid.code);
        port.write_all(request.as_bytes()).await?;
        port.flush().await?;

        // Replies end with the adapter's ">" prompt
        let mut reply = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            let n = port.read(&mut chunk).await?;
            if n == 0 {
                return Err(ObdError::Connection("adapter closed the serial port".into()));
            }
            if let Some(prompt) = chunk[..n].iter().position(|&b| b == b'>') {
                reply.extend_from_slice(&chunk[..prompt]);
                break;
            }
            reply.extend_from_slice(&chunk[..n]);
        }

        let text = String::from_utf8_lossy(&reply)
            .replace('\r', "\n")
            .trim()
            .to_string();

        debug!(pid = pid.code, "Adapter reply: {:?}", text);

        Ok(TelemetryEvent::now(
            pid.code,
            pid.name,
            TelemetryValue::Text(text),
            pid.unit,
        ))
    }
}
