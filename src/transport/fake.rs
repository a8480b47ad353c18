//! Development transport that emits synthesized telemetry values.
//!
//! Values sweep the pid's declared range as a triangle wave over a shared
//! tick counter, so output looks alive and is deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::pids::PidDescriptor;
use crate::telemetry::{TelemetryEvent, TelemetryValue};

use super::Transport;

/// Ticks per full sweep of a pid's value range
const SWEEP_STEPS: u64 = 40;

/// Fake vehicle transport
pub struct FakeTransport {
    ticks: AtomicU64,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self { ticks: AtomicU64::new(0) }
    }

    /// Triangle wave over `[min, max]` for the given tick
    fn sweep(pid: &PidDescriptor, tick: u64) -> f64 {
        let half = SWEEP_STEPS / 2;
        let phase = tick % SWEEP_STEPS;
        let rising = phase.min(SWEEP_STEPS - phase);
        pid.min + (pid.max - pid.min) * rising as f64 / half as f64
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self) -> Result<()> {
        info!("Using fake connection, values are synthesized");
        Ok(())
    }

    async fn query(&self, pid: &PidDescriptor) -> Result<TelemetryEvent> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let value = Self::sweep(pid, tick);
        Ok(TelemetryEvent::now(
            pid.code,
            pid.name,
            TelemetryValue::Number(value),
            pid.unit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pids;

    #[tokio::test]
    async fn test_values_stay_in_pid_range() {
        let transport = FakeTransport::new();
        let pid = pids::resolve("0C").unwrap();

        for _ in 0..(SWEEP_STEPS * 2) {
            let event = transport.query(pid).await.unwrap();
            match event.value {
                TelemetryValue::Number(v) => {
                    assert!(v >= pid.min && v <= pid.max, "value {} outside pid range", v);
                }
                TelemetryValue::Text(_) => panic!("fake transport must emit numbers"),
            }
        }
    }

    #[tokio::test]
    async fn test_events_carry_pid_identity() {
        let transport = FakeTransport::new();
        let pid = pids::resolve("2F").unwrap();
        let event = transport.query(pid).await.unwrap();

        assert_eq!(event.pid, "2F");
        assert_eq!(event.name, "Fuel Level Input");
        assert_eq!(event.unit.as_deref(), Some("%"));
    }

    #[test]
    fn test_sweep_is_deterministic() {
        let pid = pids::resolve("0D").unwrap();
        assert_eq!(FakeTransport::sweep(pid, 0), FakeTransport::sweep(pid, SWEEP_STEPS));
        assert_eq!(FakeTransport::sweep(pid, 0), pid.min);
        assert_eq!(FakeTransport::sweep(pid, SWEEP_STEPS / 2), pid.max);
    }
}
