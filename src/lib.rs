//! # OBD CLI Library
//!
//! Poll and record OBD-II vehicle telemetry.
//!
//! This library provides the pid catalog, the transport seam to the
//! vehicle adapter, the pollers that emit telemetry events, and the
//! recording pipeline (serialized write queue, file rotation, optional
//! gzip compression, graceful-shutdown drain) behind the `obd` binary.

pub mod error;
pub mod pids;
pub mod telemetry;
pub mod transport;
pub mod poller;
pub mod monitor;
pub mod poll;
