//! # PID Catalog
//!
//! Static catalog of supported OBD-II mode 01 pids and lookup helpers.
//!
//! The monitor and poll commands accept either the hex pid code (`0C`) or
//! the pid name (`Engine RPM`, case-insensitive). Resolution happens in the
//! CLI layer before any poller is created, so an unknown pid fails fast.

use crate::error::{ObdError, Result};

/// Description of one supported pid
#[derive(Debug, Clone, PartialEq)]
pub struct PidDescriptor {
    /// Mode 01 pid code as two uppercase hex digits
    pub code: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Unit of the decoded value, if any
    pub unit: Option<&'static str>,
    /// Plausible value range, used by the development transport
    pub min: f64,
    pub max: f64,
}

/// Supported mode 01 pids
pub const SUPPORTED_PIDS: &[PidDescriptor] = &[
    PidDescriptor { code: "04", name: "Calculated Engine Load", unit: Some("%"), min: 0.0, max: 100.0 },
    PidDescriptor { code: "05", name: "Engine Coolant Temperature", unit: Some("C"), min: -40.0, max: 215.0 },
    PidDescriptor { code: "0A", name: "Fuel Pressure", unit: Some("kPa"), min: 0.0, max: 765.0 },
    PidDescriptor { code: "0B", name: "Intake Manifold Absolute Pressure", unit: Some("kPa"), min: 0.0, max: 255.0 },
    PidDescriptor { code: "0C", name: "Engine RPM", unit: Some("rpm"), min: 0.0, max: 16383.75 },
    PidDescriptor { code: "0D", name: "Vehicle Speed", unit: Some("km/h"), min: 0.0, max: 255.0 },
    PidDescriptor { code: "0F", name: "Intake Air Temperature", unit: Some("C"), min: -40.0, max: 215.0 },
    PidDescriptor { code: "10", name: "MAF Air Flow Rate", unit: Some("g/s"), min: 0.0, max: 655.35 },
    PidDescriptor { code: "11", name: "Throttle Position", unit: Some("%"), min: 0.0, max: 100.0 },
    PidDescriptor { code: "1F", name: "Engine Runtime", unit: Some("s"), min: 0.0, max: 65535.0 },
    PidDescriptor { code: "2F", name: "Fuel Level Input", unit: Some("%"), min: 0.0, max: 100.0 },
    PidDescriptor { code: "46", name: "Ambient Air Temperature", unit: Some("C"), min: -40.0, max: 215.0 },
];

/// Look up a pid by its hex code (case-insensitive)
pub fn get_pid_by_code(code: &str) -> Option<&'static PidDescriptor> {
    SUPPORTED_PIDS.iter().find(|p| p.code.eq_ignore_ascii_case(code))
}

/// Look up a pid by its name (case-insensitive)
pub fn get_pid_by_name(name: &str) -> Option<&'static PidDescriptor> {
    SUPPORTED_PIDS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Resolve a user-supplied token to a pid, trying code first then name
///
/// # Errors
///
/// Returns [`ObdError::UnknownPid`] when the token matches neither.
pub fn resolve(code_or_name: &str) -> Result<&'static PidDescriptor> {
    get_pid_by_code(code_or_name)
        .or_else(|| get_pid_by_name(code_or_name))
        .ok_or_else(|| ObdError::UnknownPid(code_or_name.to_string()))
}

/// Print the catalog for the `list` command
pub fn print_supported() {
    println!("\nAvailable PIDs for \"poll\" and \"monitor\" commands are:\n");

    for pid in SUPPORTED_PIDS {
        println!("{} - {}", pid.code, pid.name);
    }

    println!("\nExample command usage: \"obd poll 2F\"");
    println!("\nIt's also valid to supply the name, e.g \"Fuel Level Input\"\n");
}
