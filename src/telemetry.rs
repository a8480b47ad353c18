//! # Telemetry Records
//!
//! The event shape emitted by pollers and persisted as JSON Lines.
//!
//! Each record is serialized as a single JSON object followed by `\n`,
//! with no wrapper or batching. The fields are exactly what the poller
//! attaches; readers of the output files should treat unknown fields as
//! forward-compatible additions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single measurement reported by a telemetry source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// UTC timestamp captured when the value was read
    pub ts: DateTime<Utc>,

    /// Hex pid code, e.g `"0C"`
    pub pid: String,

    /// Human-readable pid name, e.g `"Engine RPM"`
    pub name: String,

    /// The measured value
    pub value: TelemetryValue,

    /// Unit of measurement, when the pid defines one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Measurement payload: decoded pids carry numbers, raw transports
/// carry the reply text untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Number(f64),
    Text(String),
}

impl TelemetryEvent {
    /// Build an event stamped with the current UTC time
    pub fn now(pid: &str, name: &str, value: TelemetryValue, unit: Option<&str>) -> Self {
        Self {
            ts: Utc::now(),
            pid: pid.to_string(),
            name: name.to_string(),
            value,
            unit: unit.map(str::to_string),
        }
    }

    /// Serialize to one JSONL record (JSON object plus trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

impl std::fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryValue::Number(n) => write!(f, "{:.2}", n),
            TelemetryValue::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line_shape() {
        let event = TelemetryEvent::now("0C", "Engine RPM", TelemetryValue::Number(812.5), Some("rpm"));
        let line = event.to_json_line().unwrap();

        assert_eq!(*line.last().unwrap(), b'\n', "Record must end with a newline");

        let parsed: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(parsed["pid"], "0C");
        assert_eq!(parsed["name"], "Engine RPM");
        assert_eq!(parsed["value"], 812.5);
        assert_eq!(parsed["unit"], "rpm");
    }

    #[test]
    fn test_value_untagged_serialization() {
        let number = serde_json::to_string(&TelemetryValue::Number(42.0)).unwrap();
        assert_eq!(number, "42.0");

        let text = serde_json::to_string(&TelemetryValue::Text("41 0C 0B 94".into())).unwrap();
        assert_eq!(text, "\"41 0C 0B 94\"");
    }

    #[test]
    fn test_unit_omitted_when_absent() {
        let event = TelemetryEvent::now("0D", "Vehicle Speed", TelemetryValue::Number(0.0), None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("unit"), "Absent unit must not appear in the record");
    }

    #[test]
    fn test_roundtrip() {
        let event = TelemetryEvent::now("2F", "Fuel Level Input", TelemetryValue::Number(63.9), Some("%"));
        let line = event.to_json_line().unwrap();
        let back: TelemetryEvent = serde_json::from_slice(&line).unwrap();
        assert_eq!(back, event);
    }
}
