//! Fault notification payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What went wrong in the monitored subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthCause {
    None,
    /// Firmware health issue; consumes the one-per-lifetime fault dump
    /// allowance.
    Firmware,
    GoBitNotCleared,
    CommandTimeout,
    FirmwareTimeout,
    Unknown,
}

impl fmt::Display for HealthCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthCause::None => "None",
            HealthCause::Firmware => "FW health issue",
            HealthCause::GoBitNotCleared => "go bit not cleared",
            HealthCause::CommandTimeout => "command interface completion timeout",
            HealthCause::FirmwareTimeout => "timeout in FW response",
            HealthCause::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthSeverity {
    Critical,
    Error,
    Warning,
    Notice,
    Unknown,
}

impl fmt::Display for HealthSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthSeverity::Critical => "Critical",
            HealthSeverity::Error => "Error",
            HealthSeverity::Warning => "Warning",
            HealthSeverity::Notice => "Notice",
            HealthSeverity::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// One fault notification, constructed from a drained event record and
/// consumed once by the dump worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub cause: HealthCause,
    pub severity: HealthSeverity,
    /// Trap/source identifier reported by the subsystem.
    pub source_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_labels() {
        assert_eq!(HealthCause::Firmware.to_string(), "FW health issue");
        assert_eq!(HealthCause::GoBitNotCleared.to_string(), "go bit not cleared");
        assert_eq!(
            HealthCause::CommandTimeout.to_string(),
            "command interface completion timeout"
        );
        assert_eq!(
            HealthCause::FirmwareTimeout.to_string(),
            "timeout in FW response"
        );
    }

    #[test]
    fn test_event_round_trips_through_bincode() {
        let ev = HealthEvent {
            cause: HealthCause::Firmware,
            severity: HealthSeverity::Critical,
            source_id: 7,
        };
        let bytes = bincode::serialize(&ev).unwrap();
        let decoded: HealthEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, ev);
    }
}
