//! Error types for the SMART telemetry service
//!
//! Provides structured error types for probing, normalization, persistence
//! and caller input validation.

use thiserror::Error;

/// Unified error type for the telemetry service
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Probing Errors
    // =========================================================================
    #[error("{tool} not found. {hint}")]
    ToolNotInstalled { tool: String, hint: String },

    #[error("Unsupported USB bridge chip on {device}, SMART data cannot be read")]
    ProbeUnsupportedBridge { device: String },

    #[error("SMART probe failed for {device}: {reason}")]
    ProbeFailed { device: String, reason: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Telemetry store I/O error for serial {serial}: {source}")]
    StoreIo {
        serial: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Caller Input Errors
    // =========================================================================
    #[error("Invalid time range: from {from} is after to {to}")]
    InvalidTimeRange { from: String, to: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable classification of an [`Error`], used in API payloads and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ToolNotInstalled,
    UnsupportedBridge,
    ProbeFailed,
    StoreUnavailable,
    InvalidTimeRange,
    Configuration,
    Internal,
}

impl ErrorKind {
    /// Snake-case code for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ToolNotInstalled => "tool_not_installed",
            ErrorKind::UnsupportedBridge => "unsupported_bridge",
            ErrorKind::ProbeFailed => "probe_failed",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::InvalidTimeRange => "invalid_time_range",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ToolNotInstalled { .. } => ErrorKind::ToolNotInstalled,
            Error::ProbeUnsupportedBridge { .. } => ErrorKind::UnsupportedBridge,
            Error::ProbeFailed { .. } | Error::JsonParse(_) => ErrorKind::ProbeFailed,
            Error::StoreIo { .. } | Error::Io(_) => ErrorKind::StoreUnavailable,
            Error::InvalidTimeRange { .. } => ErrorKind::InvalidTimeRange,
            Error::Configuration(_) | Error::Yaml(_) => ErrorKind::Configuration,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the surrounding operation may continue past this error.
    ///
    /// Per-device and per-operation failures are recoverable; a missing
    /// probing tool or a broken configuration is not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::ToolNotInstalled | ErrorKind::Configuration
        )
    }

    /// Human readable explanation suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            Error::ToolNotInstalled { hint, .. } => {
                format!("smartmontools is required but not installed. {}", hint)
            }
            Error::ProbeUnsupportedBridge { .. } => {
                "The drive sits behind a USB bridge chip that does not pass SMART data through. \
                 Try connecting it directly or via a different enclosure."
                    .to_string()
            }
            Error::ProbeFailed { .. } | Error::JsonParse(_) => {
                "The device could not be read. Check permissions and that the device is present."
                    .to_string()
            }
            Error::StoreIo { .. } | Error::Io(_) => {
                "The telemetry history store is unavailable.".to_string()
            }
            Error::InvalidTimeRange { .. } => {
                "The requested time range is invalid: the start is after the end.".to_string()
            }
            Error::Configuration(_) | Error::Yaml(_) => {
                "The service configuration is invalid.".to_string()
            }
            Error::Internal(_) => "An internal error occurred.".to_string(),
        }
    }
}

/// Result type alias for the telemetry service
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = Error::ProbeUnsupportedBridge {
            device: "/dev/sdb".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UnsupportedBridge);
        assert_eq!(err.kind().as_str(), "unsupported_bridge");

        let err = Error::StoreIo {
            serial: "S1".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[test]
    fn test_error_recoverable() {
        let fatal = Error::ToolNotInstalled {
            tool: "smartctl".into(),
            hint: "brew install smartmontools".into(),
        };
        assert!(!fatal.is_recoverable());

        let per_device = Error::ProbeFailed {
            device: "/dev/sda".into(),
            reason: "no output".into(),
        };
        assert!(per_device.is_recoverable());
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let bridge = Error::ProbeUnsupportedBridge {
            device: "/dev/sdb".into(),
        }
        .user_message();
        let unreadable = Error::ProbeFailed {
            device: "/dev/sdb".into(),
            reason: "exit 2".into(),
        }
        .user_message();
        let store = Error::StoreIo {
            serial: "S1".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .user_message();

        assert!(bridge.contains("bridge"));
        assert_ne!(bridge, unreadable);
        assert_ne!(unreadable, store);
    }
}
