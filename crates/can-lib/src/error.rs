//! Error taxonomy for the control loop

use thiserror::Error;

/// Errors raised by the telemetry source, the controller and the facade
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QosError {
    #[error("telemetry source {endpoint} unavailable: {reason}")]
    TelemetryUnavailable { endpoint: String, reason: String },

    #[error("controller unreachable during {operation} on {device}: {reason}")]
    ControllerUnreachable {
        operation: &'static str,
        device: String,
        reason: String,
    },

    #[error("no path from {src} to {dst}")]
    NoPathFound { src: String, dst: String },

    #[error("flow install on {device} rejected with status {status}: {body}")]
    FlowInstallRejected {
        device: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {operation}: {reason}")]
    MalformedResponse {
        operation: &'static str,
        reason: String,
    },
}

impl QosError {
    /// Read-path unavailability that a bounded retry may clear
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            QosError::TelemetryUnavailable { .. } | QosError::ControllerUnreachable { .. }
        )
    }

    pub(crate) fn malformed(operation: &'static str, reason: impl ToString) -> Self {
        QosError::MalformedResponse {
            operation,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QosError>;
