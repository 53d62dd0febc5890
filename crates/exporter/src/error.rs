//! Exporter failures.

use optron_shared::{ErrorClass, ErrorCode, ErrorEnvelope, is_transient_io};
use std::io;
use std::time::Duration;

/// Failures while connecting to or writing to the collector.
///
/// None of these escape an export cycle; the exporter logs them and carries on.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The collector could not be reached.
    #[error("failed to connect to {address}: {source}")]
    Dial {
        /// Collector `host:port`.
        address: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Writing a payload failed.
    #[error("failed to write payload: {0}")]
    Write(#[source] io::Error),
    /// A dial or write exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        /// `dial` or `write`.
        operation: &'static str,
        /// Configured deadline.
        timeout_ms: u64,
    },
    /// A payload could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    /// There is no open connection to write to.
    #[error("not connected to a collector")]
    NotConnected,
}

impl ExportError {
    /// Deadline error for `operation`.
    #[must_use]
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout {
            operation,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Stable error code.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Dial { .. } => ErrorCode::new("exporter", "dial_failed"),
            Self::Write(_) => ErrorCode::new("exporter", "write_failed"),
            Self::Timeout { .. } => ErrorCode::timeout(),
            Self::Encode(_) => ErrorCode::new("exporter", "encode_failed"),
            Self::NotConnected => ErrorCode::new("exporter", "not_connected"),
        }
    }

    /// Whether a later dial can be expected to succeed.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Dial { source, .. } | Self::Write(source) => {
                if is_transient_io(source.kind()) {
                    ErrorClass::Retriable
                } else {
                    ErrorClass::NonRetriable
                }
            },
            Self::Timeout { .. } | Self::NotConnected => ErrorClass::Retriable,
            Self::Encode(_) => ErrorClass::NonRetriable,
        }
    }
}

impl From<ExportError> for ErrorEnvelope {
    fn from(error: ExportError) -> Self {
        let code = error.error_code();
        let class = error.class();
        let message = error.to_string();
        let envelope = Self::unexpected(code, message, class);
        match error {
            ExportError::Dial { address, .. } => envelope.with_metadata("address", address),
            ExportError::Timeout {
                operation,
                timeout_ms,
            } => envelope
                .with_metadata("operation", operation)
                .with_metadata("timeout_ms", timeout_ms.to_string()),
            ExportError::Write(_) | ExportError::Encode(_) | ExportError::NotConnected => envelope,
        }
    }
}
