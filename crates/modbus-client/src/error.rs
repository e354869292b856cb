use std::io;

use thiserror::Error;

/// Failure classes for connection and register operations. Retryable classes
/// (connection, port-busy, timeout) feed the connect retry loop; validation
/// and protocol failures surface immediately.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Malformed configuration. Never retried.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bad address/range/type combination, rejected before any wire call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transport-level connect or I/O failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Serial port exists but cannot be acquired.
    #[error("serial port busy: {0}")]
    PortBusy(String),

    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The device answered with an invalid or error response. Retrying a
    /// malformed exchange rarely helps, so these are surfaced immediately.
    #[error("device rejected request: {0}")]
    Protocol(String),

    #[error(transparent)]
    Codec(#[from] register_codec::CodecError),
}

impl LinkError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LinkError::Connection(_) | LinkError::PortBusy(_) | LinkError::Timeout { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LinkError::InvalidConfig(_) => "invalid_config",
            LinkError::Validation(_) => "validation",
            LinkError::Connection(_) => "connection",
            LinkError::PortBusy(_) => "port_busy",
            LinkError::Timeout { .. } => "timeout",
            LinkError::Protocol(_) => "protocol",
            LinkError::Codec(_) => "codec",
        }
    }

    /// Classifies a transport-level io error. `tokio-modbus` surfaces device
    /// exception responses as `InvalidData`.
    pub(crate) fn from_io(err: io::Error, timeout_ms: u64) -> Self {
        use io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => LinkError::Timeout { timeout_ms },
            ErrorKind::InvalidData => LinkError::Protocol(err.to_string()),
            _ => LinkError::Connection(err.to_string()),
        }
    }

    pub(crate) fn from_serial(port: &str, err: tokio_serial::Error) -> Self {
        match err.kind {
            tokio_serial::ErrorKind::NoDevice => {
                LinkError::Connection(format!("serial port {port} disappeared: {err}"))
            }
            tokio_serial::ErrorKind::InvalidInput => {
                LinkError::InvalidConfig(format!("serial port {port}: {err}"))
            }
            tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                LinkError::PortBusy(format!("{port}: {err}"))
            }
            _ => LinkError::PortBusy(format!("{port}: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(LinkError::Timeout { timeout_ms: 500 }.is_retryable());
        assert!(LinkError::Connection("reset".into()).is_retryable());
        assert!(LinkError::PortBusy("/dev/ttyUSB0".into()).is_retryable());
        assert!(!LinkError::InvalidConfig("no host".into()).is_retryable());
        assert!(!LinkError::Validation("count".into()).is_retryable());
        assert!(!LinkError::Protocol("exception 2".into()).is_retryable());
    }

    #[test]
    fn io_classification() {
        let timeout = LinkError::from_io(io::Error::from(io::ErrorKind::TimedOut), 250);
        assert!(matches!(timeout, LinkError::Timeout { timeout_ms: 250 }));

        let reset = LinkError::from_io(io::Error::from(io::ErrorKind::ConnectionReset), 250);
        assert!(matches!(reset, LinkError::Connection(_)));

        let exception = LinkError::from_io(
            io::Error::new(io::ErrorKind::InvalidData, "Modbus function 3: exception 2"),
            250,
        );
        assert!(matches!(exception, LinkError::Protocol(_)));
    }
}
