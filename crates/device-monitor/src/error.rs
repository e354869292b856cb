use thiserror::Error;

use modbus_client::LinkError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("unknown device {0}")]
    UnknownDevice(String),

    #[error("invalid device record: {0}")]
    InvalidRecord(String),

    /// A poll is already in flight and no cached data exists to fall back on.
    #[error("device {0} is busy")]
    Busy(String),

    #[error("poll failed for device {device}: {source}")]
    Poll {
        device: String,
        #[source]
        source: LinkError,
    },
}
