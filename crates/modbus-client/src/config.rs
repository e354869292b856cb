use std::fmt;
use std::time::Duration;

use crate::error::LinkError;

/// Serial character size.
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// The two supported transport kinds.
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum TransportConfig {
    Stream {
        host: String,
        port: u16,
    },
    Serial {
        path: String,
        baud_rate: u32,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    },
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportConfig::Stream { host, port } => write!(f, "{host}:{port}"),
            TransportConfig::Serial {
                path, baud_rate, ..
            } => write!(f, "{path}@{baud_rate}bps"),
        }
    }
}

/// Everything needed to reach one device, including the retry policy every
/// operation on the device shares. Immutable once a [`ConnectionManager`]
/// is built from it.
///
/// [`ConnectionManager`]: crate::connection::ConnectionManager
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub transport: TransportConfig,
    pub unit_id: u8,
    /// Per-request and per-connect deadline in milliseconds.
    pub timeout_ms: u64,
    /// Connect attempts after the initial one.
    pub retry_count: usize,
    /// Fixed delay between connect attempts in milliseconds.
    pub retry_delay_ms: u64,
    /// Maximum registers per read request; devices with quirks may require
    /// lower batch sizes than the protocol limit.
    pub max_batch_size: Option<u16>,
    /// Optional delay between split reads to placate slower devices.
    pub inter_read_delay_ms: Option<u64>,
}

impl ConnectionConfig {
    pub fn stream(host: impl Into<String>, port: u16) -> Self {
        Self {
            transport: TransportConfig::Stream {
                host: host.into(),
                port,
            },
            unit_id: 1,
            timeout_ms: 1_000,
            retry_count: 2,
            retry_delay_ms: 250,
            max_batch_size: None,
            inter_read_delay_ms: None,
        }
    }

    pub fn serial(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            transport: TransportConfig::Serial {
                path: path.into(),
                baud_rate,
                data_bits: DataBits::Eight,
                stop_bits: StopBits::One,
                parity: Parity::None,
            },
            unit_id: 1,
            timeout_ms: 1_000,
            retry_count: 2,
            retry_delay_ms: 250,
            max_batch_size: None,
            inter_read_delay_ms: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        match &self.transport {
            TransportConfig::Stream { host, port } => {
                if host.trim().is_empty() {
                    return Err(LinkError::InvalidConfig("host must not be empty".into()));
                }
                if *port == 0 {
                    return Err(LinkError::InvalidConfig(
                        "port must be between 1 and 65535".into(),
                    ));
                }
            }
            TransportConfig::Serial {
                path, baud_rate, ..
            } => {
                if path.trim().is_empty() {
                    return Err(LinkError::InvalidConfig(
                        "serial path must not be empty".into(),
                    ));
                }
                if *baud_rate == 0 {
                    return Err(LinkError::InvalidConfig("baud rate must be >= 1".into()));
                }
            }
        }
        if self.timeout_ms == 0 {
            return Err(LinkError::InvalidConfig("timeout_ms must be >= 1".into()));
        }
        if let Some(batch) = self.max_batch_size {
            if batch == 0 {
                return Err(LinkError::InvalidConfig(
                    "max_batch_size must be >= 1 when set".into(),
                ));
            }
        }
        Ok(())
    }
}
