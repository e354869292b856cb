use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use device_monitor::DeviceRecord;
use modbus_client::{ConnectionConfig, DataBits, Parity, StopBits, TransportConfig};
use types::{ByteOrder, DataType, Parameter, RegisterKind, RegisterRange};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_RETRY_COUNT: usize = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 250;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub channel_capacity: usize,
    pub metrics_listen: Option<SocketAddr>,
    pub devices: Vec<DeviceRecord>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Loads the TOML (or, by extension, JSON) config from the given path,
    /// falling back to `MONITOR_CONFIG`; environment variables override the
    /// common knobs afterwards.
    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let file = load_file_config(config_path.as_deref())?.unwrap_or_default();

        let mut defaults = Defaults::from_file(file.defaults.as_ref());
        if let Some(interval_ms) = parse_env_u64("MONITOR_POLL_INTERVAL_MS") {
            defaults.poll_interval_ms = interval_ms;
        }

        let mut channel_capacity = file
            .monitor
            .as_ref()
            .and_then(|m| m.channel_capacity)
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        if let Some(capacity) = parse_env_usize("MONITOR_CHANNEL_CAPACITY") {
            channel_capacity = capacity;
        }

        let mut metrics_listen = file.monitor.as_ref().and_then(|m| m.metrics_listen.clone());
        if let Ok(listen) = env::var("MONITOR_METRICS_LISTEN") {
            metrics_listen = Some(listen);
        }
        let metrics_listen = metrics_listen
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("invalid metrics listen address {addr}"))
            })
            .transpose()?;

        let mut devices = Vec::with_capacity(file.devices.len());
        for device in file.devices {
            devices.push(map_device(device, &defaults)?);
        }

        Ok(Self {
            channel_capacity,
            metrics_listen,
            devices,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            bail!("monitor.channel_capacity must be >= 1");
        }
        let mut ids = std::collections::HashSet::new();
        for device in &self.devices {
            if !ids.insert(device.device_id.as_str()) {
                bail!("duplicate device id {}", device.device_id);
            }
            device
                .validate()
                .map_err(|err| anyhow::anyhow!("device {}: {err}", device.device_id))?;
            if device.poll_interval_ms == 0 {
                bail!("device {}: poll_interval_ms must be >= 1", device.device_id);
            }
        }
        Ok(())
    }
}

struct Defaults {
    timeout_ms: u64,
    retry_count: usize,
    retry_delay_ms: u64,
    poll_interval_ms: u64,
}

impl Defaults {
    fn from_file(file: Option<&FileDefaults>) -> Self {
        Self {
            timeout_ms: file.and_then(|f| f.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS),
            retry_count: file
                .and_then(|f| f.retry_count)
                .unwrap_or(DEFAULT_RETRY_COUNT),
            retry_delay_ms: file
                .and_then(|f| f.retry_delay_ms)
                .unwrap_or(DEFAULT_RETRY_DELAY_MS),
            poll_interval_ms: file
                .and_then(|f| f.poll_interval_ms)
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    monitor: Option<FileMonitor>,
    defaults: Option<FileDefaults>,
    #[serde(default)]
    devices: Vec<FileDevice>,
}

#[derive(Debug, Deserialize)]
struct FileMonitor {
    channel_capacity: Option<usize>,
    metrics_listen: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileDefaults {
    timeout_ms: Option<u64>,
    retry_count: Option<usize>,
    retry_delay_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileDevice {
    id: String,
    poll_interval_ms: Option<u64>,
    connection: FileConnection,
    #[serde(default)]
    ranges: Vec<FileRange>,
}

#[derive(Debug, Deserialize)]
struct FileConnection {
    kind: String,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    baud_rate: Option<u32>,
    data_bits: Option<u8>,
    stop_bits: Option<u8>,
    parity: Option<String>,
    unit_id: Option<u8>,
    timeout_ms: Option<u64>,
    retry_count: Option<usize>,
    retry_delay_ms: Option<u64>,
    max_batch_size: Option<u16>,
    inter_read_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileRange {
    start: u16,
    count: u16,
    kind: String,
    #[serde(default)]
    parameters: Vec<FileParameter>,
}

#[derive(Debug, Deserialize)]
struct FileParameter {
    name: String,
    data_type: String,
    byte_order: Option<String>,
    offset: u16,
    word_count: Option<u16>,
    scale: Option<f64>,
    precision: Option<u8>,
    signed: Option<bool>,
    unit: Option<String>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("MONITOR_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content = fs::read_to_string(&path).with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn map_device(device: FileDevice, defaults: &Defaults) -> Result<DeviceRecord> {
    let connection = map_connection(&device.id, device.connection, defaults)?;
    let mut ranges = Vec::with_capacity(device.ranges.len());
    for range in device.ranges {
        ranges.push(map_range(&device.id, range)?);
    }
    Ok(DeviceRecord {
        device_id: device.id,
        connection,
        ranges,
        poll_interval_ms: device.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
    })
}

fn map_connection(
    device_id: &str,
    connection: FileConnection,
    defaults: &Defaults,
) -> Result<ConnectionConfig> {
    let transport = match connection.kind.as_str() {
        "stream" | "tcp" => TransportConfig::Stream {
            host: connection
                .host
                .with_context(|| format!("device {device_id}: stream connection needs a host"))?,
            port: connection.port.unwrap_or(502),
        },
        "serial" | "rtu" => TransportConfig::Serial {
            path: connection
                .path
                .with_context(|| format!("device {device_id}: serial connection needs a path"))?,
            baud_rate: connection.baud_rate.unwrap_or(9_600),
            data_bits: map_data_bits(device_id, connection.data_bits.unwrap_or(8))?,
            stop_bits: map_stop_bits(device_id, connection.stop_bits.unwrap_or(1))?,
            parity: map_parity(device_id, connection.parity.as_deref().unwrap_or("none"))?,
        },
        other => bail!("device {device_id}: unknown connection kind {other}"),
    };

    Ok(ConnectionConfig {
        transport,
        unit_id: connection.unit_id.unwrap_or(1),
        timeout_ms: connection.timeout_ms.unwrap_or(defaults.timeout_ms),
        retry_count: connection.retry_count.unwrap_or(defaults.retry_count),
        retry_delay_ms: connection.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
        max_batch_size: connection.max_batch_size,
        inter_read_delay_ms: connection.inter_read_delay_ms,
    })
}

fn map_range(device_id: &str, range: FileRange) -> Result<RegisterRange> {
    let kind = match range.kind.as_str() {
        "coil" => RegisterKind::Coil,
        "discrete_input" => RegisterKind::DiscreteInput,
        "holding" => RegisterKind::Holding,
        "input" => RegisterKind::Input,
        other => bail!("device {device_id}: unknown range kind {other}"),
    };
    let mut parameters = Vec::with_capacity(range.parameters.len());
    for parameter in range.parameters {
        parameters.push(map_parameter(device_id, parameter)?);
    }
    Ok(RegisterRange {
        start: range.start,
        count: range.count,
        kind,
        parameters,
    })
}

fn map_parameter(device_id: &str, parameter: FileParameter) -> Result<Parameter> {
    let data_type = match parameter.data_type.as_str() {
        "bool" => DataType::Bool,
        "int16" => DataType::Int16,
        "uint16" => DataType::Uint16,
        "int32" => DataType::Int32,
        "uint32" => DataType::Uint32,
        "float32" => DataType::Float32,
        "float64" => DataType::Float64,
        "string" => DataType::Text,
        other => bail!(
            "device {device_id}: parameter {}: unknown data type {other}",
            parameter.name
        ),
    };
    let byte_order = match parameter.byte_order.as_deref() {
        None => ByteOrder::default(),
        Some("abcd") => ByteOrder::Abcd,
        Some("cdab") => ByteOrder::Cdab,
        Some("badc") => ByteOrder::Badc,
        Some("dcba") => ByteOrder::Dcba,
        Some(other) => bail!(
            "device {device_id}: parameter {}: unknown byte order {other}",
            parameter.name
        ),
    };
    let word_count = match (parameter.word_count, data_type.width()) {
        (Some(count), _) => count,
        (None, Some(width)) => width,
        (None, None) => bail!(
            "device {device_id}: parameter {}: string parameters need an explicit word_count",
            parameter.name
        ),
    };

    Ok(Parameter {
        name: parameter.name,
        data_type,
        byte_order,
        offset: parameter.offset,
        word_count,
        scale: parameter.scale,
        precision: parameter.precision,
        signed: parameter.signed,
        unit: parameter.unit,
    })
}

fn map_data_bits(device_id: &str, bits: u8) -> Result<DataBits> {
    Ok(match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        other => bail!("device {device_id}: unsupported data bits {other}"),
    })
}

fn map_stop_bits(device_id: &str, bits: u8) -> Result<StopBits> {
    Ok(match bits {
        1 => StopBits::One,
        2 => StopBits::Two,
        other => bail!("device {device_id}: unsupported stop bits {other}"),
    })
}

fn map_parity(device_id: &str, parity: &str) -> Result<Parity> {
    Ok(match parity {
        "none" => Parity::None,
        "odd" => Parity::Odd,
        "even" => Parity::Even,
        other => bail!("device {device_id}: unsupported parity {other}"),
    })
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}
