use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tokio_modbus::client::{rtu, tcp, Context};
use tokio_modbus::prelude::Slave;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, TransportConfig};
use crate::error::LinkError;

/// Connection life cycle. `Failed` is transient: a connect error passes
/// through it and settles back on `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Idle,
    Connecting,
    Connected,
    Closing,
    Failed,
}

/// A live transport session. Exclusively owned: every operation borrows it
/// mutably, and [`ConnectionManager::disconnect`] consumes it, so a handle
/// can neither be shared across concurrent operations nor closed twice.
#[derive(Debug)]
pub struct ConnectionHandle {
    ctx: Context,
    label: String,
    opened_at: Instant,
    healthy: bool,
}

impl ConnectionHandle {
    pub(crate) fn new(ctx: Context, label: String) -> Self {
        Self {
            ctx,
            label,
            opened_at: Instant::now(),
            healthy: true,
        }
    }

    pub(crate) fn context(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub(crate) fn mark_io(&mut self, ok: bool) {
        self.healthy = ok;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

/// Owns the life cycle of one logical connection to one device. Callers that
/// need concurrency serialize externally; a manager handles one operation at
/// a time by construction (`&mut self`).
#[derive(Debug)]
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: ConnState,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            state: ConnState::Idle,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Opens the transport described by the configuration. Configuration
    /// errors are rejected before any connection attempt and are never
    /// retryable.
    pub async fn connect(&mut self) -> Result<ConnectionHandle, LinkError> {
        self.config.validate()?;
        self.state = ConnState::Connecting;

        match self.open().await {
            Ok(handle) => {
                self.state = ConnState::Connected;
                info!(
                    endpoint = %self.config.transport,
                    unit_id = self.config.unit_id,
                    "connected"
                );
                Ok(handle)
            }
            Err(err) => {
                self.state = ConnState::Failed;
                warn!(endpoint = %self.config.transport, error = %err, "connect failed");
                self.state = ConnState::Idle;
                Err(err)
            }
        }
    }

    /// Wraps [`connect`](Self::connect) in up to `retry_count` further
    /// attempts with a fixed delay, returning the first success or the last
    /// error. Non-retryable errors abort immediately.
    pub async fn connect_with_retries(&mut self) -> Result<ConnectionHandle, LinkError> {
        let mut attempt = 0usize;
        loop {
            match self.connect().await {
                Ok(handle) => return Ok(handle),
                Err(err) if err.is_retryable() && attempt < self.config.retry_count => {
                    attempt += 1;
                    debug!(
                        endpoint = %self.config.transport,
                        attempt,
                        max = self.config.retry_count,
                        error = %err,
                        "retrying connect"
                    );
                    sleep(self.config.retry_delay()).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Releases the transport. Dropping the context closes the socket or
    /// serial port; close-side errors have no actionable caller, so none
    /// are surfaced. Consuming the handle makes a double close unrepresentable.
    pub fn disconnect(&mut self, handle: ConnectionHandle) {
        self.state = ConnState::Closing;
        debug!(
            endpoint = %self.config.transport,
            session_ms = handle.age().as_millis() as u64,
            "closing connection"
        );
        drop(handle);
        self.state = ConnState::Idle;
    }

    /// Cheap liveness check: reflects the outcome of the most recent I/O on
    /// the handle without issuing a wire operation.
    pub fn is_healthy(&self, handle: &ConnectionHandle) -> bool {
        self.state == ConnState::Connected && handle.healthy
    }

    async fn open(&self) -> Result<ConnectionHandle, LinkError> {
        let slave = Slave(self.config.unit_id);
        match &self.config.transport {
            TransportConfig::Stream { host, port } => {
                let addr = resolve(host, *port).await?;
                let ctx = timeout(self.config.timeout(), tcp::connect_slave(addr, slave))
                    .await
                    .map_err(|_| LinkError::Timeout {
                        timeout_ms: self.config.timeout_ms,
                    })?
                    .map_err(|err| LinkError::from_io(err, self.config.timeout_ms))?;
                Ok(ConnectionHandle::new(ctx, self.config.transport.to_string()))
            }
            TransportConfig::Serial {
                path,
                baud_rate,
                data_bits,
                stop_bits,
                parity,
            } => {
                // A missing device node is a configuration problem, not a
                // transient fault; check before touching the port.
                if !Path::new(path).exists() {
                    return Err(LinkError::InvalidConfig(format!(
                        "serial port {path} does not exist"
                    )));
                }
                let stream = tokio_serial::new(path.clone(), *baud_rate)
                    .data_bits((*data_bits).into())
                    .stop_bits((*stop_bits).into())
                    .parity((*parity).into())
                    .open_native_async()
                    .map_err(|err| LinkError::from_serial(path, err))?;
                let ctx = rtu::attach_slave(stream, slave);
                Ok(ConnectionHandle::new(ctx, self.config.transport.to_string()))
            }
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, LinkError> {
    let target = format!("{host}:{port}");
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let mut addrs = tokio::net::lookup_host(&target)
        .await
        .map_err(|err| LinkError::Connection(format!("resolve {target}: {err}")))?;
    addrs
        .next()
        .ok_or_else(|| LinkError::Connection(format!("{target} resolved to no addresses")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_config_is_rejected_without_connecting() {
        let mut config = ConnectionConfig::stream("", 502);
        config.retry_count = 0;
        let mut manager = ConnectionManager::new(config);
        let err = manager.connect().await.expect_err("empty host");
        assert!(matches!(err, LinkError::InvalidConfig(_)));
        assert_eq!(manager.state(), ConnState::Idle);
    }

    #[tokio::test]
    async fn missing_serial_path_is_not_retryable() {
        let mut config = ConnectionConfig::serial("/dev/does-not-exist-42", 9_600);
        config.retry_count = 3;
        config.retry_delay_ms = 1_000;
        let mut manager = ConnectionManager::new(config);

        let started = Instant::now();
        let err = manager
            .connect_with_retries()
            .await
            .expect_err("missing port");
        assert!(matches!(err, LinkError::InvalidConfig(_)));
        // Non-retryable: the retry delay must never have been slept.
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn failed_connect_returns_manager_to_idle() {
        let mut config = ConnectionConfig::stream("127.0.0.1", 1);
        config.retry_count = 0;
        config.timeout_ms = 500;
        let mut manager = ConnectionManager::new(config);
        let err = manager.connect().await.expect_err("nothing listens on :1");
        assert!(err.is_retryable(), "{err}");
        assert_eq!(manager.state(), ConnState::Idle);
    }
}
