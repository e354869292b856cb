use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use modbus_client::{
    decode_block, ConnectionConfig, ConnectionHandle, ConnectionManager, LinkError, RegisterOps,
};
use types::{ParamReading, RangeRaw, ReadingSnapshot, RegisterKind, RegisterRange, Value};

use crate::change::{detect_changes, ChangeEvent};
use crate::error::MonitorError;

/// Read-only device description supplied by the external configuration
/// source.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device_id: String,
    pub connection: ConnectionConfig,
    pub ranges: Vec<RegisterRange>,
    /// Default cadence used by the application when scheduling this device.
    pub poll_interval_ms: u64,
}

impl DeviceRecord {
    pub fn validate(&self) -> Result<(), String> {
        if self.device_id.trim().is_empty() {
            return Err("device id must not be empty".to_string());
        }
        self.connection.validate().map_err(|err| err.to_string())?;
        let mut names = HashSet::new();
        for range in &self.ranges {
            range.validate()?;
            for param in &range.parameters {
                if !names.insert(param.name.clone()) {
                    return Err(format!(
                        "device {}: parameter name {} is not unique",
                        self.device_id, param.name
                    ));
                }
            }
        }
        Ok(())
    }

    fn coil_span_covered(&self, address: u16, count: usize) -> bool {
        let end = u32::from(address) + count as u32;
        self.ranges.iter().any(|range| {
            range.kind == RegisterKind::Coil
                && u32::from(range.start) <= u32::from(address)
                && end <= range.end()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Scheduled,
    OnDemand,
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Completed(Arc<ReadingSnapshot>),
    /// Another poll was already in flight; this one did nothing.
    Skipped,
    /// A scheduled poll finished after its device was unscheduled; the
    /// result was dropped without touching the cache.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceHealth {
    pub device_id: String,
    pub healthy: bool,
    pub last_error: Option<String>,
    /// Timestamp of the last committed snapshot, if any.
    pub last_poll_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReport {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoilWriteReport {
    pub address: u16,
    pub value: bool,
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoilBatchReport {
    pub success: bool,
    pub results: Vec<CoilWriteReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
    pub latency_ms: Option<u64>,
}

struct DeviceState {
    record: RwLock<Arc<DeviceRecord>>,
    in_flight: AtomicBool,
    sched_active: AtomicBool,
    snapshot: RwLock<Option<Arc<ReadingSnapshot>>>,
    last_poll: RwLock<Option<Instant>>,
    healthy: AtomicBool,
    last_error: RwLock<Option<String>>,
    stop: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceState {
    fn new(record: DeviceRecord) -> Self {
        Self {
            record: RwLock::new(Arc::new(record)),
            in_flight: AtomicBool::new(false),
            sched_active: AtomicBool::new(false),
            snapshot: RwLock::new(None),
            last_poll: RwLock::new(None),
            healthy: AtomicBool::new(true),
            last_error: RwLock::new(None),
            stop: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    fn record(&self) -> Arc<DeviceRecord> {
        self.record.read().expect("record lock").clone()
    }

    fn snapshot(&self) -> Option<Arc<ReadingSnapshot>> {
        self.snapshot.read().expect("snapshot lock").clone()
    }

    fn fresh_snapshot(&self, max_age: Duration) -> Option<Arc<ReadingSnapshot>> {
        let last = (*self.last_poll.read().expect("last_poll lock"))?;
        if last.elapsed() <= max_age {
            self.snapshot()
        } else {
            None
        }
    }
}

/// Clears the in-flight flag on every exit path, including early returns and
/// timeouts.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Arena of per-device monitor state keyed by device id. The registry is the
/// single owner of every mutable per-device flag; device tasks and on-demand
/// callers all go through it.
pub struct MonitorRegistry {
    devices: RwLock<HashMap<String, Arc<DeviceState>>>,
    events: mpsc::Sender<ChangeEvent>,
}

impl MonitorRegistry {
    pub fn new(events: mpsc::Sender<ChangeEvent>) -> Arc<Self> {
        Arc::new(Self {
            devices: RwLock::new(HashMap::new()),
            events,
        })
    }

    /// Adds a device, or refreshes the record of an already-registered one
    /// without dropping its cached snapshot.
    pub fn register(&self, record: DeviceRecord) -> Result<(), MonitorError> {
        record.validate().map_err(MonitorError::InvalidRecord)?;
        let mut devices = self.devices.write().expect("devices lock");
        match devices.get(&record.device_id) {
            Some(state) => {
                *state.record.write().expect("record lock") = Arc::new(record);
            }
            None => {
                devices.insert(record.device_id.clone(), Arc::new(DeviceState::new(record)));
            }
        }
        Ok(())
    }

    pub fn unregister(&self, device_id: &str) -> bool {
        let state = {
            let mut devices = self.devices.write().expect("devices lock");
            devices.remove(device_id)
        };
        match state {
            Some(state) => {
                stop_schedule(&state);
                true
            }
            None => false,
        }
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices
            .read()
            .expect("devices lock")
            .keys()
            .cloned()
            .collect()
    }

    fn state(&self, device_id: &str) -> Result<Arc<DeviceState>, MonitorError> {
        self.devices
            .read()
            .expect("devices lock")
            .get(device_id)
            .cloned()
            .ok_or_else(|| MonitorError::UnknownDevice(device_id.to_string()))
    }

    /// One poll cycle for the device; see [`poll_device`] for the semantics.
    pub async fn poll(&self, device_id: &str, kind: PollKind) -> Result<PollOutcome, MonitorError> {
        let state = self.state(device_id)?;
        poll_device(&state, &self.events, kind).await
    }

    /// Forces an immediate poll, bypassing the cache.
    pub async fn read_now(&self, device_id: &str) -> Result<Arc<ReadingSnapshot>, MonitorError> {
        match self.poll(device_id, PollKind::OnDemand).await? {
            PollOutcome::Completed(snapshot) => Ok(snapshot),
            _ => Err(MonitorError::Busy(device_id.to_string())),
        }
    }

    /// Read-through cache: a snapshot younger than `max_age_ms` is returned
    /// with zero wire traffic; otherwise a fresh poll runs. Stale data is
    /// preferred over none when the device is busy or the refresh fails.
    pub async fn get_cached(
        &self,
        device_id: &str,
        max_age_ms: u64,
    ) -> Result<Arc<ReadingSnapshot>, MonitorError> {
        let state = self.state(device_id)?;
        if let Some(snapshot) = state.fresh_snapshot(Duration::from_millis(max_age_ms)) {
            return Ok(snapshot);
        }

        match self.poll(device_id, PollKind::OnDemand).await {
            Ok(PollOutcome::Completed(snapshot)) => Ok(snapshot),
            Ok(_) => state
                .snapshot()
                .ok_or_else(|| MonitorError::Busy(device_id.to_string())),
            Err(err) => state.snapshot().ok_or(err),
        }
    }

    pub fn device_health(&self, device_id: &str) -> Result<DeviceHealth, MonitorError> {
        let state = self.state(device_id)?;
        let health = DeviceHealth {
            device_id: device_id.to_string(),
            healthy: state.healthy.load(Ordering::Acquire),
            last_error: state.last_error.read().expect("last_error lock").clone(),
            last_poll_ms: state.snapshot().map(|snapshot| snapshot.collected_at_ms),
        };
        Ok(health)
    }

    /// Starts the periodic trigger for one device. Each device gets its own
    /// timer task, so one slow transport cannot delay another device's
    /// cadence. Re-scheduling replaces the previous cadence.
    pub fn schedule(&self, device_id: &str, interval_ms: u64) -> Result<(), MonitorError> {
        let state = self.state(device_id)?;
        let (stop_tx, mut stop_rx) = watch::channel(false);
        if let Some(previous) = state.stop.lock().expect("stop lock").replace(stop_tx) {
            let _ = previous.send(true);
        }
        state.sched_active.store(true, Ordering::Release);

        let task_state = Arc::clone(&state);
        let events = self.events.clone();
        let device = device_id.to_string();
        let interval = Duration::from_millis(interval_ms.max(1));
        let handle = tokio::spawn(async move {
            info!(device = %device, interval_ms, "schedule started");
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                match poll_device(&task_state, &events, PollKind::Scheduled).await {
                    Ok(PollOutcome::Completed(_)) => {}
                    Ok(PollOutcome::Skipped) => {
                        debug!(device = %device, "scheduled poll skipped")
                    }
                    Ok(PollOutcome::Discarded) => break,
                    Err(err) => {
                        warn!(device = %device, error = %err, "scheduled poll failed")
                    }
                }
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(device = %device, "schedule stopped");
        });
        // A previously running loop already got its stop signal and winds
        // down on its own without interrupting an in-flight poll.
        let _ = state.task.lock().expect("task lock").replace(handle);
        Ok(())
    }

    /// Cancels future polls. An in-flight poll finishes; its result is
    /// discarded.
    pub fn unschedule(&self, device_id: &str) -> Result<(), MonitorError> {
        let state = self.state(device_id)?;
        stop_schedule(&state);
        Ok(())
    }

    /// Stops every schedule and waits for the device tasks to wind down.
    pub async fn shutdown(&self) {
        let states: Vec<Arc<DeviceState>> = {
            let devices = self.devices.read().expect("devices lock");
            devices.values().cloned().collect()
        };
        let mut handles = Vec::new();
        for state in &states {
            stop_schedule(state);
            if let Some(handle) = state.task.lock().expect("task lock").take() {
                handles.push(handle);
            }
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Writes one named setpoint through a scoped connection. The result is
    /// a report rather than an error: operational failures are something the
    /// caller shows, not handles.
    pub async fn write_setpoint(
        &self,
        device_id: &str,
        parameter: &str,
        value: &Value,
    ) -> Result<WriteReport, MonitorError> {
        let state = self.state(device_id)?;
        let record = state.record();

        let located = record.ranges.iter().find_map(|range| {
            range
                .parameters
                .iter()
                .find(|param| param.name == parameter)
                .map(|param| (range, param))
        });
        let Some((range, param)) = located else {
            return Ok(WriteReport {
                success: false,
                message: format!("device {device_id} has no parameter {parameter}"),
            });
        };

        let mut manager = ConnectionManager::new(record.connection.clone());
        let mut handle = match manager.connect_with_retries().await {
            Ok(handle) => handle,
            Err(err) => {
                return Ok(WriteReport {
                    success: false,
                    message: format!("connect failed: {err}"),
                })
            }
        };
        let ops = RegisterOps::for_config(&record.connection);
        let result = ops.write_parameter(&mut handle, range, param, value).await;
        manager.disconnect(handle);

        Ok(match result {
            Ok(()) => {
                counter!("monitor_setpoint_writes_total").increment(1);
                WriteReport {
                    success: true,
                    message: format!("setpoint {parameter} applied"),
                }
            }
            Err(err) => WriteReport {
                success: false,
                message: err.to_string(),
            },
        })
    }

    pub async fn write_coil(
        &self,
        device_id: &str,
        address: u16,
        value: bool,
    ) -> Result<WriteReport, MonitorError> {
        let report = self.write_coils(device_id, address, &[value]).await?;
        Ok(WriteReport {
            success: report.success,
            message: match report.results.first().and_then(|r| r.message.clone()) {
                Some(message) => message,
                None => format!("coil {address} set to {value}"),
            },
        })
    }

    /// Batch coil write with per-coil outcomes. A whole-batch transport
    /// rejection reports every element as failed with the same error.
    pub async fn write_coils(
        &self,
        device_id: &str,
        address: u16,
        values: &[bool],
    ) -> Result<CoilBatchReport, MonitorError> {
        let state = self.state(device_id)?;
        let record = state.record();

        if values.is_empty() {
            return Ok(CoilBatchReport {
                success: false,
                results: Vec::new(),
            });
        }
        if !record.coil_span_covered(address, values.len()) {
            let message = format!(
                "device {device_id} has no writable coil range covering {address}..{}",
                u32::from(address) + values.len() as u32
            );
            return Ok(failed_batch(address, values, &message));
        }

        let mut manager = ConnectionManager::new(record.connection.clone());
        let mut handle = match manager.connect_with_retries().await {
            Ok(handle) => handle,
            Err(err) => {
                return Ok(failed_batch(
                    address,
                    values,
                    &format!("connect failed: {err}"),
                ))
            }
        };
        let ops = RegisterOps::for_config(&record.connection);
        let result = ops.write_coils(&mut handle, address, values).await;
        manager.disconnect(handle);

        Ok(match result {
            Ok(writes) => {
                let results: Vec<CoilWriteReport> = writes
                    .into_iter()
                    .map(|write| CoilWriteReport {
                        address: write.address,
                        value: write.value,
                        success: write.error.is_none(),
                        message: write.error,
                    })
                    .collect();
                CoilBatchReport {
                    success: results.iter().all(|r| r.success),
                    results,
                }
            }
            Err(err) => failed_batch(address, values, &err.to_string()),
        })
    }
}

/// One poll cycle: connect with retries, read every configured range, swap
/// in a fresh snapshot and always release the transport. The in-flight flag
/// is the re-entrancy guard; a second caller is skipped, never queued. A
/// transport failure keeps the previous snapshot and flips the health flag.
async fn poll_device(
    state: &Arc<DeviceState>,
    events: &mpsc::Sender<ChangeEvent>,
    kind: PollKind,
) -> Result<PollOutcome, MonitorError> {
    let record = state.record();
    let device_id = record.device_id.as_str();

    if state
        .in_flight
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!(device = device_id, "poll skipped, already in flight");
        return Ok(PollOutcome::Skipped);
    }
    let _guard = InFlightGuard(&state.in_flight);

    counter!("monitor_polls_total").increment(1);
    let started = Instant::now();

    let mut manager = ConnectionManager::new(record.connection.clone());
    let mut handle = match manager.connect_with_retries().await {
        Ok(handle) => handle,
        Err(err) => {
            record_failure(state, device_id, &err);
            return Err(MonitorError::Poll {
                device: device_id.to_string(),
                source: err,
            });
        }
    };

    let ops = RegisterOps::for_config(&record.connection);
    let result = read_all_ranges(&ops, &mut handle, &record).await;
    manager.disconnect(handle);

    let (readings, raw) = match result {
        Ok(pair) => pair,
        Err(err) => {
            record_failure(state, device_id, &err);
            return Err(MonitorError::Poll {
                device: device_id.to_string(),
                source: err,
            });
        }
    };

    let snapshot = Arc::new(ReadingSnapshot {
        device_id: record.device_id.clone(),
        collected_at_ms: unix_ms(),
        readings,
        raw,
    });

    if kind == PollKind::Scheduled && !state.sched_active.load(Ordering::Acquire) {
        debug!(device = device_id, "poll result discarded, device unscheduled");
        return Ok(PollOutcome::Discarded);
    }

    let previous = {
        let mut slot = state.snapshot.write().expect("snapshot lock");
        let previous = slot.replace(snapshot.clone());
        *state.last_poll.write().expect("last_poll lock") = Some(Instant::now());
        previous
    };
    state.healthy.store(true, Ordering::Release);
    *state.last_error.write().expect("last_error lock") = None;
    histogram!("monitor_poll_duration_ms").record(started.elapsed().as_millis() as f64);

    if let Some(previous) = previous {
        let changed = detect_changes(&previous, &snapshot);
        if !changed.is_empty() {
            let event = ChangeEvent {
                device_id: record.device_id.clone(),
                changed,
                snapshot: snapshot.clone(),
            };
            if let Err(err) = events.try_send(event) {
                warn!(device = device_id, error = %err, "change event dropped");
            }
        }
    }

    info!(
        device = device_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        readings = snapshot.readings.len(),
        "poll complete"
    );
    Ok(PollOutcome::Completed(snapshot))
}

fn record_failure(state: &DeviceState, device_id: &str, err: &LinkError) {
    counter!("monitor_poll_failures_total").increment(1);
    state.healthy.store(false, Ordering::Release);
    *state.last_error.write().expect("last_error lock") = Some(err.to_string());
    warn!(device = device_id, error = %err, "poll failed, keeping previous snapshot");
}

/// One-shot connect/disconnect probe, for "test connection" actions. Uses a
/// single attempt; the caller is interactive and retries by clicking again.
pub async fn probe_connection(config: &ConnectionConfig) -> ProbeResult {
    let started = Instant::now();
    let mut manager = ConnectionManager::new(config.clone());
    match manager.connect().await {
        Ok(handle) => {
            let latency = started.elapsed();
            let message = format!("connected to {}", config.transport);
            manager.disconnect(handle);
            ProbeResult {
                success: true,
                message,
                latency_ms: Some(latency.as_millis() as u64),
            }
        }
        Err(err) => ProbeResult {
            success: false,
            message: err.to_string(),
            latency_ms: None,
        },
    }
}

async fn read_all_ranges(
    ops: &RegisterOps,
    handle: &mut ConnectionHandle,
    record: &DeviceRecord,
) -> Result<(Vec<ParamReading>, Vec<RangeRaw>), LinkError> {
    let mut readings = Vec::new();
    let mut raw = Vec::new();
    for range in &record.ranges {
        let block = ops.read_range(handle, range).await?;
        readings.extend(decode_block(&block, range, &range.parameters));
        raw.push(RangeRaw {
            start: range.start,
            kind: range.kind,
            block,
        });
    }
    Ok((readings, raw))
}

fn stop_schedule(state: &DeviceState) {
    state.sched_active.store(false, Ordering::Release);
    if let Some(stop) = state.stop.lock().expect("stop lock").take() {
        let _ = stop.send(true);
    }
}

fn failed_batch(address: u16, values: &[bool], message: &str) -> CoilBatchReport {
    CoilBatchReport {
        success: false,
        results: values
            .iter()
            .enumerate()
            .map(|(i, value)| CoilWriteReport {
                address: address.wrapping_add(i as u16),
                value: *value,
                success: false,
                message: Some(message.to_string()),
            })
            .collect(),
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{ByteOrder, DataType, Parameter};

    fn unreachable_record(device_id: &str, retry_count: usize, retry_delay_ms: u64) -> DeviceRecord {
        // Nothing listens on port 1; connects fail fast and retries pace the
        // poll's duration deterministically.
        let mut connection = ConnectionConfig::stream("127.0.0.1", 1);
        connection.timeout_ms = 500;
        connection.retry_count = retry_count;
        connection.retry_delay_ms = retry_delay_ms;
        DeviceRecord {
            device_id: device_id.to_string(),
            connection,
            ranges: vec![RegisterRange {
                start: 0,
                count: 4,
                kind: RegisterKind::Holding,
                parameters: Vec::new(),
            }],
            poll_interval_ms: 1_000,
        }
    }

    fn seeded_snapshot(device_id: &str) -> Arc<ReadingSnapshot> {
        Arc::new(ReadingSnapshot {
            device_id: device_id.to_string(),
            collected_at_ms: unix_ms(),
            readings: vec![ParamReading {
                name: "power".to_string(),
                value: Some(Value::F64(41.5)),
                unit: Some("kW".to_string()),
                precision: Some(1),
                error: None,
            }],
            raw: Vec::new(),
        })
    }

    fn seed(registry: &MonitorRegistry, device_id: &str, snapshot: Arc<ReadingSnapshot>) {
        let state = registry.state(device_id).expect("state");
        *state.snapshot.write().expect("snapshot lock") = Some(snapshot);
        *state.last_poll.write().expect("last_poll lock") = Some(Instant::now());
    }

    #[tokio::test]
    async fn fresh_cache_is_served_without_wire_traffic() {
        let (tx, _rx) = mpsc::channel(8);
        let registry = MonitorRegistry::new(tx);
        registry
            .register(unreachable_record("plc-1", 3, 500))
            .expect("register");
        seed(&registry, "plc-1", seeded_snapshot("plc-1"));

        let started = Instant::now();
        let first = registry.get_cached("plc-1", 5_000).await.expect("cached");
        let second = registry.get_cached("plc-1", 5_000).await.expect("cached");
        // A wire attempt against this record costs >= 1.5s of retries; both
        // reads must come straight from the cache.
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(first, second);
        assert_eq!(
            first.reading("power").and_then(|r| r.value.clone()),
            Some(Value::F64(41.5))
        );
    }

    #[tokio::test]
    async fn stale_cache_triggers_poll_and_keeps_old_data_on_failure() {
        let (tx, _rx) = mpsc::channel(8);
        let registry = MonitorRegistry::new(tx);
        registry
            .register(unreachable_record("plc-2", 0, 10))
            .expect("register");
        let snapshot = seeded_snapshot("plc-2");
        seed(&registry, "plc-2", snapshot.clone());

        // Zero freshness window: the read-through path must attempt a poll,
        // fail against the dead endpoint and fall back to the stale data.
        let result = registry.get_cached("plc-2", 0).await.expect("stale fallback");
        assert_eq!(result, snapshot);

        let health = registry.device_health("plc-2").expect("health");
        assert!(!health.healthy);
        assert!(health.last_error.is_some());
    }

    #[tokio::test]
    async fn failed_poll_preserves_snapshot_and_flags_health() {
        let (tx, _rx) = mpsc::channel(8);
        let registry = MonitorRegistry::new(tx);
        registry
            .register(unreachable_record("plc-3", 0, 10))
            .expect("register");
        let snapshot = seeded_snapshot("plc-3");
        seed(&registry, "plc-3", snapshot.clone());

        let err = registry
            .poll("plc-3", PollKind::OnDemand)
            .await
            .expect_err("dead endpoint");
        assert!(matches!(err, MonitorError::Poll { .. }));

        let state = registry.state("plc-3").expect("state");
        assert_eq!(state.snapshot(), Some(snapshot));
        assert!(!state.healthy.load(Ordering::Acquire));
        assert!(!state.in_flight.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn register_refresh_keeps_cached_snapshot() {
        let (tx, _rx) = mpsc::channel(8);
        let registry = MonitorRegistry::new(tx);
        registry
            .register(unreachable_record("plc-4", 0, 10))
            .expect("register");
        seed(&registry, "plc-4", seeded_snapshot("plc-4"));

        let mut updated = unreachable_record("plc-4", 1, 20);
        updated.poll_interval_ms = 250;
        registry.register(updated).expect("refresh");

        let state = registry.state("plc-4").expect("state");
        assert!(state.snapshot().is_some());
        assert_eq!(state.record().poll_interval_ms, 250);
    }

    #[test]
    fn record_validation_rejects_duplicate_names() {
        let mut record = unreachable_record("plc-5", 0, 10);
        let param = Parameter {
            name: "power".to_string(),
            data_type: DataType::Uint16,
            byte_order: ByteOrder::Abcd,
            offset: 0,
            word_count: 1,
            scale: None,
            precision: None,
            signed: None,
            unit: None,
        };
        record.ranges = vec![
            RegisterRange {
                start: 0,
                count: 2,
                kind: RegisterKind::Holding,
                parameters: vec![param.clone()],
            },
            RegisterRange {
                start: 10,
                count: 2,
                kind: RegisterKind::Holding,
                parameters: vec![param],
            },
        ];
        assert!(record.validate().is_err());
    }
}
