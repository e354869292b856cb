use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use device_monitor::{probe_connection, DeviceRecord, MonitorRegistry};
use modbus_client::ConnectionConfig;
use types::{ByteOrder, DataType, Parameter, RegisterKind, RegisterRange, Value};

fn dead_device(device_id: &str) -> DeviceRecord {
    let mut connection = ConnectionConfig::stream("127.0.0.1", 1);
    connection.timeout_ms = 400;
    connection.retry_count = 0;
    connection.retry_delay_ms = 10;
    DeviceRecord {
        device_id: device_id.to_string(),
        connection,
        ranges: vec![
            RegisterRange {
                start: 0,
                count: 16,
                kind: RegisterKind::Coil,
                parameters: Vec::new(),
            },
            RegisterRange {
                start: 100,
                count: 4,
                kind: RegisterKind::Holding,
                parameters: vec![Parameter {
                    name: "setpoint".to_string(),
                    data_type: DataType::Int16,
                    byte_order: ByteOrder::Abcd,
                    offset: 0,
                    word_count: 1,
                    scale: Some(0.1),
                    precision: Some(1),
                    signed: None,
                    unit: Some("degC".to_string()),
                }],
            },
        ],
        poll_interval_ms: 1_000,
    }
}

#[tokio::test]
async fn rejected_coil_batch_reports_every_element_with_same_error() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = MonitorRegistry::new(tx);
    registry.register(dead_device("plc-1")).expect("register");

    let report = registry
        .write_coils("plc-1", 0, &[true, false, true])
        .await
        .expect("report");

    assert!(!report.success);
    assert_eq!(report.results.len(), 3);
    let first_message = report.results[0].message.clone().expect("message");
    for (i, result) in report.results.iter().enumerate() {
        assert_eq!(result.address, i as u16);
        assert!(!result.success);
        assert_eq!(result.message.as_ref(), Some(&first_message));
    }
}

#[tokio::test]
async fn coil_write_outside_configured_ranges_never_connects() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = MonitorRegistry::new(tx);
    registry.register(dead_device("plc-2")).expect("register");

    let started = Instant::now();
    let report = registry
        .write_coils("plc-2", 500, &[true])
        .await
        .expect("report");

    assert!(!report.success);
    assert!(report.results[0]
        .message
        .as_deref()
        .unwrap_or("")
        .contains("no writable coil range"));
    // Validation failures must not pay the connect timeout.
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[tokio::test]
async fn setpoint_write_to_unknown_parameter_fails_without_transport() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = MonitorRegistry::new(tx);
    registry.register(dead_device("plc-3")).expect("register");

    let started = Instant::now();
    let report = registry
        .write_setpoint("plc-3", "missing", &Value::F64(1.0))
        .await
        .expect("report");
    assert!(!report.success);
    assert!(report.message.contains("no parameter"));
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[tokio::test]
async fn setpoint_write_reports_connect_failure() {
    let (tx, _rx) = mpsc::channel(8);
    let registry = MonitorRegistry::new(tx);
    registry.register(dead_device("plc-4")).expect("register");

    let report = registry
        .write_setpoint("plc-4", "setpoint", &Value::F64(21.5))
        .await
        .expect("report");
    assert!(!report.success);
    assert!(report.message.contains("connect failed"));
}

#[tokio::test]
async fn probe_reports_failure_with_message() {
    let mut config = ConnectionConfig::stream("127.0.0.1", 1);
    config.timeout_ms = 400;
    config.retry_count = 0;

    let result = probe_connection(&config).await;
    assert!(!result.success);
    assert!(result.latency_ms.is_none());
    assert!(!result.message.is_empty());
}
