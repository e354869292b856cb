use std::path::PathBuf;

use monitor_app::AppConfig;
use modbus_client::TransportConfig;
use types::{ByteOrder, DataType, RegisterKind};

#[test]
fn toml_config_loads_and_validates() {
    let config =
        AppConfig::load_with_path(Some(fixture_path("config-valid.toml"))).expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.channel_capacity, 64);
    assert_eq!(config.devices.len(), 2);

    let chiller = &config.devices[0];
    assert_eq!(chiller.device_id, "chiller-1");
    assert_eq!(chiller.poll_interval_ms, 2_000);
    assert!(matches!(
        chiller.connection.transport,
        TransportConfig::Stream { ref host, port: 502 } if host == "192.168.10.20"
    ));
    assert_eq!(chiller.connection.timeout_ms, 750);

    let range = &chiller.ranges[0];
    assert_eq!(range.kind, RegisterKind::Holding);
    let power = range
        .parameters
        .iter()
        .find(|p| p.name == "power")
        .expect("power parameter");
    assert_eq!(power.data_type, DataType::Float32);
    assert_eq!(power.byte_order, ByteOrder::Cdab);
    // word_count defaults to the type's natural width.
    assert_eq!(power.word_count, 2);

    let pump = &config.devices[1];
    assert!(matches!(
        pump.connection.transport,
        TransportConfig::Serial { ref path, baud_rate: 19_200, .. } if path == "/dev/ttyUSB0"
    ));
    // Devices without an explicit interval inherit the default.
    assert_eq!(pump.poll_interval_ms, 1_000);
}

#[test]
fn json_config_loads_and_validates() {
    let config =
        AppConfig::load_with_path(Some(fixture_path("config-valid.json"))).expect("load config");
    config.validate().expect("validate config");
    assert_eq!(config.devices.len(), 1);
    assert_eq!(config.devices[0].device_id, "meter-7");
}

#[test]
fn invalid_port_fails_validation() {
    let config =
        AppConfig::load_with_path(Some(fixture_path("config-invalid.toml"))).expect("load config");
    let err = config.validate().expect_err("port 0 must fail");
    assert!(err.to_string().contains("chiller-1"));
}

#[test]
fn duplicate_parameter_names_fail_validation() {
    let config = AppConfig::load_with_path(Some(fixture_path("config-duplicate-param.toml")))
        .expect("load config");
    assert!(config.validate().is_err());
}

#[test]
fn unknown_data_type_fails_at_load() {
    let err = AppConfig::load_with_path(Some(fixture_path("config-bad-type.toml")))
        .expect_err("unknown data type");
    assert!(err.to_string().contains("unknown data type"));
}

#[test]
fn string_parameter_requires_word_count() {
    let err = AppConfig::load_with_path(Some(fixture_path("config-string-no-count.toml")))
        .expect_err("missing word_count");
    assert!(err.to_string().contains("word_count"));
}

fn fixture_path(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path.to_string_lossy().to_string()
}
