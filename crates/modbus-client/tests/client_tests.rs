use modbus_client::{decode_block, ConnectionConfig, LinkError};
use types::{ByteOrder, DataType, Parameter, RawBlock, RegisterKind, RegisterRange};

fn param(name: &str, data_type: DataType, offset: u16, word_count: u16) -> Parameter {
    Parameter {
        name: name.to_string(),
        data_type,
        byte_order: ByteOrder::Abcd,
        offset,
        word_count,
        scale: None,
        precision: None,
        signed: None,
        unit: None,
    }
}

#[test]
fn stream_config_validation() {
    assert!(ConnectionConfig::stream("10.0.0.5", 502).validate().is_ok());

    let mut config = ConnectionConfig::stream("10.0.0.5", 0);
    assert!(matches!(
        config.validate(),
        Err(LinkError::InvalidConfig(_))
    ));

    config = ConnectionConfig::stream("  ", 502);
    assert!(matches!(
        config.validate(),
        Err(LinkError::InvalidConfig(_))
    ));

    config = ConnectionConfig::stream("10.0.0.5", 502);
    config.timeout_ms = 0;
    assert!(matches!(
        config.validate(),
        Err(LinkError::InvalidConfig(_))
    ));
}

#[test]
fn serial_config_validation() {
    assert!(ConnectionConfig::serial("/dev/ttyUSB0", 9_600)
        .validate()
        .is_ok());

    let config = ConnectionConfig::serial("", 9_600);
    assert!(matches!(
        config.validate(),
        Err(LinkError::InvalidConfig(_))
    ));

    let config = ConnectionConfig::serial("/dev/ttyUSB0", 0);
    assert!(matches!(
        config.validate(),
        Err(LinkError::InvalidConfig(_))
    ));
}

#[test]
fn decode_block_isolates_bad_parameter() {
    let range = RegisterRange {
        start: 100,
        count: 3,
        kind: RegisterKind::Holding,
        parameters: Vec::new(),
    };
    let block = RawBlock::Registers(vec![0x0001, 0x4248, 0x0000]);

    // The second parameter's byte order is invalid for its width; the other
    // two must still decode.
    let mut bad = param("bad", DataType::Uint16, 0, 1);
    bad.byte_order = ByteOrder::Cdab;
    let params = vec![
        param("status", DataType::Uint16, 0, 1),
        bad,
        param("power", DataType::Float32, 1, 2),
    ];

    let readings = decode_block(&block, &range, &params);
    assert_eq!(readings.len(), 3);
    assert!(readings[0].is_ok());
    assert!(!readings[1].is_ok());
    assert!(readings[1].error.as_deref().unwrap_or("").contains("CDAB"));
    assert!(readings[2].is_ok());
    assert_eq!(readings[2].value, Some(types::Value::F32(50.0)));
}

#[test]
fn decode_block_rejects_words_from_bit_range() {
    let range = RegisterRange {
        start: 0,
        count: 8,
        kind: RegisterKind::Coil,
        parameters: Vec::new(),
    };
    let block = RawBlock::Bits(vec![true, false, true, false, false, false, false, false]);

    let params = vec![
        param("run", DataType::Bool, 0, 1),
        param("mode", DataType::Uint16, 1, 1),
    ];
    let readings = decode_block(&block, &range, &params);
    assert_eq!(readings[0].value, Some(types::Value::Bool(true)));
    assert!(readings[1].error.is_some());
}
