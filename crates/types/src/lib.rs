#![allow(dead_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Decoded engineering value for one device parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
    F64(f64),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I16(_) => "int16",
            Value::U16(_) => "uint16",
            Value::I32(_) => "int32",
            Value::U32(_) => "uint32",
            Value::F32(_) => "float32",
            Value::F64(_) => "float64",
            Value::Text(_) => "string",
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(_) | Value::Text(_) => None,
            Value::I16(v) => Some(f64::from(*v)),
            Value::U16(v) => Some(f64::from(*v)),
            Value::I32(v) => Some(f64::from(*v)),
            Value::U32(v) => Some(f64::from(*v)),
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
        }
    }

    /// Compares two values, treating numerics within `epsilon` as equal.
    /// Bools and strings compare exactly; mismatched shapes are unequal.
    pub fn approx_eq(&self, other: &Value, epsilon: f64) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() <= epsilon,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Wire-level data type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    Text,
}

impl DataType {
    /// Natural width in registers. `Text` takes its length from the
    /// parameter's declared word count.
    pub fn width(&self) -> Option<u16> {
        match self {
            DataType::Bool | DataType::Int16 | DataType::Uint16 => Some(1),
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => Some(2),
            DataType::Float64 => Some(4),
            DataType::Text => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, DataType::Int16 | DataType::Int32)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int16 | DataType::Uint16 | DataType::Int32 | DataType::Uint32
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int16 => "int16",
            DataType::Uint16 => "uint16",
            DataType::Int32 => "int32",
            DataType::Uint32 => "uint32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Text => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arrangement of a multi-word value's bytes across the registers returned
/// by a device. Single-word types accept `Abcd` (native, high byte first)
/// and `Badc` (byte-swapped word); the other two orderings only become
/// distinct at two or more words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Abcd,
    Cdab,
    Badc,
    Dcba,
}

impl ByteOrder {
    /// Whether this ordering is defined for a value of `width` registers.
    pub fn valid_for_width(&self, width: u16) -> bool {
        match width {
            1 => matches!(self, ByteOrder::Abcd | ByteOrder::Badc),
            2 | 4 => true,
            _ => false,
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ByteOrder::Abcd => "ABCD",
            ByteOrder::Cdab => "CDAB",
            ByteOrder::Badc => "BADC",
            ByteOrder::Dcba => "DCBA",
        };
        f.write_str(s)
    }
}

/// Addressable register class, which selects the protocol function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterKind {
    Coil,
    DiscreteInput,
    Holding,
    Input,
}

impl RegisterKind {
    pub fn function_code(&self) -> u8 {
        match self {
            RegisterKind::Coil => 1,
            RegisterKind::DiscreteInput => 2,
            RegisterKind::Holding => 3,
            RegisterKind::Input => 4,
        }
    }

    /// Bit-addressed kinds return booleans instead of register words.
    pub fn is_bit(&self) -> bool {
        matches!(self, RegisterKind::Coil | RegisterKind::DiscreteInput)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, RegisterKind::Coil | RegisterKind::Holding)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegisterKind::Coil => "coil",
            RegisterKind::DiscreteInput => "discrete_input",
            RegisterKind::Holding => "holding",
            RegisterKind::Input => "input",
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decodable field inside a register range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Unique within the owning device.
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub byte_order: ByteOrder,
    /// Register (or bit, for coil ranges) offset relative to the range start.
    pub offset: u16,
    /// Width in registers; fixed-width types must match their natural width.
    pub word_count: u16,
    /// Engineering scale applied to the raw value on decode.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Decimal places carried by the scaled value; also sets the change
    /// detection epsilon.
    #[serde(default)]
    pub precision: Option<u8>,
    /// Overrides the data type's signedness when set.
    #[serde(default)]
    pub signed: Option<bool>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl Parameter {
    pub fn effective_signed(&self) -> bool {
        self.signed.unwrap_or_else(|| self.data_type.is_signed())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("parameter name must not be empty".to_string());
        }
        if self.word_count == 0 {
            return Err(format!("parameter {}: word count must be >= 1", self.name));
        }
        if let Some(width) = self.data_type.width() {
            if self.word_count != width {
                return Err(format!(
                    "parameter {}: {} occupies {} register(s), declared {}",
                    self.name, self.data_type, width, self.word_count
                ));
            }
            if !self.byte_order.valid_for_width(width) {
                return Err(format!(
                    "parameter {}: byte order {} is not defined for {}",
                    self.name, self.byte_order, self.data_type
                ));
            }
        }
        if let Some(scale) = self.scale {
            if scale == 0.0 || !scale.is_finite() {
                return Err(format!(
                    "parameter {}: scale must be finite and non-zero",
                    self.name
                ));
            }
        }
        Ok(())
    }
}

/// A contiguous block of device registers plus the parameters decoded from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRange {
    pub start: u16,
    pub count: u16,
    pub kind: RegisterKind,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl RegisterRange {
    pub fn end(&self) -> u32 {
        u32::from(self.start) + u32::from(self.count)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.count == 0 {
            return Err(format!(
                "{} range at {}: count must be >= 1",
                self.kind, self.start
            ));
        }
        if self.end() > 0x1_0000 {
            return Err(format!(
                "{} range at {}: {} units overflow the address space",
                self.kind, self.start, self.count
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for param in &self.parameters {
            param.validate()?;
            if !seen.insert(param.name.as_str()) {
                return Err(format!("duplicate parameter name {}", param.name));
            }
            if self.kind.is_bit() {
                if param.data_type != DataType::Bool {
                    return Err(format!(
                        "parameter {}: {} ranges only hold bool parameters",
                        param.name, self.kind
                    ));
                }
                if u32::from(param.offset) >= u32::from(self.count) {
                    return Err(format!(
                        "parameter {}: bit offset {} outside range of {} bits",
                        param.name, param.offset, self.count
                    ));
                }
            } else {
                let span = u32::from(param.offset) + u32::from(param.word_count);
                if span > u32::from(self.count) {
                    return Err(format!(
                        "parameter {}: offset {} + width {} exceeds range count {}",
                        param.name, param.offset, param.word_count, self.count
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Raw payload of one range read, kept undecoded for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawBlock {
    Registers(Vec<u16>),
    Bits(Vec<bool>),
}

impl RawBlock {
    pub fn len(&self) -> usize {
        match self {
            RawBlock::Registers(words) => words.len(),
            RawBlock::Bits(bits) => bits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRaw {
    pub start: u16,
    pub kind: RegisterKind,
    pub block: RawBlock,
}

/// Decoded result for one parameter within a snapshot. A decode failure is
/// carried in `error` without blanking the rest of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamReading {
    pub name: String,
    pub value: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ParamReading {
    pub fn ok(param: &Parameter, value: Value) -> Self {
        Self {
            name: param.name.clone(),
            value: Some(value),
            unit: param.unit.clone(),
            precision: param.precision,
            error: None,
        }
    }

    pub fn failed(param: &Parameter, error: impl Into<String>) -> Self {
        Self {
            name: param.name.clone(),
            value: None,
            unit: param.unit.clone(),
            precision: param.precision,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Immutable, timestamped set of decoded readings for one device. Superseded
/// by the next poll, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingSnapshot {
    pub device_id: String,
    /// Milliseconds since the unix epoch.
    pub collected_at_ms: u64,
    pub readings: Vec<ParamReading>,
    pub raw: Vec<RangeRaw>,
}

impl ReadingSnapshot {
    pub fn reading(&self, name: &str) -> Option<&ParamReading> {
        self.readings.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn parameter_width_must_match_type() {
        let mut p = param("power", DataType::Float32, 0, 2);
        assert!(p.validate().is_ok());
        p.word_count = 1;
        assert!(p.validate().is_err());
    }

    #[test]
    fn byte_order_width_constraint() {
        assert!(ByteOrder::Abcd.valid_for_width(1));
        assert!(ByteOrder::Badc.valid_for_width(1));
        assert!(!ByteOrder::Cdab.valid_for_width(1));
        assert!(!ByteOrder::Dcba.valid_for_width(1));
        assert!(ByteOrder::Dcba.valid_for_width(2));
        assert!(ByteOrder::Cdab.valid_for_width(4));
    }

    #[test]
    fn range_rejects_overhanging_parameter() {
        let range = RegisterRange {
            start: 100,
            count: 4,
            kind: RegisterKind::Holding,
            parameters: vec![param("energy", DataType::Uint32, 3, 2)],
        };
        assert!(range.validate().is_err());
    }

    #[test]
    fn bit_range_only_holds_bools() {
        let range = RegisterRange {
            start: 0,
            count: 8,
            kind: RegisterKind::Coil,
            parameters: vec![param("speed", DataType::Uint16, 0, 1)],
        };
        assert!(range.validate().is_err());
    }

    #[test]
    fn approx_eq_uses_epsilon() {
        assert!(Value::F64(1.204).approx_eq(&Value::F64(1.2041), 0.005));
        assert!(!Value::F64(1.204).approx_eq(&Value::F64(1.214), 0.005));
        assert!(Value::U16(7).approx_eq(&Value::U16(7), 0.0));
        assert!(!Value::Bool(true).approx_eq(&Value::Bool(false), 1.0));
    }
}
