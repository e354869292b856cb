#![allow(dead_code)]

//! Pure conversion between raw 16-bit register words and typed engineering
//! values. Stateless and referentially transparent; every byte-order
//! transform is an involution, so encode and decode share one word
//! permutation.

use thiserror::Error;
use types::{ByteOrder, DataType, Parameter, Value};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("byte order {order} is not defined for {data_type}")]
    InvalidByteOrder {
        order: ByteOrder,
        data_type: DataType,
    },
    #[error("value {value} cannot be represented as {target}")]
    ValueOutOfRange { value: String, target: &'static str },
    #[error("need {required} unit(s) at offset {offset}, have {available}")]
    InsufficientData {
        required: usize,
        offset: usize,
        available: usize,
    },
    #[error("expected a {expected} value, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("register data is not valid text: {0}")]
    InvalidText(String),
}

/// Applies the byte-order permutation for a value occupying `words.len()`
/// registers. Words of 32-bit values swap at word granularity for `Cdab`
/// and byte granularity for `Badc`; 64-bit values permute at 32-bit
/// half-word granularity only.
fn order_words(words: &[u16], order: ByteOrder, data_type: DataType) -> Result<Vec<u16>, CodecError> {
    let invalid = || CodecError::InvalidByteOrder { order, data_type };
    match words.len() {
        1 => match order {
            ByteOrder::Abcd => Ok(vec![words[0]]),
            ByteOrder::Badc => Ok(vec![words[0].swap_bytes()]),
            ByteOrder::Cdab | ByteOrder::Dcba => Err(invalid()),
        },
        2 => Ok(match order {
            ByteOrder::Abcd => vec![words[0], words[1]],
            ByteOrder::Cdab => vec![words[1], words[0]],
            ByteOrder::Badc => vec![words[0].swap_bytes(), words[1].swap_bytes()],
            ByteOrder::Dcba => vec![words[1].swap_bytes(), words[0].swap_bytes()],
        }),
        4 => Ok(match order {
            ByteOrder::Abcd => vec![words[0], words[1], words[2], words[3]],
            ByteOrder::Cdab => vec![words[2], words[3], words[0], words[1]],
            ByteOrder::Badc => vec![words[1], words[0], words[3], words[2]],
            ByteOrder::Dcba => vec![words[3], words[2], words[1], words[0]],
        }),
        _ => Err(invalid()),
    }
}

fn u32_from(words: &[u16]) -> u32 {
    (u32::from(words[0]) << 16) | u32::from(words[1])
}

fn u64_from(words: &[u16]) -> u64 {
    (u64::from(words[0]) << 48)
        | (u64::from(words[1]) << 32)
        | (u64::from(words[2]) << 16)
        | u64::from(words[3])
}

fn u32_to_words(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, value as u16]
}

fn u64_to_words(value: u64) -> [u16; 4] {
    [
        (value >> 48) as u16,
        (value >> 32) as u16,
        (value >> 16) as u16,
        value as u16,
    ]
}

/// Packs register words into bytes, high byte first.
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        bytes.push((word >> 8) as u8);
        bytes.push(*word as u8);
    }
    bytes
}

/// Inverse of [`words_to_bytes`]; a trailing odd byte fills the high half.
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u16> {
    let mut words = Vec::with_capacity(bytes.len().div_ceil(2));
    for chunk in bytes.chunks(2) {
        let hi = chunk[0];
        let lo = chunk.get(1).copied().unwrap_or(0);
        words.push((u16::from(hi) << 8) | u16::from(lo));
    }
    words
}

fn round_to(value: f64, precision: Option<u8>) -> f64 {
    match precision {
        Some(p) => {
            let factor = 10f64.powi(i32::from(p));
            (value * factor).round() / factor
        }
        None => value,
    }
}

/// Decodes an unscaled typed value from `words` at `offset`. `count` is the
/// width in registers and must match the data type's natural width for
/// fixed-width types; `signed` overrides the type's signedness.
pub fn decode(
    words: &[u16],
    offset: usize,
    count: usize,
    data_type: DataType,
    order: ByteOrder,
    signed: Option<bool>,
) -> Result<Value, CodecError> {
    let width = data_type.width().map(usize::from).unwrap_or(count);
    let end = offset
        .checked_add(width)
        .filter(|end| *end <= words.len())
        .ok_or(CodecError::InsufficientData {
            required: width,
            offset,
            available: words.len(),
        })?;
    let slice = &words[offset..end];
    let signed = signed.unwrap_or_else(|| data_type.is_signed());

    match data_type {
        DataType::Bool => {
            let ordered = order_words(slice, order, data_type)?;
            Ok(Value::Bool(ordered[0] != 0))
        }
        DataType::Int16 | DataType::Uint16 => {
            let word = order_words(slice, order, data_type)?[0];
            Ok(if signed {
                Value::I16(word as i16)
            } else {
                Value::U16(word)
            })
        }
        DataType::Int32 | DataType::Uint32 => {
            let raw = u32_from(&order_words(slice, order, data_type)?);
            Ok(if signed {
                Value::I32(raw as i32)
            } else {
                Value::U32(raw)
            })
        }
        DataType::Float32 => {
            let bits = u32_from(&order_words(slice, order, data_type)?);
            Ok(Value::F32(f32::from_bits(bits)))
        }
        DataType::Float64 => {
            let bits = u64_from(&order_words(slice, order, data_type)?);
            Ok(Value::F64(f64::from_bits(bits)))
        }
        DataType::Text => {
            let bytes = words_to_bytes(slice);
            let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            let text = std::str::from_utf8(&bytes[..len])
                .map_err(|err| CodecError::InvalidText(err.to_string()))?;
            Ok(Value::Text(text.to_string()))
        }
    }
}

/// Decodes one parameter from a block of register words, applying the
/// parameter's offset, byte order, signedness override and scaling. A
/// configured scale turns numeric readings into engineering `F64` values
/// rounded to the declared precision.
pub fn decode_parameter(words: &[u16], param: &Parameter) -> Result<Value, CodecError> {
    let raw = decode(
        words,
        usize::from(param.offset),
        usize::from(param.word_count),
        param.data_type,
        param.byte_order,
        param.signed,
    )?;

    match param.scale {
        None => Ok(raw),
        Some(scale) => {
            let numeric = raw.as_f64().ok_or(CodecError::TypeMismatch {
                expected: "numeric",
                actual: raw.type_name(),
            })?;
            Ok(Value::F64(round_to(numeric * scale, param.precision)))
        }
    }
}

/// Decodes a single bit from a coil/discrete-input read. Bits carry no byte
/// order.
pub fn decode_bit(bits: &[bool], offset: usize) -> Result<Value, CodecError> {
    bits.get(offset)
        .map(|bit| Value::Bool(*bit))
        .ok_or(CodecError::InsufficientData {
            required: 1,
            offset,
            available: bits.len(),
        })
}

/// Encodes a value into register words using the data type's natural
/// signedness. See [`encode_parameter`] for the parameter-aware variant.
pub fn encode(
    value: &Value,
    data_type: DataType,
    order: ByteOrder,
    scale: Option<f64>,
) -> Result<Vec<u16>, CodecError> {
    encode_raw(value, data_type, order, scale, data_type.is_signed(), None)
}

/// Encodes a setpoint for one parameter, honouring its byte order,
/// signedness override, scale and (for text) declared word count.
pub fn encode_parameter(value: &Value, param: &Parameter) -> Result<Vec<u16>, CodecError> {
    encode_raw(
        value,
        param.data_type,
        param.byte_order,
        param.scale,
        param.effective_signed(),
        Some(usize::from(param.word_count)),
    )
}

fn encode_raw(
    value: &Value,
    data_type: DataType,
    order: ByteOrder,
    scale: Option<f64>,
    signed: bool,
    count: Option<usize>,
) -> Result<Vec<u16>, CodecError> {
    match data_type {
        DataType::Bool => {
            let Value::Bool(flag) = value else {
                return Err(CodecError::TypeMismatch {
                    expected: "bool",
                    actual: value.type_name(),
                });
            };
            order_words(&[u16::from(*flag)], order, data_type)
        }
        DataType::Int16 | DataType::Uint16 => {
            let raw = numeric_raw(value, scale, data_type)?;
            let word = if signed {
                check_range(raw, f64::from(i16::MIN), f64::from(i16::MAX), data_type, value)? as i16
                    as u16
            } else {
                check_range(raw, 0.0, f64::from(u16::MAX), data_type, value)? as u16
            };
            order_words(&[word], order, data_type)
        }
        DataType::Int32 | DataType::Uint32 => {
            let raw = numeric_raw(value, scale, data_type)?;
            let bits = if signed {
                check_range(raw, f64::from(i32::MIN), f64::from(i32::MAX), data_type, value)? as i32
                    as u32
            } else {
                check_range(raw, 0.0, f64::from(u32::MAX), data_type, value)? as u32
            };
            order_words(&u32_to_words(bits), order, data_type)
        }
        DataType::Float32 => {
            let raw = numeric_raw(value, scale, data_type)?;
            order_words(&u32_to_words((raw as f32).to_bits()), order, data_type)
        }
        DataType::Float64 => {
            let raw = numeric_raw(value, scale, data_type)?;
            order_words(&u64_to_words(raw.to_bits()), order, data_type)
        }
        DataType::Text => {
            let Value::Text(text) = value else {
                return Err(CodecError::TypeMismatch {
                    expected: "string",
                    actual: value.type_name(),
                });
            };
            let capacity = count.map(|c| c * 2).unwrap_or_else(|| text.len().max(2));
            let mut bytes = text.as_bytes().to_vec();
            bytes.truncate(capacity);
            bytes.resize(capacity + capacity % 2, 0);
            Ok(bytes_to_words(&bytes))
        }
    }
}

fn numeric_raw(value: &Value, scale: Option<f64>, target: DataType) -> Result<f64, CodecError> {
    let numeric = value.as_f64().ok_or(CodecError::TypeMismatch {
        expected: "numeric",
        actual: value.type_name(),
    })?;
    let raw = match scale {
        Some(scale) => numeric / scale,
        None => numeric,
    };
    if !raw.is_finite() {
        return Err(CodecError::ValueOutOfRange {
            value: value.to_string(),
            target: target.name(),
        });
    }
    Ok(raw)
}

fn check_range(
    raw: f64,
    min: f64,
    max: f64,
    target: DataType,
    original: &Value,
) -> Result<f64, CodecError> {
    let rounded = raw.round();
    if rounded < min || rounded > max {
        return Err(CodecError::ValueOutOfRange {
            value: original.to_string(),
            target: target.name(),
        });
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_order_transforms_are_involutions() {
        let cases: &[(&[u16], DataType)] = &[
            (&[0x1234], DataType::Uint16),
            (&[0x1234, 0x5678], DataType::Uint32),
            (&[0x1234, 0x5678, 0x9abc, 0xdef0], DataType::Float64),
        ];
        for (words, data_type) in cases {
            for order in [
                ByteOrder::Abcd,
                ByteOrder::Cdab,
                ByteOrder::Badc,
                ByteOrder::Dcba,
            ] {
                let Ok(once) = order_words(words, order, *data_type) else {
                    continue;
                };
                let twice = order_words(&once, order, *data_type).expect("second transform");
                assert_eq!(&twice, words, "{order} over {words:?}");
            }
        }
    }

    #[test]
    fn single_word_rejects_degenerate_orders() {
        assert!(matches!(
            order_words(&[0x1234], ByteOrder::Cdab, DataType::Uint16),
            Err(CodecError::InvalidByteOrder { .. })
        ));
        assert!(matches!(
            order_words(&[0x1234], ByteOrder::Dcba, DataType::Int16),
            Err(CodecError::InvalidByteOrder { .. })
        ));
    }

    #[test]
    fn float32_badc_swaps_bytes_within_words() {
        // 50.0f32 is 0x42480000 big-endian.
        let value = decode(
            &[0x4842, 0x0000],
            0,
            2,
            DataType::Float32,
            ByteOrder::Badc,
            None,
        )
        .expect("decode");
        assert_eq!(value, Value::F32(50.0));
    }

    #[test]
    fn float64_orders_permute_half_words_only() {
        let bits = 1.5f64.to_bits();
        let native = u64_to_words(bits);
        let cdab = [native[2], native[3], native[0], native[1]];
        let value = decode(&cdab, 0, 4, DataType::Float64, ByteOrder::Cdab, None).expect("decode");
        assert_eq!(value, Value::F64(1.5));
    }

    #[test]
    fn signed_override_reinterprets_word() {
        let value = decode(
            &[0xFFFE],
            0,
            1,
            DataType::Uint16,
            ByteOrder::Abcd,
            Some(true),
        )
        .expect("decode");
        assert_eq!(value, Value::I16(-2));
    }

    #[test]
    fn insufficient_words_reported_with_offset() {
        let err = decode(&[0x0001], 1, 2, DataType::Uint32, ByteOrder::Abcd, None)
            .expect_err("short read");
        assert!(matches!(err, CodecError::InsufficientData { offset: 1, .. }));
    }

    #[test]
    fn text_round_trip_pads_with_nulls() {
        let words = bytes_to_words(b"PUMP-7\0\0");
        let value = decode(&words, 0, 4, DataType::Text, ByteOrder::Abcd, None).expect("decode");
        assert_eq!(value, Value::Text("PUMP-7".to_string()));
    }
}
