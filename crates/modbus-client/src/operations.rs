use std::cmp::min;
use std::io;
use std::time::Duration;

use tokio::time::{error::Elapsed, sleep, timeout};
use tokio_modbus::prelude::{Reader, Writer};
use tracing::{debug, warn};

use register_codec as codec;
use types::{ParamReading, Parameter, RawBlock, RegisterKind, RegisterRange, Value};

use crate::config::ConnectionConfig;
use crate::connection::ConnectionHandle;
use crate::error::LinkError;

/// Protocol ceilings per request (function codes 1-4, 15, 16).
pub const MAX_READ_REGISTERS: u16 = 125;
pub const MAX_READ_BITS: u16 = 2_000;
pub const MAX_WRITE_REGISTERS: u16 = 123;
pub const MAX_WRITE_COILS: u16 = 1_968;

/// Outcome of one element in a coil batch write. The transport call is
/// all-or-nothing; reporting per element lets the caller tell "the whole
/// batch was rejected" apart from "applied".
#[derive(Debug, Clone, PartialEq)]
pub struct CoilWrite {
    pub address: u16,
    pub value: bool,
    pub error: Option<String>,
}

/// Register and coil operations over a live [`ConnectionHandle`]. Carries
/// the device's timeout and batching policy; validation happens before any
/// wire call.
#[derive(Debug, Clone)]
pub struct RegisterOps {
    timeout: Duration,
    timeout_ms: u64,
    max_batch: Option<u16>,
    inter_read_delay: Option<Duration>,
}

impl RegisterOps {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            timeout_ms,
            max_batch: None,
            inter_read_delay: None,
        }
    }

    pub fn for_config(config: &ConnectionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            timeout_ms: config.timeout_ms,
            max_batch: config.max_batch_size,
            inter_read_delay: config.inter_read_delay_ms.map(Duration::from_millis),
        }
    }

    /// Reads the whole range with the function code its kind selects,
    /// splitting into protocol- and device-sized chunks. Returns raw
    /// words/bits; decoding is the caller's business.
    pub async fn read_range(
        &self,
        handle: &mut ConnectionHandle,
        range: &RegisterRange,
    ) -> Result<RawBlock, LinkError> {
        range.validate().map_err(LinkError::Validation)?;
        if range.kind.is_bit() {
            self.read_bits(handle, range).await.map(RawBlock::Bits)
        } else {
            self.read_words(handle, range)
                .await
                .map(RawBlock::Registers)
        }
    }

    async fn read_words(
        &self,
        handle: &mut ConnectionHandle,
        range: &RegisterRange,
    ) -> Result<Vec<u16>, LinkError> {
        let batch = self
            .max_batch
            .unwrap_or(MAX_READ_REGISTERS)
            .clamp(1, MAX_READ_REGISTERS);
        let mut out = Vec::with_capacity(usize::from(range.count));
        let mut offset = 0u16;
        let mut remaining = range.count;

        while remaining > 0 {
            let chunk = min(remaining, batch);
            let chunk_start = chunk_address(range.start, offset)?;
            let result = match range.kind {
                RegisterKind::Holding => {
                    timeout(
                        self.timeout,
                        handle.context().read_holding_registers(chunk_start, chunk),
                    )
                    .await
                }
                _ => {
                    timeout(
                        self.timeout,
                        handle.context().read_input_registers(chunk_start, chunk),
                    )
                    .await
                }
            };
            let words = self.settle(handle, result)?;
            debug!(
                fc = range.kind.function_code(),
                start = chunk_start,
                count = chunk,
                "range chunk read"
            );
            out.extend(words);
            remaining -= chunk;
            offset += chunk;

            if remaining > 0 {
                if let Some(delay) = self.inter_read_delay {
                    sleep(delay).await;
                }
            }
        }

        Ok(out)
    }

    async fn read_bits(
        &self,
        handle: &mut ConnectionHandle,
        range: &RegisterRange,
    ) -> Result<Vec<bool>, LinkError> {
        let batch = self
            .max_batch
            .unwrap_or(MAX_READ_BITS)
            .clamp(1, MAX_READ_BITS);
        let mut out = Vec::with_capacity(usize::from(range.count));
        let mut offset = 0u16;
        let mut remaining = range.count;

        while remaining > 0 {
            let chunk = min(remaining, batch);
            let chunk_start = chunk_address(range.start, offset)?;
            let result = match range.kind {
                RegisterKind::Coil => {
                    timeout(self.timeout, handle.context().read_coils(chunk_start, chunk)).await
                }
                _ => {
                    timeout(
                        self.timeout,
                        handle.context().read_discrete_inputs(chunk_start, chunk),
                    )
                    .await
                }
            };
            let bits = self.settle(handle, result)?;
            // The transport pads the trailing byte; trim to what was asked.
            out.extend(bits.into_iter().take(usize::from(chunk)));
            remaining -= chunk;
            offset += chunk;

            if remaining > 0 {
                if let Some(delay) = self.inter_read_delay {
                    sleep(delay).await;
                }
            }
        }

        Ok(out)
    }

    /// `read_range` composed with per-parameter decoding. One bad parameter
    /// definition must not blank out the rest of a valid read, so decode
    /// failures land in the reading's `error` field.
    pub async fn read_parameters(
        &self,
        handle: &mut ConnectionHandle,
        range: &RegisterRange,
        parameters: &[Parameter],
    ) -> Result<Vec<ParamReading>, LinkError> {
        let block = self.read_range(handle, range).await?;
        Ok(decode_block(&block, range, parameters))
    }

    pub async fn write_coil(
        &self,
        handle: &mut ConnectionHandle,
        address: u16,
        value: bool,
    ) -> Result<(), LinkError> {
        let result = timeout(
            self.timeout,
            handle.context().write_single_coil(address, value),
        )
        .await;
        self.settle(handle, result)
    }

    /// Batch coil write. Validation failures fail fast without touching the
    /// transport; otherwise every element's outcome is reported, all of them
    /// carrying the same error when the transport rejects the whole batch.
    pub async fn write_coils(
        &self,
        handle: &mut ConnectionHandle,
        address: u16,
        values: &[bool],
    ) -> Result<Vec<CoilWrite>, LinkError> {
        if values.is_empty() {
            return Err(LinkError::Validation("coil batch must not be empty".into()));
        }
        if values.len() > usize::from(MAX_WRITE_COILS) {
            return Err(LinkError::Validation(format!(
                "coil batch of {} exceeds the protocol limit of {MAX_WRITE_COILS}",
                values.len()
            )));
        }
        if u32::from(address) + values.len() as u32 > 0x1_0000 {
            return Err(LinkError::Validation(format!(
                "coil batch at {address} overflows the address space"
            )));
        }

        let result = timeout(
            self.timeout,
            handle.context().write_multiple_coils(address, values),
        )
        .await;
        let outcome = self.settle(handle, result);

        let error = match &outcome {
            Ok(()) => None,
            Err(err) => {
                warn!(address, count = values.len(), error = %err, "coil batch rejected");
                Some(err.to_string())
            }
        };
        Ok(values
            .iter()
            .enumerate()
            .map(|(i, value)| CoilWrite {
                address: address.wrapping_add(i as u16),
                value: *value,
                error: error.clone(),
            })
            .collect())
    }

    /// Encodes a setpoint and writes it as a holding-register write at the
    /// parameter's position within the range.
    pub async fn write_parameter(
        &self,
        handle: &mut ConnectionHandle,
        range: &RegisterRange,
        parameter: &Parameter,
        value: &Value,
    ) -> Result<(), LinkError> {
        if range.kind != RegisterKind::Holding {
            return Err(LinkError::Validation(format!(
                "parameter {} lives in a read-only {} range",
                parameter.name, range.kind
            )));
        }
        parameter.validate().map_err(LinkError::Validation)?;
        let span = u32::from(parameter.offset) + u32::from(parameter.word_count);
        if span > u32::from(range.count) {
            return Err(LinkError::Validation(format!(
                "parameter {} does not fit its range",
                parameter.name
            )));
        }

        let words = codec::encode_parameter(value, parameter)?;
        if words.len() > usize::from(MAX_WRITE_REGISTERS) {
            return Err(LinkError::Validation(format!(
                "parameter {} spans {} registers, write limit is {MAX_WRITE_REGISTERS}",
                parameter.name,
                words.len()
            )));
        }
        let address = chunk_address(range.start, parameter.offset)?;

        let result = if words.len() == 1 {
            timeout(
                self.timeout,
                handle.context().write_single_register(address, words[0]),
            )
            .await
        } else {
            timeout(
                self.timeout,
                handle.context().write_multiple_registers(address, &words),
            )
            .await
        };
        self.settle(handle, result)
    }

    /// Folds the two failure layers (deadline, transport) into `LinkError`
    /// and records the outcome on the handle's liveness flag.
    fn settle<T>(
        &self,
        handle: &mut ConnectionHandle,
        result: Result<Result<T, io::Error>, Elapsed>,
    ) -> Result<T, LinkError> {
        match result {
            Ok(Ok(value)) => {
                handle.mark_io(true);
                Ok(value)
            }
            Ok(Err(err)) => {
                handle.mark_io(false);
                Err(LinkError::from_io(err, self.timeout_ms))
            }
            Err(_) => {
                handle.mark_io(false);
                Err(LinkError::Timeout {
                    timeout_ms: self.timeout_ms,
                })
            }
        }
    }
}

/// Decodes every parameter against one raw block, capturing per-parameter
/// failures instead of aborting the batch.
pub fn decode_block(
    block: &RawBlock,
    range: &RegisterRange,
    parameters: &[Parameter],
) -> Vec<ParamReading> {
    parameters
        .iter()
        .map(|param| {
            let decoded = match block {
                RawBlock::Registers(words) => codec::decode_parameter(words, param),
                RawBlock::Bits(bits) => {
                    if param.data_type == types::DataType::Bool {
                        codec::decode_bit(bits, usize::from(param.offset))
                    } else {
                        return ParamReading::failed(
                            param,
                            format!(
                                "{} parameters cannot be decoded from a {} range",
                                param.data_type, range.kind
                            ),
                        );
                    }
                }
            };
            match decoded {
                Ok(value) => ParamReading::ok(param, value),
                Err(err) => {
                    warn!(parameter = %param.name, error = %err, "parameter decode failed");
                    ParamReading::failed(param, err.to_string())
                }
            }
        })
        .collect()
}

fn chunk_address(start: u16, offset: u16) -> Result<u16, LinkError> {
    u16::try_from(u32::from(start) + u32::from(offset)).map_err(|_| {
        LinkError::Validation(format!("address {start}+{offset} overflows the address space"))
    })
}
