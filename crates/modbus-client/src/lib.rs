#![allow(dead_code)]

//! Connection life cycle and register operations for field devices reachable
//! over a stream socket (Modbus TCP) or a serial line (Modbus RTU). The wire
//! protocol itself comes from `tokio-modbus`; this crate owns orchestration:
//! timeouts, retries, validation and guaranteed release of the transport.

pub mod config;
pub mod connection;
pub mod error;
pub mod operations;

pub use config::{ConnectionConfig, DataBits, Parity, StopBits, TransportConfig};
pub use connection::{ConnState, ConnectionHandle, ConnectionManager};
pub use error::LinkError;
pub use operations::{
    decode_block, CoilWrite, RegisterOps, MAX_READ_BITS, MAX_READ_REGISTERS, MAX_WRITE_COILS,
    MAX_WRITE_REGISTERS,
};
