#![allow(dead_code)]

//! Per-device polling, caching and change detection. Each scheduled device
//! runs its own task; devices share nothing but their registry entry, and a
//! busy device is skipped rather than queued.

pub mod change;
pub mod error;
pub mod registry;

pub use change::{detect_changes, epsilon_for, ChangeEvent};
pub use error::MonitorError;
pub use registry::{
    probe_connection, CoilBatchReport, CoilWriteReport, DeviceHealth, DeviceRecord,
    MonitorRegistry, PollKind, PollOutcome, ProbeResult, WriteReport,
};
