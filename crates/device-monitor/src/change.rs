use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use types::{ParamReading, ReadingSnapshot, Value};

/// Fired after a poll whose snapshot differs from its predecessor. Delivery
/// is best-effort, at most once per poll cycle, with no replay.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub device_id: String,
    pub changed: Vec<String>,
    pub snapshot: Arc<ReadingSnapshot>,
}

/// Epsilon for comparing two readings of one parameter: half a unit in the
/// last declared decimal place. Unscaled floats get a tight tolerance to
/// absorb representation noise; everything else compares exactly.
pub fn epsilon_for(precision: Option<u8>, value: &Value) -> f64 {
    match precision {
        Some(p) => 0.5 * 10f64.powi(-i32::from(p)),
        None => match value {
            Value::F32(_) | Value::F64(_) => 1e-9,
            _ => 0.0,
        },
    }
}

/// Pure comparison of two snapshots, returning the names of parameters whose
/// value moved beyond their epsilon. Parameters appearing or disappearing
/// between snapshots count as changes.
pub fn detect_changes(previous: &ReadingSnapshot, current: &ReadingSnapshot) -> Vec<String> {
    let mut changed = Vec::new();
    let before: HashMap<&str, &ParamReading> = previous
        .readings
        .iter()
        .map(|reading| (reading.name.as_str(), reading))
        .collect();

    for reading in &current.readings {
        match before.get(reading.name.as_str()) {
            None => changed.push(reading.name.clone()),
            Some(old) => {
                if reading_changed(old, reading) {
                    changed.push(reading.name.clone());
                }
            }
        }
    }

    let now: HashSet<&str> = current
        .readings
        .iter()
        .map(|reading| reading.name.as_str())
        .collect();
    for reading in &previous.readings {
        if !now.contains(reading.name.as_str()) {
            changed.push(reading.name.clone());
        }
    }

    changed
}

fn reading_changed(previous: &ParamReading, current: &ParamReading) -> bool {
    match (&previous.value, &current.value) {
        (Some(old), Some(new)) => !old.approx_eq(new, epsilon_for(current.precision, new)),
        // A value stayed absent: the error text may differ, the value did not.
        (None, None) => false,
        _ => true,
    }
}
