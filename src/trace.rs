//! Bus snapshot recorder.
//!
//! Attach a [`BusTrace`] after the chips to observe; it records the bus as
//! they left it. Two runs of the same image produce identical traces.

use std::any::Any;
use crate::bus::{Bus, Chip, Phase, Stop};

/// A chip that only records.
#[derive(Debug, Clone, Default)]
pub struct BusTrace {
    every_phase: bool,
    records: Vec<Bus>,
}

impl BusTrace {
    /// Record once per digit time, at S15 read.
    pub fn per_digit() -> Self {
        Self::default()
    }

    /// Record after every phase of every serial state.
    pub fn every_phase() -> Self {
        Self {
            every_phase: true,
            records: Vec::new(),
        }
    }

    /// Snapshots in the order they were taken.
    pub fn records(&self) -> &[Bus] {
        &self.records
    }

    /// Drop all recorded snapshots.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// One JSON object per record, newline separated.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for bus in &self.records {
            out.push_str(&serde_json::to_string(bus)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl Chip for BusTrace {
    fn name(&self) -> &str {
        "trace"
    }

    fn process(&mut self, bus: &mut Bus) -> Result<(), Stop> {
        if self.every_phase || bus.at(15, Phase::Read) {
            self.records.push(bus.clone());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
