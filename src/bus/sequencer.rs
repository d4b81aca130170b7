//! Digit and serial state sequencing.
//!
//! One digit time runs S0..S15; every serial state calls each chip in
//! attachment order for the write phase, then again for the read phase.
//! Digit times count down from D15 to D0 and wrap.

use thiserror::Error;
use crate::bus::{Bus, BusFields, Chip, Phase, Stop};

/// Bus ownership violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("{field} driven by both {first} and {second} at D{dstate} S{sstate}")]
    Contention {
        field: BusFields,
        first: String,
        second: String,
        dstate: u8,
        sstate: u8,
    },

    #[error("{chip} changed {field} during the read phase at D{dstate} S{sstate}")]
    ReadPhaseWrite {
        chip: String,
        field: BusFields,
        dstate: u8,
        sstate: u8,
    },
}

/// Fields no chip may change while the others sample them.
const READ_ONLY: BusFields = BusFields::IRG
    .union(BusFields::IO)
    .union(BusFields::EXT)
    .union(BusFields::KEY_LINE)
    .union(BusFields::ADDR);

/// Which chip first drove each field during the current phase.
#[derive(Default)]
struct Drivers(Vec<(BusFields, usize)>);

impl Drivers {
    fn owner(&self, field: BusFields) -> Option<usize> {
        self.0.iter().find(|(f, _)| *f == field).map(|(_, index)| *index)
    }

    fn claim(&mut self, field: BusFields, index: usize) {
        self.0.push((field, index));
    }
}

/// Runs the bus and the chips attached to it.
pub struct Sequencer {
    chips: Vec<Box<dyn Chip>>,
    bus: Bus,
    next_dstate: u8,
    digit_cycles: u64,
    ownership_checks: bool,
}

impl Sequencer {
    /// An empty bus starting at D15 with ownership checks on.
    pub fn new() -> Self {
        Self {
            chips: Vec::new(),
            bus: Bus::new(),
            next_dstate: 15,
            digit_cycles: 0,
            ownership_checks: true,
        }
    }

    /// Enable or disable the per-phase field ownership audit.
    pub fn with_ownership_checks(mut self, enabled: bool) -> Self {
        self.ownership_checks = enabled;
        self
    }

    /// Attach a chip. Chips are called in attachment order.
    pub fn attach<C: Chip + 'static>(&mut self, chip: C) -> usize {
        self.chips.push(Box::new(chip));
        self.chips.len() - 1
    }

    /// The first attached chip of type `T`.
    pub fn chip<T: 'static>(&self) -> Option<&T> {
        self.chips.iter().find_map(|chip| chip.as_any().downcast_ref::<T>())
    }

    /// The first attached chip of type `T`, mutably.
    pub fn chip_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.chips.iter_mut().find_map(|chip| chip.as_any_mut().downcast_mut::<T>())
    }

    /// The chip attached at `index`.
    pub fn chip_at(&self, index: usize) -> Option<&dyn Chip> {
        self.chips.get(index).map(|chip| chip.as_ref())
    }

    /// The bus as the last phase left it.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Mutable access between digit times, e.g. to press keys.
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Digit times run so far.
    pub fn digit_cycles(&self) -> u64 {
        self.digit_cycles
    }

    /// Run one digit time.
    pub fn step_digit(&mut self) -> Result<Option<Stop>, BusError> {
        let dstate = self.next_dstate;
        self.bus.start_digit(dstate);
        self.next_dstate = if dstate == 0 { 15 } else { dstate - 1 };
        self.digit_cycles += 1;

        for sstate in 0..16 {
            self.bus.sstate = sstate;
            for phase in [Phase::Write, Phase::Read] {
                self.bus.phase = phase;
                if let Some(stop) = self.run_phase()? {
                    return Ok(Some(stop));
                }
            }
        }
        Ok(None)
    }

    /// Run until a chip stops the bus.
    pub fn run(&mut self) -> Result<Stop, BusError> {
        loop {
            if let Some(stop) = self.step_digit()? {
                self.log_stop(stop);
                return Ok(stop);
            }
        }
    }

    /// Run at most `max_digits` digit times.
    pub fn run_limited(&mut self, max_digits: u64) -> Result<Option<Stop>, BusError> {
        for _ in 0..max_digits {
            if let Some(stop) = self.step_digit()? {
                self.log_stop(stop);
                return Ok(Some(stop));
            }
        }
        Ok(None)
    }

    fn log_stop(&self, stop: Stop) {
        log::info!(
            "bus stopped at D{} S{} after {} digit cycles: {}",
            self.bus.dstate,
            self.bus.sstate,
            self.digit_cycles,
            stop
        );
    }

    fn run_phase(&mut self) -> Result<Option<Stop>, BusError> {
        let mut drivers = Drivers::default();

        for index in 0..self.chips.len() {
            self.bus.clear_driven();
            let before = self.ownership_checks.then(|| self.bus.clone());
            let result = self.chips[index].process(&mut self.bus);
            if let Some(before) = before {
                self.audit(&before, index, &mut drivers)?;
            }
            if let Err(stop) = result {
                return Ok(Some(stop));
            }
        }
        Ok(None)
    }

    fn audit(&self, before: &Bus, index: usize, drivers: &mut Drivers) -> Result<(), BusError> {
        // Diffing catches plain field writes; the marks catch a driver
        // that puts the value already on the bus.
        let changed = before.changed_fields(&self.bus) | self.bus.driven();
        let (dstate, sstate) = (self.bus.dstate, self.bus.sstate);

        if self.bus.phase == Phase::Read {
            let illegal = changed & READ_ONLY;
            if let Some(field) = illegal.iter().next() {
                return Err(BusError::ReadPhaseWrite {
                    chip: self.chips[index].name().to_string(),
                    field,
                    dstate,
                    sstate,
                });
            }
            return Ok(());
        }

        for field in changed.iter() {
            let Some(first) = drivers.owner(field) else {
                drivers.claim(field, index);
                continue;
            };
            // EXT is wired-OR: later drivers may only add bits.
            if field == BusFields::EXT && self.bus.ext & before.ext == before.ext {
                continue;
            }
            return Err(BusError::Contention {
                field,
                first: self.chips[first].name().to_string(),
                second: self.chips[index].name().to_string(),
                dstate,
                sstate,
            });
        }
        Ok(())
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bcd::DigitWord;
    use std::any::Any;

    /// Records every call and optionally misbehaves.
    #[derive(Default)]
    struct Stub {
        name: &'static str,
        calls: Vec<(u8, u8, Phase)>,
        action: Option<fn(&mut Bus) -> Result<(), Stop>>,
    }

    impl Stub {
        fn new(name: &'static str) -> Self {
            Self { name, ..Self::default() }
        }

        fn acting(name: &'static str, action: fn(&mut Bus) -> Result<(), Stop>) -> Self {
            Self { name, action: Some(action), ..Self::default() }
        }
    }

    impl Chip for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn process(&mut self, bus: &mut Bus) -> Result<(), Stop> {
            self.calls.push((bus.dstate, bus.sstate, bus.phase));
            match self.action {
                Some(action) => action(bus),
                None => Ok(()),
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_phase_order() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::new("stub"));
        assert_eq!(seq.step_digit(), Ok(None));

        let calls = &seq.chip::<Stub>().unwrap().calls;
        assert_eq!(calls.len(), 32);
        assert_eq!(calls[0], (15, 0, Phase::Write));
        assert_eq!(calls[1], (15, 0, Phase::Read));
        assert_eq!(calls[31], (15, 15, Phase::Read));
    }

    #[test]
    fn test_digit_times_count_down_and_wrap() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::new("stub"));
        assert_eq!(seq.run_limited(17), Ok(None));
        assert_eq!(seq.digit_cycles(), 17);

        let digits: Vec<u8> = seq.chip::<Stub>().unwrap().calls.iter()
            .step_by(32)
            .map(|(d, _, _)| *d)
            .collect();
        let expected: Vec<u8> = (0..16).rev().chain([15]).collect();
        assert_eq!(digits, expected);
    }

    #[test]
    fn test_lines_cleared_each_digit() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::acting("driver", |bus| {
            if bus.dstate == 15 && bus.at(4, Phase::Write) {
                bus.irg = 0x0123;
                bus.ext |= 0x0010;
            }
            Ok(())
        }));
        seq.step_digit().unwrap();
        assert_eq!(seq.bus().irg, 0x0123);
        seq.step_digit().unwrap();
        assert_eq!(seq.bus().dstate, 14);
        assert_eq!(seq.bus().irg, 0);
        assert_eq!(seq.bus().ext, 0);
    }

    #[test]
    fn test_stop_propagates() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::acting("faulty", |bus| {
            if bus.dstate == 13 && bus.at(7, Phase::Read) {
                return Err(Stop::Fault(7));
            }
            Ok(())
        }));
        seq.attach(Stub::new("after"));
        assert_eq!(seq.run(), Ok(Stop::Fault(7)));
        assert_eq!(seq.digit_cycles(), 3);
        let faulty = seq.chip::<Stub>().unwrap();
        assert_eq!(faulty.calls.last(), Some(&(13, 7, Phase::Read)));
        // The chip after the faulting one never saw that phase.
        let after = seq.chip_at(1).unwrap().as_any().downcast_ref::<Stub>().unwrap();
        assert_eq!(after.name, "after");
        assert_eq!(after.calls.last(), Some(&(13, 7, Phase::Write)));
    }

    #[test]
    fn test_read_phase_write_detected() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::acting("meddler", |bus| {
            if bus.at(3, Phase::Read) {
                bus.io.set(0, 1);
            }
            Ok(())
        }));
        assert_eq!(
            seq.step_digit(),
            Err(BusError::ReadPhaseWrite {
                chip: "meddler".to_string(),
                field: BusFields::IO,
                dstate: 15,
                sstate: 3,
            })
        );
    }

    #[test]
    fn test_checks_can_be_disabled() {
        let mut seq = Sequencer::new().with_ownership_checks(false);
        seq.attach(Stub::acting("meddler", |bus| {
            if bus.at(3, Phase::Read) {
                bus.io.set(0, 1);
            }
            Ok(())
        }));
        assert_eq!(seq.run_limited(2), Ok(None));
    }

    #[test]
    fn test_display_and_idle_exempt_in_read_phase() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::acting("display", |bus| {
            if !bus.is_write() {
                bus.idle = !bus.idle;
                bus.display.dpt = !bus.display.dpt;
            }
            Ok(())
        }));
        assert_eq!(seq.step_digit(), Ok(None));
    }

    #[test]
    fn test_ext_is_wired_or() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::acting("first", |bus| {
            if bus.at(0, Phase::Write) {
                bus.ext = 0x0009;
            }
            Ok(())
        }));
        seq.attach(Stub::acting("second", |bus| {
            if bus.at(0, Phase::Write) {
                bus.ext |= 0x0002;
            }
            Ok(())
        }));
        assert_eq!(seq.step_digit(), Ok(None));
        assert_eq!(seq.bus().ext, 0x000B);

        let mut seq = Sequencer::new();
        seq.attach(Stub::acting("first", |bus| {
            if bus.at(0, Phase::Write) {
                bus.ext = 0x0009;
            }
            Ok(())
        }));
        seq.attach(Stub::acting("second", |bus| {
            if bus.at(0, Phase::Write) {
                bus.ext = 0x0002;
            }
            Ok(())
        }));
        assert!(matches!(
            seq.step_digit(),
            Err(BusError::Contention { field, .. }) if field == BusFields::EXT
        ));
    }

    #[test]
    fn test_same_value_driver_is_contention() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::acting("rom0", |bus| {
            if bus.at(4, Phase::Write) {
                bus.drive_irg(0x0000);
            }
            Ok(())
        }));
        seq.attach(Stub::acting("rom1", |bus| {
            if bus.at(4, Phase::Write) {
                bus.drive_irg(0x0123);
            }
            Ok(())
        }));
        assert_eq!(
            seq.step_digit(),
            Err(BusError::Contention {
                field: BusFields::IRG,
                first: "rom0".to_string(),
                second: "rom1".to_string(),
                dstate: 15,
                sstate: 4,
            })
        );
        assert_eq!(seq.bus().irg, 0x0123);
    }

    #[test]
    fn test_zero_io_driven_twice_is_contention() {
        let mut seq = Sequencer::new();
        for name in ["alu", "ram"] {
            seq.attach(Stub::acting(name, |bus| {
                if bus.at(6, Phase::Write) {
                    bus.drive_io(DigitWord::zero());
                }
                Ok(())
            }));
        }
        assert!(matches!(
            seq.step_digit(),
            Err(BusError::Contention { field, sstate: 6, .. }) if field == BusFields::IO
        ));
    }

    #[test]
    fn test_marked_drive_in_read_phase_detected() {
        let mut seq = Sequencer::new();
        seq.attach(Stub::acting("late", |bus| {
            if bus.at(9, Phase::Read) {
                bus.drive_ext(0);
            }
            Ok(())
        }));
        assert!(matches!(
            seq.step_digit(),
            Err(BusError::ReadPhaseWrite { field, sstate: 9, .. }) if field == BusFields::EXT
        ));
    }

    #[test]
    fn test_wired_or_ext_accepts_empty_drives() {
        let mut seq = Sequencer::new();
        for name in ["cpu", "printer"] {
            seq.attach(Stub::acting(name, |bus| {
                if bus.at(0, Phase::Write) {
                    bus.drive_ext(0);
                }
                Ok(())
            }));
        }
        assert_eq!(seq.step_digit(), Ok(None));
    }

    #[test]
    fn test_chip_lookup() {
        let mut seq = Sequencer::new();
        assert!(seq.chip::<Stub>().is_none());
        assert_eq!(seq.attach(Stub::new("a")), 0);
        assert_eq!(seq.attach(Stub::new("b")), 1);
        assert_eq!(seq.chip::<Stub>().unwrap().name, "a");
        assert_eq!(seq.chip_at(1).map(|chip| chip.name()), Some("b"));
        assert!(seq.chip_at(2).is_none());
    }
}
