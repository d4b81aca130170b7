//! Bus interface of the processor.
//!
//! An instruction is latched from IRG at S15 read and executed during the
//! following instruction time, either at S0 write (early) or at S15 read
//! just before the next latch (late), see [`Opcode::runs_early`]. The rest
//! of the instruction time is spent driving EXT:
//!
//! | state    | action                                       |
//! |----------|----------------------------------------------|
//! | S0 write | early execution, KR onto EXT, display digit   |
//! | S1 write | COND of the previous instruction onto EXT     |
//! | S2 write | HOLD onto EXT                                 |
//! | S2 read  | drop the PREG request unless the bus is held  |
//! | S14 write| blank the display                             |
//! | S15 read | late execution, latch the next instruction    |

use std::any::Any;
use crate::bcd::DigitWord;
use crate::bus::{Bus, Chip, DisplayOut, FetchAddress, Phase, Stop, EXT_COND, EXT_HOLD, EXT_PREG};
use crate::cpu::decode::Opcode;
use crate::cpu::execute::Cpu;
use crate::cpu::registers::CpuFlags;

impl Cpu {
    /// Reset sequence: drive PREG (address 0) on every pulse but the last,
    /// which latches the first instruction.
    fn boot(&mut self, bus: &mut Bus) -> Result<(), Stop> {
        if bus.at(0, Phase::Write) {
            let pulses = self.boot_pulses;
            self.boot_pulses -= 1;
            if pulses > 1 {
                bus.drive_ext(EXT_PREG);
            }
        } else if bus.at(15, Phase::Read) && self.boot_pulses == 1 {
            self.latch(bus)?;
        }
        Ok(())
    }

    fn latch(&mut self, bus: &Bus) -> Result<(), Stop> {
        self.opcode = Opcode(bus.irg);
        self.addr = bus.addr;
        if self.addr == FetchAddress::End {
            return Err(Stop::EndOfProgram);
        }
        Ok(())
    }

    fn run(&mut self, opcode: Opcode) {
        let outcome = self.execute(opcode);
        if let Some(diagnostic) = outcome.diagnostic {
            log::debug!("{} {}: {}", self.addr, opcode, diagnostic);
        }
    }

    fn trace_instruction(&self) {
        if log::log_enabled!(log::Level::Trace) {
            let flag = |f: CpuFlags, c: char| if self.flags.contains(f) { c } else { '-' };
            log::trace!(
                "{}:{}{}{}.D{:02}\t{}",
                self.addr,
                flag(CpuFlags::COND, 'C'),
                flag(CpuFlags::IDLE, 'I'),
                flag(CpuFlags::HOLD, 'H'),
                self.digit,
                self.opcode
            );
            log::trace!("{:?}", self.regs);
        }
    }

    fn start_instruction(&mut self, bus: &mut Bus) {
        self.trace_instruction();
        self.flags.remove(CpuFlags::HOLD);
        self.serial_in = DigitWord::zero();
        self.serial_out = DigitWord::zero();
        if self.flags.contains(CpuFlags::COND) {
            self.flags.insert(CpuFlags::COND_LAST);
        }

        let idle = self.flags.contains(CpuFlags::IDLE);
        self.display.generate(&self.regs, idle, self.digit, &mut bus.display);

        if self.opcode.runs_early() {
            self.run(self.opcode);
            if self.flags.contains(CpuFlags::IO_VALID) {
                bus.drive_io(self.serial_out);
                self.flags.remove(CpuFlags::IO_VALID);
            }
        }

        // KR goes out shifted so its bits 4-15 land on the EXT payload.
        if self.opcode != Opcode::LOAD_KR_FROM_EXT {
            bus.drive_ext(self.regs.kr.rotate_right(1) & 0xFFF9);
        }
    }
}

impl Chip for Cpu {
    fn name(&self) -> &str {
        "tmc0501"
    }

    fn process(&mut self, bus: &mut Bus) -> Result<(), Stop> {
        self.digit = bus.dstate;
        self.ext = bus.ext;
        self.key = bus.key_line;

        if self.boot_pulses > 0 {
            return self.boot(bus);
        }

        match (bus.sstate, bus.phase) {
            (0, Phase::Write) => self.start_instruction(bus),
            (1, Phase::Write) => {
                if self.flags.contains(CpuFlags::COND_LAST) {
                    bus.drive_ext(EXT_COND);
                    self.flags.remove(CpuFlags::COND_LAST);
                }
            }
            (2, Phase::Write) => {
                if self.flags.contains(CpuFlags::HOLD) {
                    bus.drive_ext(EXT_HOLD);
                }
            }
            (2, Phase::Read) => {
                if bus.ext & EXT_HOLD == 0 {
                    self.regs.kr &= !0x0002;
                }
            }
            (14, Phase::Write) => bus.display = DisplayOut::BLANK,
            (15, Phase::Read) => {
                if !self.opcode.runs_early() {
                    self.serial_in = bus.io;
                    self.run(self.opcode);
                }
                self.latch(bus)?;
            }
            _ => {}
        }

        bus.idle = self.flags.contains(CpuFlags::IDLE);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
