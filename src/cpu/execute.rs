//! Instruction execution for the TMC0501.
//!
//! Implements the micro-operation of every instruction class. Timing (when
//! an instruction runs relative to the bus) lives in the pipeline module.

use std::fmt;
use thiserror::Error;
use crate::bcd::{alu, exchange, AluOp, AluOutput, DigitWord, Mask};
use crate::bus::{FetchAddress, KR_BIT};
use crate::cpu::config::CpuConfig;
use crate::cpu::decode::{self, Destination, OpClass, Opcode};
use crate::cpu::display::DisplayScan;
use crate::cpu::registers::{CpuFlags, Reg, Registers};

/// What the pipeline must do after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Completed,
    /// The instruction raised HOLD and must run again next instruction time.
    NeedsHold,
}

/// Notes on an instruction that ran, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("key scan pending at D{digit}")]
    KeyScanPending { digit: u8 },

    #[error("waiting for D{want}, at D{have}")]
    WaitDigit { want: u8, have: u8 },

    #[error("unimplemented instruction {0}")]
    Unimplemented(Opcode),
}

/// Result of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub control: Control,
    pub diagnostic: Option<Diagnostic>,
}

impl Outcome {
    pub const COMPLETED: Outcome = Outcome { control: Control::Completed, diagnostic: None };

    fn hold(diagnostic: Diagnostic) -> Self {
        Self { control: Control::NeedsHold, diagnostic: Some(diagnostic) }
    }

    fn note(diagnostic: Diagnostic) -> Self {
        Self { control: Control::Completed, diagnostic: Some(diagnostic) }
    }

    /// True if the instruction must run again.
    #[inline]
    pub fn needs_hold(&self) -> bool {
        self.control == Control::NeedsHold
    }
}

/// The TMC0501 processor core.
#[derive(Clone)]
pub struct Cpu {
    /// Architectural registers.
    pub regs: Registers,
    /// Internal status flags.
    pub flags: CpuFlags,
    /// Instruction cycles, counting four per instruction in idle mode.
    pub cycles: u64,
    /// IO digits sampled for late instructions.
    pub(crate) serial_in: DigitWord,
    /// Raw adder output of the last pass.
    pub(crate) serial_out: DigitWord,
    /// Latched instruction and where it came from.
    pub(crate) opcode: Opcode,
    pub(crate) addr: FetchAddress,
    /// EXT, key lines and digit time as sampled at the current call.
    pub(crate) ext: u16,
    pub(crate) key: u8,
    pub(crate) digit: u8,
    /// Remaining reset pulses.
    pub(crate) boot_pulses: u32,
    pub(crate) display: DisplayScan,
    config: CpuConfig,
}

impl Cpu {
    /// Create a CPU with the default power-on state.
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    /// Create a CPU with the given power-on state.
    pub fn with_config(config: CpuConfig) -> Self {
        let mut flags = CpuFlags::empty();
        if config.cond_at_boot {
            flags.insert(CpuFlags::COND);
        }
        Self {
            regs: config.power_on.registers(),
            flags,
            cycles: 0,
            serial_in: DigitWord::zero(),
            serial_out: DigitWord::zero(),
            opcode: Opcode::default(),
            addr: FetchAddress::default(),
            ext: 0,
            key: 0,
            digit: 0,
            boot_pulses: config.reset_pulses,
            display: DisplayScan::new(),
            config,
        }
    }

    /// Return to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::with_config(self.config);
    }

    /// The configuration the CPU was built with.
    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// The instruction latched for the next execution.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Where the latched instruction was fetched from.
    pub fn fetch_address(&self) -> FetchAddress {
        self.addr
    }

    /// True while reset pulses remain.
    pub fn is_booting(&self) -> bool {
        self.boot_pulses > 0
    }

    /// Raw adder output of the last ALU pass.
    pub fn serial_out(&self) -> &DigitWord {
        &self.serial_out
    }

    /// Execute one instruction.
    pub fn execute(&mut self, opcode: Opcode) -> Outcome {
        self.cycles += if self.flags.contains(CpuFlags::IDLE) { 4 } else { 1 };

        match opcode.class() {
            OpClass::Branch => {
                // The program store does the branching. COND is restored
                // after the last branch of a series.
                self.flags.insert(CpuFlags::JUMP);
                Outcome::COMPLETED
            }
            class => {
                if self.flags.contains(CpuFlags::JUMP) {
                    self.flags.remove(CpuFlags::JUMP);
                    self.flags.insert(CpuFlags::COND);
                }
                match class {
                    OpClass::Flag => self.flag_op(opcode),
                    OpClass::Keyboard => self.key_op(opcode),
                    OpClass::Wait => self.wait_op(opcode),
                    _ => self.alu_op(opcode),
                }
            }
        }
    }

    fn flag_op(&mut self, opcode: Opcode) -> Outcome {
        let mask: u16 = 1 << opcode.arg();
        let regs = &mut self.regs;

        match opcode.low_nibble() {
            0x0 => {
                if regs.fa & mask != 0 {
                    self.flags.remove(CpuFlags::COND);
                }
            }
            0x1 => regs.fa |= mask,
            0x2 => regs.fa &= !mask,
            0x3 => regs.fa ^= mask,
            0x4 => {
                if (regs.fa ^ regs.fb) & mask != 0 {
                    regs.fa ^= mask;
                    regs.fb ^= mask;
                }
            }
            0x5 => regs.kr |= mask,
            0x6 => regs.fa = (regs.fa & !mask) | (regs.fb & mask),
            0x7 => regs.fa = Registers::with_flag_nibble(regs.fa, regs.r5),
            0x8 => {
                if regs.fb & mask != 0 {
                    self.flags.remove(CpuFlags::COND);
                }
            }
            0x9 => regs.fb |= mask,
            0xA => regs.fb &= !mask,
            0xB => regs.fb ^= mask,
            0xC => {
                if (regs.fa ^ regs.fb) & mask == 0 {
                    self.flags.remove(CpuFlags::COND);
                }
            }
            0xD => regs.kr &= !mask,
            0xE => regs.fb = (regs.fb & !mask) | (regs.fa & mask),
            _ => regs.fb = Registers::with_flag_nibble(regs.fb, regs.r5),
        }
        Outcome::COMPLETED
    }

    fn key_op(&mut self, opcode: Opcode) -> Outcome {
        let mut hits = opcode.key_mask() & self.key;
        // Two keys at once read as none.
        if hits & hits.wrapping_sub(1) != 0 {
            hits = 0;
        }

        if opcode.is_row_test() {
            if hits != 0 {
                self.flags.remove(CpuFlags::COND);
            }
        } else if hits != 0 {
            let bit = hits.trailing_zeros() as u16;
            self.flags.remove(CpuFlags::COND);
            self.regs.kr = ((self.digit as u16) << 4) | ((bit << 8) & 0x0700);
        } else if self.digit != 0 {
            // Keep scanning until D0.
            self.flags.insert(CpuFlags::HOLD);
            return Outcome::hold(Diagnostic::KeyScanPending { digit: self.digit });
        }
        Outcome::COMPLETED
    }

    fn wait_op(&mut self, opcode: Opcode) -> Outcome {
        let regs = &mut self.regs;

        match opcode.low_nibble() {
            0x0 => {
                let want = opcode.arg() as u8;
                if self.digit != want {
                    self.flags.insert(CpuFlags::HOLD);
                    return Outcome::hold(Diagnostic::WaitDigit { want, have: self.digit });
                }
            }
            0x1 => self.flags.remove(CpuFlags::IDLE),
            0x2 => regs.fa = 0,
            0x3 => return Outcome::note(Diagnostic::Unimplemented(opcode)),
            0x4 => {
                regs.kr = regs.kr.wrapping_add(0x0010);
                if regs.kr & 0xFFF0 == 0 {
                    regs.kr ^= 0x0001;
                }
            }
            0x5 => {
                if regs.kr & (1 << opcode.arg()) != 0 {
                    self.flags.remove(CpuFlags::COND);
                }
            }
            // Other sub-selects address peripherals.
            0x6 => match opcode.sub_select() {
                0x00 => regs.r5 = Registers::flag_nibble(regs.fa),
                0x10 => regs.r5 = Registers::flag_nibble(regs.fb),
                _ => {}
            },
            0x7 => regs.r5 = opcode.arg() as u8,
            0x8 => match opcode.sub_select() {
                0x00 => regs.r5 = ((regs.kr >> 4) & 0x000F) as u8,
                0x10 => regs.kr = (regs.kr & !0x00F0) | ((regs.r5 as u16 & 0x0F) << 4),
                _ => {}
            },
            0x9 => self.flags.insert(CpuFlags::IDLE),
            0xA => regs.fb = 0,
            0xB => {
                if self.key & (1 << KR_BIT) != 0 || self.flags.contains(CpuFlags::BUSY) {
                    self.flags.remove(CpuFlags::COND | CpuFlags::BUSY);
                }
            }
            0xC => regs.kr = ((self.ext << 1) & 0xFFF0) | (self.ext >> 15),
            0xD => std::mem::swap(&mut regs.kr, &mut regs.sr),
            // 0xE and 0xF belong to the peripherals.
            _ => {}
        }
        Outcome::COMPLETED
    }

    fn alu_op(&mut self, opcode: Opcode) -> Outcome {
        let instr = decode::resolve(opcode);
        let mask = instr.mask;
        if instr.dest == Destination::Io {
            self.flags.insert(CpuFlags::IO_VALID);
        }
        let serial_in = if self.flags.contains(CpuFlags::IO_VALID) {
            None
        } else {
            Some(self.serial_in)
        };

        let mut outcome = Outcome::COMPLETED;
        if instr.r5_to_adder {
            match instr.dest.register() {
                Some(reg) => self.r5_to_adder(opcode, reg, &mask, serial_in),
                None => outcome = Outcome::note(Diagnostic::Unimplemented(opcode)),
            }
        } else {
            let operands = instr.operands;
            let x = operands.x.map(|r| *self.regs.reg(r));
            let y = operands.y.map(|r| *self.regs.reg(r));
            let out = match instr.dest.register() {
                Some(reg) => alu(operands.op, Some(self.regs.reg_mut(reg)), x, y, serial_in.as_ref(), &mask),
                None => alu(operands.op, None, x, y, serial_in.as_ref(), &mask),
            };
            self.latch_alu(out);
        }

        if let Destination::Exchange(a, b) = instr.dest {
            let mut first = *self.regs.reg(a);
            let mut second = *self.regs.reg(b);
            exchange(&mut first, &mut second, &mask);
            *self.regs.reg_mut(a) = first;
            *self.regs.reg_mut(b) = second;
        }

        log::trace!(
            "{} {}.{} -> {}",
            opcode,
            instr.operands.op.mnemonic(),
            crate::bcd::mask::mask_name(opcode.mask_index()),
            match instr.dest.register() {
                Some(reg) => self.regs.reg(reg).to_string(),
                None => format!("IO {}", self.serial_out),
            }
        );
        outcome
    }

    /// Load R5 into the start of the window and run a correcting pass.
    fn r5_to_adder(&mut self, opcode: Opcode, reg: Reg, mask: &Mask, serial_in: Option<DigitWord>) {
        let Some(window) = mask.window() else {
            return;
        };
        let r5 = self.regs.r5;
        let dst = self.regs.reg_mut(reg);
        for i in window.skip(1) {
            dst.set(i, 0);
        }
        dst.set(mask.cpos as usize, mask.cval);
        dst.set(mask.start as usize, r5);

        let y = *dst;
        let op = if opcode.is_r5_subtract() { AluOp::Sub } else { AluOp::Add };
        let out = alu(op, Some(dst), None, Some(y), serial_in.as_ref(), mask);
        self.latch_alu(out);
    }

    fn latch_alu(&mut self, out: AluOutput) {
        self.serial_out = out.serial_out;
        if let Some(r5) = out.r5 {
            self.regs.r5 = r5;
        }
        if out.clears_cond {
            self.flags.remove(CpuFlags::COND);
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("opcode", &self.opcode)
            .field("addr", &self.addr)
            .field("flags", &self.flags)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}
