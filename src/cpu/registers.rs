//! Processor registers.
//!
//! The core holds:
//! - A, B, C, D, E: 16-digit data registers shifted through the adder
//! - fA, fB: 16-bit flag registers
//! - KR: key/communication register, mirrored onto the EXT line
//! - SR: scratch register exchanged with KR
//! - R5: single-digit register for pointers and digit injection

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::bcd::DigitWord;

/// One of the five data registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reg {
    A,
    B,
    C,
    D,
    E,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg::A => "A",
            Reg::B => "B",
            Reg::C => "C",
            Reg::D => "D",
            Reg::E => "E",
        };
        f.write_str(name)
    }
}

bitflags::bitflags! {
    /// Internal processor status, sampled by the bus interface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuFlags: u16 {
        /// Display/idle mode; slows the instruction clock by four.
        const IDLE = 0x0001;
        /// Freeze the program counter for another instruction time.
        const HOLD = 0x0002;
        /// A branch was seen; COND is re-armed after the last one.
        const JUMP = 0x0004;
        /// The adder output must be driven onto the IO bus.
        const IO_VALID = 0x0400;
        /// Branch condition.
        const COND = 0x0800;
        /// COND as it stood at the start of the instruction, signalled at S1.
        const COND_LAST = 0x1000;
        /// Peripheral busy. No instruction raises it.
        const BUSY = 0x8000;
    }
}

/// The architectural register file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub a: DigitWord,
    pub b: DigitWord,
    pub c: DigitWord,
    pub d: DigitWord,
    pub e: DigitWord,
    /// Flag register A.
    pub fa: u16,
    /// Flag register B.
    pub fb: u16,
    /// Key/communication register.
    pub kr: u16,
    /// Scratch register.
    pub sr: u16,
    /// Single-digit register.
    pub r5: u8,
}

impl Registers {
    /// A register file with every register cleared.
    pub fn new() -> Self {
        Self {
            a: DigitWord::zero(),
            b: DigitWord::zero(),
            c: DigitWord::zero(),
            d: DigitWord::zero(),
            e: DigitWord::zero(),
            fa: 0,
            fb: 0,
            kr: 0,
            sr: 0,
            r5: 0,
        }
    }

    /// The contents the chip wakes up with.
    ///
    /// Registers come up as 0xE digits, except C which holds 5s so the
    /// TI-58 boot sequence (`ADD IO.ALL,C,#0`) clears COND. KR is left
    /// alone: the SR-51 firmware relies on it surviving.
    pub fn power_on() -> Self {
        Self {
            a: DigitWord::filled(0xE),
            b: DigitWord::filled(0xE),
            c: DigitWord::filled(0x5),
            d: DigitWord::filled(0xE),
            e: DigitWord::filled(0xE),
            fa: 0xDEAD,
            fb: 0xDEAD,
            kr: 0,
            sr: 0xDEAD,
            r5: 0xE,
        }
    }

    /// Borrow a data register.
    pub fn reg(&self, reg: Reg) -> &DigitWord {
        match reg {
            Reg::A => &self.a,
            Reg::B => &self.b,
            Reg::C => &self.c,
            Reg::D => &self.d,
            Reg::E => &self.e,
        }
    }

    /// Mutably borrow a data register.
    pub fn reg_mut(&mut self, reg: Reg) -> &mut DigitWord {
        match reg {
            Reg::A => &mut self.a,
            Reg::B => &mut self.b,
            Reg::C => &mut self.c,
            Reg::D => &mut self.d,
            Reg::E => &mut self.e,
        }
    }

    /// Bits 1-4 of a flag word as a digit, as moved into R5.
    #[inline]
    pub fn flag_nibble(flags: u16) -> u8 {
        ((flags >> 1) & 0x000F) as u8
    }

    /// Replace bits 1-4 of a flag word with a digit.
    #[inline]
    pub fn with_flag_nibble(flags: u16, digit: u8) -> u16 {
        (flags & !0x001E) | (((digit & 0x0F) as u16) << 1)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

fn write_bits(f: &mut fmt::Formatter<'_>, name: &str, value: u16) -> fmt::Result {
    write!(f, "{}={:04X} [", name, value)?;
    for i in (0..16).rev() {
        write!(f, "{}", (value >> i) & 1)?;
    }
    write!(f, "]")
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "A={} B={} C={} D={} E={}",
            self.a, self.b, self.c, self.d, self.e
        )?;
        write_bits(f, "FA", self.fa)?;
        write!(f, " ")?;
        write_bits(f, "KR", self.kr)?;
        writeln!(f)?;
        write_bits(f, "FB", self.fb)?;
        write!(f, " SR={:04X} R5={:X}", self.sr, self.r5)
    }
}
