//! The shared serial bus.
//!
//! Every chip sees the same [`Bus`] snapshot. Time is split into sixteen
//! digit times (D15 down to D0), each made of sixteen serial states
//! (S0..S15), each with a write phase followed by a read phase.
//!
//! The EXT line carries three control bits and a 13-bit payload:
//!
//! ```text
//!  15               3   2     1     0
//! [     payload      ][HOLD][COND][PREG]
//! ```

pub mod chip;
pub mod sequencer;

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::bcd::DigitWord;

pub use chip::{Chip, Stop};
pub use sequencer::{BusError, Sequencer};

/// EXT bit 0: load the program counter from the payload.
pub const EXT_PREG: u16 = 0x0001;
/// EXT bit 1: branch condition.
pub const EXT_COND: u16 = 0x0002;
/// EXT bit 2: do not advance the program counter.
pub const EXT_HOLD: u16 = 0x0004;

/// Bit 12 of IRG marks a branch instruction.
pub const IRG_BRANCH: u16 = 0x1000;

/// Key line bit numbers.
pub const KN_BIT: u8 = 0;
pub const KO_BIT: u8 = 1;
pub const KP_BIT: u8 = 2;
pub const KQ_BIT: u8 = 3;
pub const KR_BIT: u8 = 4;
pub const KS_BIT: u8 = 5;
pub const KT_BIT: u8 = 6;

/// Which half of a serial state is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Chips drive their outputs.
    #[default]
    Write,
    /// Chips sample what was driven.
    Read,
}

/// Address of the instruction on IRG, as published by the program store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchAddress {
    At(u16),
    /// No program store served a word this digit time.
    End,
}

impl Default for FetchAddress {
    fn default() -> Self {
        FetchAddress::At(0)
    }
}

impl fmt::Display for FetchAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchAddress::At(addr) => write!(f, "{:04X}", addr),
            FetchAddress::End => write!(f, "----"),
        }
    }
}

/// Display outputs driven by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayOut {
    /// Character for the digit selected by the current digit time.
    pub digit: char,
    /// Decimal point.
    pub dpt: bool,
    /// Segment H (annunciators on some models).
    pub seg_h: bool,
}

impl DisplayOut {
    /// All segments off.
    pub const BLANK: DisplayOut = DisplayOut { digit: ' ', dpt: false, seg_h: false };
}

impl Default for DisplayOut {
    fn default() -> Self {
        Self::BLANK
    }
}

bitflags::bitflags! {
    /// Bus fields, as named in ownership violations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BusFields: u8 {
        const EXT = 0x01;
        const IRG = 0x02;
        const IO = 0x04;
        const DISPLAY = 0x08;
        const KEY_LINE = 0x10;
        const IDLE = 0x20;
        const ADDR = 0x40;
    }
}

impl Default for BusFields {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for BusFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// The transient bus state.
///
/// Chips drive IRG, IO, EXT and the fetch address through the `drive_*`
/// methods, which mark the field as driven even when the value does not
/// change. The sequencer clears the marks before each chip runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bus {
    pub ext: u16,
    /// 13-bit instruction word.
    pub irg: u16,
    pub io: DigitWord,
    pub display: DisplayOut,
    /// Keyboard return lines KN..KT, bits 0-6.
    pub key_line: u8,
    /// Digit time, 15 down to 0.
    pub dstate: u8,
    /// Serial state, 0 to 15.
    pub sstate: u8,
    pub phase: Phase,
    /// The processor is in display/idle mode.
    pub idle: bool,
    pub addr: FetchAddress,
    /// Fields marked by the chip currently running.
    #[serde(skip)]
    driven: BusFields,
}

impl Bus {
    /// An idle bus at D0 S0, write phase, with every line low.
    pub fn new() -> Self {
        Self::default()
    }

    /// True during a write phase.
    #[inline]
    pub fn is_write(&self) -> bool {
        self.phase == Phase::Write
    }

    /// True during the given serial state and phase.
    #[inline]
    pub fn at(&self, sstate: u8, phase: Phase) -> bool {
        self.sstate == sstate && self.phase == phase
    }

    /// Put an instruction word on IRG.
    pub fn drive_irg(&mut self, word: u16) {
        self.irg = word;
        self.driven |= BusFields::IRG;
    }

    /// Put a digit word on IO.
    pub fn drive_io(&mut self, digits: DigitWord) {
        self.io = digits;
        self.driven |= BusFields::IO;
    }

    /// OR `bits` onto EXT. EXT is wired-OR, so drivers only ever add bits.
    pub fn drive_ext(&mut self, bits: u16) {
        self.ext |= bits;
        self.driven |= BusFields::EXT;
    }

    /// Publish the address of the word on IRG.
    pub fn drive_addr(&mut self, addr: FetchAddress) {
        self.addr = addr;
        self.driven |= BusFields::ADDR;
    }

    /// Fields driven since the marks were last cleared.
    #[inline]
    pub fn driven(&self) -> BusFields {
        self.driven
    }

    pub(crate) fn clear_driven(&mut self) {
        self.driven = BusFields::empty();
    }

    /// Fields that differ between two snapshots.
    pub fn changed_fields(&self, other: &Bus) -> BusFields {
        let mut fields = BusFields::empty();
        fields.set(BusFields::EXT, self.ext != other.ext);
        fields.set(BusFields::IRG, self.irg != other.irg);
        fields.set(BusFields::IO, self.io != other.io);
        fields.set(BusFields::DISPLAY, self.display != other.display);
        fields.set(BusFields::KEY_LINE, self.key_line != other.key_line);
        fields.set(BusFields::IDLE, self.idle != other.idle);
        fields.set(BusFields::ADDR, self.addr != other.addr);
        fields
    }

    /// Clear the lines that are re-driven every digit time.
    pub(crate) fn start_digit(&mut self, dstate: u8) {
        self.dstate = dstate;
        self.ext = 0;
        self.irg = 0;
        self.io = DigitWord::zero();
        self.addr = FetchAddress::End;
    }
}
