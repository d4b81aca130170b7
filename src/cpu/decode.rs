//! Instruction decoding.
//!
//! Instructions are 13-bit words sent serially on IRG during S3..S15.
//! Bit 12 marks a branch, which the program store handles itself. The
//! other words are split by bits 8-11:
//!
//! ```text
//!  12 11   8 7      3 2   0
//! [ 0| 0000 |  bit  | op ]  flag operations
//! [ 0| 1000 | keys  |    ]  keyboard scan
//! [ 0| 1010 |  arg  | op ]  wait / register moves
//! [ 0| mask |operand| dst]  ALU operations
//! ```

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::bcd::{mask, AluOp, Mask};
use crate::bus::IRG_BRANCH;
use crate::cpu::registers::Reg;

/// A raw instruction word with named field accessors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Opcode(pub u16);

/// Instruction class, from the branch marker and bits 8-11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Branch,
    Flag,
    Keyboard,
    Wait,
    Alu,
}

impl Opcode {
    /// `MOV KR,EXT`: the only instruction that does not publish KR at S0.
    pub const LOAD_KR_FROM_EXT: Opcode = Opcode(0x0A0C);

    /// Bit 12: a branch, resolved by the program store.
    #[inline]
    pub const fn is_branch(self) -> bool {
        self.0 & IRG_BRANCH != 0
    }

    /// Instruction class, from bit 12 and bits 8-11.
    pub const fn class(self) -> OpClass {
        if self.is_branch() {
            return OpClass::Branch;
        }
        match self.0 & 0x0F00 {
            0x0000 => OpClass::Flag,
            0x0800 => OpClass::Keyboard,
            0x0A00 => OpClass::Wait,
            _ => OpClass::Alu,
        }
    }

    /// Bits 0-3: sub-operation of the flag and wait classes.
    #[inline]
    pub const fn low_nibble(self) -> u16 {
        self.0 & 0x000F
    }

    /// Bits 4-7: bit number, digit number or immediate.
    #[inline]
    pub const fn arg(self) -> u16 {
        (self.0 >> 4) & 0x000F
    }

    /// Bits 4-7 in place, for the peripheral sub-selects of the wait class.
    #[inline]
    pub const fn sub_select(self) -> u16 {
        self.0 & 0x00F0
    }

    /// Bits 8-11: mask table index.
    #[inline]
    pub const fn mask_index(self) -> usize {
        ((self.0 >> 8) & 0x000F) as usize
    }

    /// Bits 3-7: operand table index.
    #[inline]
    pub const fn operand_index(self) -> usize {
        ((self.0 >> 3) & 0x001F) as usize
    }

    /// Bits 0-2: destination table index.
    #[inline]
    pub const fn dest_index(self) -> usize {
        (self.0 & 0x0007) as usize
    }

    /// Bit 3 of a keyboard instruction: test the current row only.
    #[inline]
    pub const fn is_row_test(self) -> bool {
        self.0 & 0x0008 != 0
    }

    /// Bit 3 of an R5-to-adder instruction: correct by subtraction.
    #[inline]
    pub const fn is_r5_subtract(self) -> bool {
        self.0 & 0x0008 != 0
    }

    /// Key lines a keyboard instruction scans (bits 0-2 and 4-7, inverted).
    #[inline]
    pub const fn key_mask(self) -> u8 {
        (((self.0 & 0x07) | ((self.0 >> 1) & 0x78)) ^ 0x7F) as u8
    }

    /// Whether the instruction's side effects happen at S0 write rather
    /// than at S15 read.
    ///
    /// Early: anything that raises HOLD (needed by S2), writes the IO bus
    /// (driven from S0), or changes KR or PREG. Late: anything reading the
    /// IO bus or EXT, which only settle by S15.
    pub const fn runs_early(self) -> bool {
        match self.0 & 0x1F00 {
            0x0000 | 0x0800 => true,
            0x0A00 => self.low_nibble() != 0xC,
            _ => self.dest_index() == 1,
        }
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opcode({:04X})", self.0)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Adder inputs and function selected by opcode bits 3-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operands {
    pub x: Option<Reg>,
    pub y: Option<Reg>,
    pub op: AluOp,
}

const fn ops(x: Option<Reg>, y: Option<Reg>, op: AluOp) -> Operands {
    Operands { x, y, op }
}

use AluOp::{Add, ShiftLeft as Shl, ShiftRight as Shr, Sub};
use Reg::{A, B, C, D};

/// The 32 operand combinations.
///
/// Slots 24-29 take their missing operand from the IO bus (constant ROM,
/// data registers, RAM). Slots 30 and 31 are the R5-to-adder forms and
/// never run as a plain adder pass when the destination is a register.
pub const OPERANDS: [Operands; 32] = [
    ops(Some(A), None, Add),
    ops(Some(A), None, Sub),
    ops(None, Some(B), Add),
    ops(None, Some(B), Sub),
    ops(Some(C), None, Add),
    ops(Some(C), None, Sub),
    ops(None, Some(D), Add),
    ops(None, Some(D), Sub),
    ops(Some(A), None, Shl),
    ops(Some(A), None, Shr),
    ops(None, Some(B), Shl),
    ops(None, Some(B), Shr),
    ops(Some(C), None, Shl),
    ops(Some(C), None, Shr),
    ops(None, Some(D), Shl),
    ops(None, Some(D), Shr),
    ops(Some(A), Some(B), Add),
    ops(Some(A), Some(B), Sub),
    ops(Some(C), Some(B), Add),
    ops(Some(C), Some(B), Sub),
    ops(Some(C), Some(D), Add),
    ops(Some(C), Some(D), Sub),
    ops(Some(A), Some(D), Add),
    ops(Some(A), Some(D), Sub),
    ops(Some(A), None, Add),
    ops(Some(A), None, Sub),
    ops(None, None, Add),
    ops(None, None, Sub),
    ops(Some(C), None, Add),
    ops(Some(C), None, Sub),
    ops(None, None, Add),
    ops(None, None, Sub),
];

/// Where an ALU result goes, from opcode bits 0-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Reg(Reg),
    /// Drive the adder output onto the IO bus.
    Io,
    /// No adder write; swap two registers over the mask instead.
    Exchange(Reg, Reg),
}

impl Destination {
    /// The register written by the adder, if any.
    pub const fn register(self) -> Option<Reg> {
        match self {
            Destination::Reg(reg) => Some(reg),
            _ => None,
        }
    }
}

pub const DESTINATIONS: [Destination; 8] = [
    Destination::Reg(Reg::A),
    Destination::Io,
    Destination::Exchange(Reg::A, Reg::B),
    Destination::Reg(Reg::B),
    Destination::Reg(Reg::C),
    Destination::Exchange(Reg::C, Reg::D),
    Destination::Reg(Reg::D),
    Destination::Exchange(Reg::A, Reg::E),
];

/// A fully resolved ALU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluInstr {
    pub mask: Mask,
    pub operands: Operands,
    pub dest: Destination,
    /// Operand slots 30/31: load R5 into the window and correct it.
    pub r5_to_adder: bool,
}

/// Resolve an ALU-class opcode against the dispatch tables.
pub fn resolve(opcode: Opcode) -> AluInstr {
    AluInstr {
        mask: *mask::mask(opcode.mask_index()),
        operands: OPERANDS[opcode.operand_index()],
        dest: DESTINATIONS[opcode.dest_index()],
        r5_to_adder: opcode.operand_index() >= 30,
    }
}
