//! ALU digit masks.
//!
//! A mask selects the digit window an ALU instruction writes and an
//! optional constant nibble injected into the adder. The windows follow
//! the floating point register layout of the calculator:
//!
//! ```text
//!  15 14 ............ 3   2 1   0
//! [ mantissa (MANT)  ] [EXP] [DPT]
//! ```

use serde::{Serialize, Deserialize};

/// A digit window with an injected constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    /// First digit of the window.
    pub start: u8,
    /// Last digit of the window (inclusive).
    pub end: u8,
    /// Digit position the constant is injected at.
    pub cpos: u8,
    /// Constant OR-ed into the adder at `cpos`.
    pub cval: u8,
}

impl Mask {
    /// The mask of unused table slots: no digit is ever written.
    pub const NONE: Mask = Mask::new(0xFF, 0, 0, 0);

    /// Every digit.
    pub const ALL: Mask = Mask::new(0, 15, 0, 0);

    /// Create a mask.
    pub const fn new(start: u8, end: u8, cpos: u8, cval: u8) -> Self {
        Self { start, end, cpos, cval }
    }

    /// True if the window selects no digit.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start > self.end || self.start > 15
    }

    /// The inclusive digit window, if any.
    pub fn window(&self) -> Option<std::ops::RangeInclusive<usize>> {
        if self.is_empty() {
            None
        } else {
            Some(self.start as usize..=self.end.min(15) as usize)
        }
    }

    /// True if `digit` falls inside the window.
    #[inline]
    pub fn contains(&self, digit: usize) -> bool {
        !self.is_empty() && digit >= self.start as usize && digit <= self.end as usize
    }
}

/// The sixteen masks selected by opcode bits 8-11, with their listing
/// names. Slots 0, 8 and 10 never reach the ALU (they are the flag,
/// keyboard and wait classes).
pub const MASKS: [(Mask, &str); 16] = [
    (Mask::NONE, ""),
    (Mask::ALL, "ALL"),
    (Mask::new(0, 0, 0, 0), "DPT"),
    (Mask::new(0, 0, 0, 1), "DPT 1"),
    (Mask::new(0, 0, 0, 0xC), "DPT C"),
    (Mask::new(3, 3, 3, 1), "LLSD 1"),
    (Mask::new(1, 2, 1, 0), "EXP"),
    (Mask::new(1, 2, 1, 1), "EXP 1"),
    (Mask::NONE, ""),
    (Mask::new(3, 15, 3, 0), "MANT"),
    (Mask::NONE, ""),
    (Mask::new(3, 15, 3, 5), "MLSD 5"),
    (Mask::new(1, 15, 1, 0), "MAEX"),
    (Mask::new(1, 15, 3, 1), "MLSD 1"),
    (Mask::new(1, 15, 15, 1), "MMSD 1"),
    (Mask::new(1, 15, 1, 1), "MAEX 1"),
];

/// Look up a mask by its 4-bit table index.
#[inline]
pub fn mask(index: usize) -> &'static Mask {
    &MASKS[index & 0x0F].0
}

/// Listing name of a mask by table index.
#[inline]
pub fn mask_name(index: usize) -> &'static str {
    MASKS[index & 0x0F].1
}
