//! Display digit generation.
//!
//! In idle mode the processor scans the display from D15 down to D0,
//! one digit per digit time. A holds the digits and B the per-digit
//! format codes:
//!
//! | B     | shown                                 |
//! |-------|---------------------------------------|
//! | 0-2   | A digit, blank while zero-suppressed  |
//! | 3, 7  | blank                                 |
//! | 4     | `'`                                   |
//! | 5     | `o`, or `-` when A is zero            |
//! | 6     | `-`                                   |
//! | 8+    | A digit, ends zero suppression        |
//!
//! R5 points at the digit carrying the decimal point and fA bits 1-15
//! drive segment H.

use serde::{Serialize, Deserialize};
use crate::bus::DisplayOut;
use crate::cpu::registers::Registers;

/// Leading-zero suppression carried from one digit time to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayScan {
    zero_suppress: bool,
}

impl DisplayScan {
    /// A scanner that starts out suppressing leading zeros.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive the display outputs for digit time `digit`.
    pub fn generate(&mut self, regs: &Registers, idle: bool, digit: u8, out: &mut DisplayOut) {
        if !idle {
            out.seg_h = true;
            return;
        }

        let i = (digit & 0x0F) as usize;
        let a = regs.a.get(i);
        let b = regs.b.get(i);

        if i == 15 {
            self.zero_suppress = true;
        }
        if i == 3 || (regs.r5 as usize == i && i != 15) || b >= 8 {
            self.zero_suppress = false;
        }
        if i == 2 {
            self.zero_suppress = true;
        }

        out.digit = if b == 7 || b == 3 || (b <= 4 && self.zero_suppress && a == 0) {
            ' '
        } else if b == 6 || (b == 5 && a == 0) {
            '-'
        } else if b == 5 {
            'o'
        } else if b == 4 {
            '\''
        } else if regs.b.get(3) == 2 {
            '"'
        } else {
            if a != 0 {
                self.zero_suppress = false;
            }
            (b'0' + a) as char
        };
        out.dpt = regs.r5 as usize == i;
        out.seg_h = (regs.fa as u32) & (1u32 << (i + 1)) != 0;
    }
}
