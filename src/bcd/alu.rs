//! The digit-serial adder.
//!
//! The processor has a single 4-bit adder that sees one digit of each
//! operand per digit time, D0 first. Carries ripple from one digit time to
//! the next and are corrected to decimal on every digit except D0, which
//! the firmware uses as a binary pointer. [`alu`] reproduces one full pass
//! of that adder over the sixteen digits.

use serde::{Serialize, Deserialize};
use crate::bcd::{DigitWord, Mask};

/// What the adder does with its operands.
///
/// `Sub` and `ShiftRight` share the complementing half of the adder: the
/// Y side is negated before X is added, and decimal correction goes
/// upwards. This matters for the serial output and the carry even though
/// a right shift only stores the uncorrected digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    /// X + Y
    Add,
    /// Shift the sum one digit towards the MSD.
    ShiftLeft,
    /// X - Y
    Sub,
    /// Shift X | Y one digit towards the LSD.
    ShiftRight,
}

impl AluOp {
    /// True for the two shift operations.
    #[inline]
    pub const fn is_shift(self) -> bool {
        matches!(self, AluOp::ShiftLeft | AluOp::ShiftRight)
    }

    /// True for the operations running through the complementing adder.
    #[inline]
    pub const fn complements(self) -> bool {
        matches!(self, AluOp::Sub | AluOp::ShiftRight)
    }

    /// Listing mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::ShiftLeft => "SLL",
            AluOp::Sub => "SUB",
            AluOp::ShiftRight => "SRL",
        }
    }
}

/// Side results of one adder pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluOutput {
    /// The raw adder output of every digit, as driven onto the IO bus.
    pub serial_out: DigitWord,
    /// Corrected digit at the start of the window, for R5.
    pub r5: Option<u8>,
    /// A non-shift operation carried out of the last window digit.
    pub clears_cond: bool,
}

/// Run one adder pass.
///
/// `dst` receives the corrected result inside the mask window and is left
/// untouched elsewhere. `x` and `y` are the adder inputs; either may be
/// absent. `serial_in` is OR-ed into the Y side of every digit. Operands
/// are taken by value, so `dst` may hold a copy of the same register.
pub fn alu(
    op: AluOp,
    mut dst: Option<&mut DigitWord>,
    x: Option<DigitWord>,
    y: Option<DigitWord>,
    serial_in: Option<&DigitWord>,
    mask: &Mask,
) -> AluOutput {
    let start = mask.start as usize;
    let end = mask.end as usize;
    let cpos = mask.cpos as usize;

    let mut out = AluOutput {
        serial_out: DigitWord::zero(),
        r5: None,
        clears_cond: false,
    };
    let mut carry = 0u8;
    let mut shl = 0u8;

    for i in 0..DigitWord::WIDTH {
        if i == start {
            carry = 0;
            shl = 0;
        }

        let mut sum = y.map_or(0, |y| y.get(i));
        if let Some(serial) = serial_in {
            sum |= serial.get(i);
        }
        if i == cpos {
            sum |= mask.cval;
        }

        let mut shr = sum;
        sum = sum.wrapping_add(carry);
        if op.complements() {
            sum = sum.wrapping_neg();
        }
        if let Some(x) = x {
            sum = sum.wrapping_add(x.get(i));
            shr |= x.get(i);
        }
        out.serial_out.set(i, sum);

        let carried = if i == 0 { sum >= 0x10 } else { sum >= 10 };
        if carried {
            sum = if i == 0 {
                sum & 0x0F
            } else if op.complements() {
                sum.wrapping_add(10)
            } else {
                sum.wrapping_sub(10)
            };
        }
        carry = carried as u8;

        if !mask.contains(i) {
            continue;
        }
        if i == start {
            out.r5 = Some(sum & 0x0F);
        }
        if let Some(dst) = dst.as_deref_mut() {
            match op {
                AluOp::ShiftLeft => dst.set(i, shl),
                AluOp::ShiftRight => {
                    if i > start {
                        dst.set(i - 1, shr);
                    }
                    if i == end {
                        dst.set(i, 0);
                    }
                }
                AluOp::Add | AluOp::Sub => dst.set(i, sum),
            }
            shl = sum;
        }
        if i == end && !op.is_shift() && carried {
            out.clears_cond = true;
        }
    }

    out
}

/// Swap two registers digit by digit inside the mask window.
pub fn exchange(a: &mut DigitWord, b: &mut DigitWord, mask: &Mask) {
    if let Some(window) = mask.window() {
        for i in window {
            let tmp = a.get(i);
            a.set(i, b.get(i));
            b.set(i, tmp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bcd::mask::{mask, MASKS};
    use proptest::prelude::*;

    fn word(s: &str) -> DigitWord {
        DigitWord::parse(s).unwrap()
    }

    /// Run `op` with the destination also feeding the X side.
    fn apply(op: AluOp, dst: &mut DigitWord, y: Option<DigitWord>, mask: &Mask) -> AluOutput {
        let x = *dst;
        alu(op, Some(dst), Some(x), y, None, mask)
    }

    #[test]
    fn test_add_all() {
        let mut a = DigitWord::zero();
        let out = apply(AluOp::Add, &mut a, Some(word("1")), &Mask::ALL);
        assert_eq!(a, word("1"));
        assert!(!out.clears_cond);
        assert_eq!(out.r5, Some(1));
    }

    #[test]
    fn test_decimal_carry_ripples() {
        // D0 is binary: 9 + 1 = 0xA, no carry into D1.
        let mut a = word("999");
        let out = apply(AluOp::Add, &mut a, Some(word("1")), &Mask::ALL);
        assert_eq!(a, word("99A"));
        assert!(!out.clears_cond);

        let mut a = word("9990");
        apply(AluOp::Add, &mut a, Some(word("10")), &Mask::ALL);
        assert_eq!(a, word("10000"));
    }

    #[test]
    fn test_carry_out_of_window_clears_cond() {
        let mut a = word("9999999999999990");
        let out = apply(AluOp::Add, &mut a, Some(word("10")), &Mask::ALL);
        assert!(a.is_zero());
        assert!(out.clears_cond);
    }

    #[test]
    fn test_subtract_borrows() {
        let mut a = word("1000");
        let out = apply(AluOp::Sub, &mut a, Some(word("10")), &Mask::ALL);
        assert_eq!(a, word("990"));
        assert!(!out.clears_cond);

        // 0 - 1 borrows out of the top digit; D0 is outside MAEX.
        let mut a = DigitWord::zero();
        let out = apply(AluOp::Sub, &mut a, Some(word("10")), mask(12));
        assert_eq!(a, word("9999999999999990"));
        assert!(out.clears_cond);
    }

    #[test]
    fn test_mask_window_is_respected() {
        let mut a = word("1111111111111111");
        apply(AluOp::Add, &mut a, Some(word("2222222222222222")), mask(6));
        assert_eq!(a, word("1111111111111331"));
    }

    #[test]
    fn test_constant_injection() {
        // MLSD 5 adds 5 into the mantissa LSD.
        let mut a = DigitWord::zero();
        apply(AluOp::Add, &mut a, None, mask(11));
        assert_eq!(a, word("5000"));
    }

    #[test]
    fn test_shift_left_and_right() {
        let mut a = word("12345");
        apply(AluOp::ShiftLeft, &mut a, None, mask(9));
        assert_eq!(a, word("120345"));

        apply(AluOp::ShiftRight, &mut a, None, mask(9));
        assert_eq!(a, word("12345"));
    }

    #[test]
    fn test_shift_never_clears_cond() {
        let mut a = word("9999999999999999");
        let y = a;
        let out = apply(AluOp::ShiftLeft, &mut a, Some(y), &Mask::ALL);
        assert!(!out.clears_cond);
    }

    #[test]
    fn test_empty_mask_writes_nothing() {
        let mut a = word("1234");
        let out = apply(AluOp::Add, &mut a, Some(word("1111")), &Mask::NONE);
        assert_eq!(a, word("1234"));
        assert_eq!(out.r5, None);
        assert_eq!(out.serial_out, word("2345"));
    }

    #[test]
    fn test_serial_input_is_ored() {
        let io = word("7000");
        let out = alu(AluOp::Add, None, None, None, Some(&io), &Mask::ALL);
        assert_eq!(out.serial_out, io);
        assert_eq!(out.r5, Some(0));
    }

    #[test]
    fn test_exchange_window() {
        let mut a = word("1111111111111111");
        let mut b = word("2222222222222222");
        exchange(&mut a, &mut b, mask(9));
        assert_eq!(a, word("2222222222222111"));
        assert_eq!(b, word("1111111111111222"));
    }

    fn bcd_word() -> impl Strategy<Value = DigitWord> {
        prop::array::uniform16(0u8..10).prop_map(DigitWord::from_digits)
    }

    fn used_mask() -> impl Strategy<Value = Mask> {
        prop::sample::select(
            MASKS
                .iter()
                .map(|(m, _)| *m)
                .filter(|m| !m.is_empty())
                .collect::<Vec<_>>(),
        )
    }

    fn plain_mask() -> impl Strategy<Value = Mask> {
        (0u8..16, 0u8..16).prop_map(|(a, b)| Mask::new(a.min(b), a.max(b), 0, 0))
    }

    proptest! {
        #[test]
        fn prop_add_sub_store_decimal_digits(
            a in bcd_word(),
            b in bcd_word(),
            m in used_mask(),
            sub in any::<bool>(),
        ) {
            let op = if sub { AluOp::Sub } else { AluOp::Add };
            // The injected constant replaces the Y digit it lands on.
            let mut y = b;
            if m.cval != 0 {
                y.set(m.cpos as usize, 0);
            }
            let mut dst = a;
            alu(op, Some(&mut dst), Some(a), Some(y), None, &m);
            // D0 is binary.
            let low = (m.start as usize).max(1);
            prop_assert!(dst.is_bcd_in(low..=m.end as usize), "{} in {:?}", dst, m);
            for i in (1..16).filter(|&i| !m.contains(i)) {
                prop_assert_eq!(dst.get(i), a.get(i));
            }
        }

        #[test]
        fn prop_add_then_sub_round_trips(a in bcd_word(), b in bcd_word(), m in plain_mask()) {
            let mut dst = a;
            apply(AluOp::Add, &mut dst, Some(b), &m);
            apply(AluOp::Sub, &mut dst, Some(b), &m);
            prop_assert_eq!(dst, a);
        }

        #[test]
        fn prop_shift_left_then_right(a in bcd_word(), m in plain_mask()) {
            let mut dst = a;
            apply(AluOp::ShiftLeft, &mut dst, None, &m);
            apply(AluOp::ShiftRight, &mut dst, None, &m);
            for i in 0..16 {
                if i == m.end as usize {
                    prop_assert_eq!(dst.get(i), 0);
                } else {
                    prop_assert_eq!(dst.get(i), a.get(i));
                }
            }
        }

        #[test]
        fn prop_exchange_twice_is_identity(a in bcd_word(), b in bcd_word(), m in plain_mask()) {
            let (mut p, mut q) = (a, b);
            exchange(&mut p, &mut q, &m);
            exchange(&mut p, &mut q, &m);
            prop_assert_eq!(p, a);
            prop_assert_eq!(q, b);
        }

        #[test]
        fn prop_cond_clears_only_on_terminal_carry(
            a in bcd_word(),
            b in bcd_word(),
            m in plain_mask(),
            op in prop::sample::select(vec![AluOp::Add, AluOp::Sub, AluOp::ShiftLeft, AluOp::ShiftRight]),
        ) {
            let mut dst = a;
            let out = alu(op, Some(&mut dst), Some(a), Some(b), None, &m);
            if op.is_shift() {
                prop_assert!(!out.clears_cond);
            } else {
                // Reference: the window as a mixed-radix number, D0 binary.
                let (mut x, mut y, mut scale) = (0i64, 0i64, 1i64);
                for i in m.start as usize..=m.end as usize {
                    x += a.get(i) as i64 * scale;
                    y += b.get(i) as i64 * scale;
                    scale *= if i == 0 { 16 } else { 10 };
                }
                let overflow = match op {
                    AluOp::Add => x + y >= scale,
                    _ => x - y < 0,
                };
                prop_assert_eq!(out.clears_cond, overflow);
            }
        }
    }
}
