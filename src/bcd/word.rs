//! The 16-digit register word.
//!
//! Every data register of the processor (A, B, C, D, E) and the IO bus
//! carry sixteen 4-bit digits, shifted through the ALU least significant
//! digit first. In normal use the digits hold BCD values 0..9, but the
//! hardware stores whole nibbles and firmware relies on that (digit 0 is
//! a binary pointer digit, power-on contents are 0xE), so values up to 15
//! are legal.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A 16-digit register value.
///
/// Digits are stored from least significant (index 0) to most
/// significant (index 15). Display and parsing use the opposite order,
/// most significant digit first, as in the firmware listings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DigitWord {
    digits: [u8; 16],
}

impl DigitWord {
    /// Number of digits in a register.
    pub const WIDTH: usize = 16;

    /// Create a word with every digit zero.
    #[inline]
    pub const fn zero() -> Self {
        Self { digits: [0; 16] }
    }

    /// Create a word with every digit set to `digit` (low nibble kept).
    #[inline]
    pub const fn filled(digit: u8) -> Self {
        Self { digits: [digit & 0x0F; 16] }
    }

    /// Create a word from raw digits, LSD first. Each digit is reduced to
    /// its low nibble.
    pub fn from_digits(digits: [u8; 16]) -> Self {
        let mut word = Self::zero();
        for (slot, digit) in word.digits.iter_mut().zip(digits) {
            *slot = digit & 0x0F;
        }
        word
    }

    /// The underlying digits, LSD first.
    #[inline]
    pub const fn digits(&self) -> &[u8; 16] {
        &self.digits
    }

    /// Get a single digit (0 = least significant).
    #[inline]
    pub const fn get(&self, index: usize) -> u8 {
        self.digits[index]
    }

    /// Set a single digit. The value is reduced to its low nibble.
    #[inline]
    pub fn set(&mut self, index: usize, digit: u8) {
        self.digits[index] = digit & 0x0F;
    }

    /// True if every digit is zero.
    pub fn is_zero(&self) -> bool {
        self.digits.iter().all(|&d| d == 0)
    }

    /// True if every digit in `range` is a decimal digit (0..9).
    pub fn is_bcd_in(&self, range: std::ops::RangeInclusive<usize>) -> bool {
        self.digits[range].iter().all(|&d| d <= 9)
    }

    /// Parse a hex digit string, most significant digit first.
    ///
    /// Shorter strings are zero-extended on the left, so `"1"` parses to
    /// `0000000000000001`.
    pub fn parse(s: &str) -> Result<Self, ParseDigitsError> {
        let s = s.trim();
        if s.is_empty() || s.len() > Self::WIDTH {
            return Err(ParseDigitsError::WrongLength(s.len()));
        }

        let mut word = Self::zero();
        for (i, c) in s.chars().rev().enumerate() {
            let digit = c.to_digit(16).ok_or(ParseDigitsError::InvalidChar(c))?;
            word.digits[i] = digit as u8;
        }
        Ok(word)
    }
}

impl fmt::Debug for DigitWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigitWord({})", self)
    }
}

impl fmt::Display for DigitWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digit in self.digits.iter().rev() {
            write!(f, "{:X}", digit)?;
        }
        Ok(())
    }
}

impl FromStr for DigitWord {
    type Err = ParseDigitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::ops::Index<usize> for DigitWord {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.digits[index]
    }
}

/// Errors from parsing a digit string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDigitsError {
    #[error("expected 1 to 16 digits, got {0}")]
    WrongLength(usize),

    #[error("invalid digit character: '{0}'")]
    InvalidChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_msd_first() {
        let word = DigitWord::parse("12").unwrap();
        assert_eq!(word.get(0), 2);
        assert_eq!(word.get(1), 1);
        assert_eq!(word.get(15), 0);
        assert_eq!(word.to_string(), "0000000000000012");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(DigitWord::parse(""), Err(ParseDigitsError::WrongLength(0)));
        assert_eq!(
            DigitWord::parse("00000000000000000"),
            Err(ParseDigitsError::WrongLength(17))
        );
        assert_eq!(DigitWord::parse("12G"), Err(ParseDigitsError::InvalidChar('G')));
    }

    #[test]
    fn test_set_keeps_nibble() {
        let mut word = DigitWord::zero();
        word.set(3, 0x1E);
        assert_eq!(word.get(3), 0xE);
        assert!(!word.is_bcd_in(0..=15));
        assert_eq!(DigitWord::filled(0xE).to_string(), "EEEEEEEEEEEEEEEE");
    }
}
