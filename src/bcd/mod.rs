//! Decimal digit-serial arithmetic primitives.
//!
//! This module provides the data path of the processor:
//! - [`DigitWord`] - a 16-digit register value
//! - [`Mask`] - the digit window and injected constant of an instruction
//! - [`alu`] / [`exchange`] - the serial adder and the register swap

mod word;
pub mod mask;
pub mod alu;

pub use word::{DigitWord, ParseDigitsError};
pub use mask::{Mask, MASKS};
pub use alu::{alu, exchange, AluOp, AluOutput};
