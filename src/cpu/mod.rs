//! The TMC0501 processor core.
//!
//! This module implements the arithmetic chip of the calculator:
//! - five 16-digit registers A..E shifted through a single decimal adder
//! - flag registers fA/fB, the KR/SR pair and the R5 digit register
//! - a 13-bit instruction set in four classes (flags, keyboard, wait, ALU)
//! - the bus interface that times execution against the serial states

pub mod config;
pub mod decode;
pub mod display;
pub mod execute;
pub mod pipeline;
pub mod registers;

pub use config::{ConfigError, CpuConfig, PowerOn};
pub use decode::{Destination, OpClass, Opcode, Operands};
pub use display::DisplayScan;
pub use execute::{Control, Cpu, Diagnostic, Outcome};
pub use registers::{CpuFlags, Reg, Registers};
