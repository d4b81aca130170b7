//! # TMC0501 Emulator
//!
//! A serial-clock accurate emulator of the TMC0501 arithmetic chip used in
//! the TI-58/59 and SR-50 family of calculators.
//!
//! The processor computes one decimal digit per digit time and talks to
//! the rest of the calculator over a shared serial bus. The emulator keeps
//! that structure: chips implement [`Chip`] and a [`Sequencer`] calls them
//! for every serial state.
//!
//! ```
//! use tmc0501::{Cpu, CpuConfig, ProgramRom, Sequencer, Stop};
//!
//! let mut seq = Sequencer::new();
//! seq.attach(ProgramRom::new(vec![0x0A37]).unwrap()); // R5 = 3
//! seq.attach(Cpu::with_config(CpuConfig::zeroed()));
//! assert_eq!(seq.run(), Ok(Stop::EndOfProgram));
//! assert_eq!(seq.chip::<Cpu>().unwrap().regs.r5, 3);
//! ```

pub mod bcd;
pub mod bus;
pub mod cpu;
pub mod rom;
pub mod trace;

// Re-export commonly used types
pub use bcd::{DigitWord, Mask};
pub use bus::{Bus, BusError, Chip, FetchAddress, Phase, Sequencer, Stop};
pub use cpu::{Cpu, CpuConfig, CpuFlags, Opcode, Outcome, Registers};
pub use rom::{ProgramRom, RomError};
pub use trace::BusTrace;
