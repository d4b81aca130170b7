//! Instruction store.
//!
//! [`ProgramRom`] holds a firmware image in memory and serves it on IRG.
//! It keeps its own program counter and follows the processor through
//! EXT: HOLD repeats the current word, PREG (one instruction late) loads
//! the counter from the EXT payload, and a branch word seen on IRG is
//! resolved against COND on the next fetch. Outside its image the store
//! leaves IRG and the fetch address undriven, so a program that runs off
//! every attached store reads as [`FetchAddress::End`].
//!
//! Branch word layout:
//!
//! ```text
//!  12  11  10          1   0
//! [ 1 |cond|   offset    |neg]
//! ```

use std::any::Any;
use thiserror::Error;
use crate::bus::{Bus, Chip, FetchAddress, Phase, Stop, EXT_COND, EXT_HOLD, EXT_PREG, IRG_BRANCH};

/// Errors when building a program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RomError {
    #[error("image of {words} words at base {base} exceeds the {max} word address space")]
    TooLarge { words: usize, base: u16, max: usize },

    #[error("word {word:#06X} at {addr} is wider than 13 bits")]
    InvalidWord { addr: usize, word: u16 },
}

/// An in-memory program store.
#[derive(Debug, Clone)]
pub struct ProgramRom {
    name: String,
    words: Vec<u16>,
    base: u32,
    pc: u32,
    last_ext: u16,
    last_irg: u16,
}

impl ProgramRom {
    /// Addresses reachable through the 13-bit EXT payload.
    pub const ADDRESS_SPACE: usize = 1 << 13;

    /// Counter value before the first PREG: outside any image.
    const PC_UNSET: u32 = 1 << 16;

    /// An image starting at address 0.
    pub fn new(words: Vec<u16>) -> Result<Self, RomError> {
        Self::with_base(words, 0)
    }

    /// An image starting at `base`.
    pub fn with_base(words: Vec<u16>, base: u16) -> Result<Self, RomError> {
        if base as usize + words.len() > Self::ADDRESS_SPACE {
            return Err(RomError::TooLarge {
                words: words.len(),
                base,
                max: Self::ADDRESS_SPACE,
            });
        }
        if let Some((addr, &word)) = words.iter().enumerate().find(|(_, w)| **w > 0x1FFF) {
            return Err(RomError::InvalidWord { addr, word });
        }
        Ok(Self {
            name: "rom".to_string(),
            words,
            base: base as u32,
            pc: Self::PC_UNSET,
            last_ext: 0,
            last_irg: 0,
        })
    }

    /// Rename the chip, for telling several stores apart in bus errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The program counter.
    #[inline]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Words in the image.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True for an image with no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn branch_target(&self, cond: bool) -> u32 {
        let want = (self.last_irg >> 11) & 1 == 1;
        if cond != want {
            return self.pc.wrapping_add(1);
        }
        let offset = ((self.last_irg >> 1) & 0x03FF) as u32;
        if self.last_irg & 1 != 0 {
            self.pc.wrapping_sub(offset)
        } else {
            self.pc.wrapping_add(offset)
        }
    }

    /// Pick the next address and drive the word at S4.
    fn fetch(&mut self, bus: &mut Bus) {
        // HOLD wins over PREG.
        if bus.ext & EXT_HOLD != 0 {
            // repeat
        } else if self.last_ext & EXT_PREG != 0 {
            self.pc = (self.last_ext >> 3) as u32;
        } else if self.last_irg & IRG_BRANCH != 0 {
            self.pc = self.branch_target(bus.ext & EXT_COND != 0);
        } else {
            self.pc = self.pc.wrapping_add(1);
        }

        let offset = self.pc.wrapping_sub(self.base) as usize;
        if let Some(&word) = self.words.get(offset).filter(|_| self.pc >= self.base) {
            bus.drive_irg(word);
            bus.drive_addr(FetchAddress::At(offset as u16));
        }
    }
}

impl Chip for ProgramRom {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, bus: &mut Bus) -> Result<(), Stop> {
        match bus.phase {
            Phase::Write if bus.sstate == 4 => self.fetch(bus),
            Phase::Read if bus.sstate == 15 => {
                self.last_irg = bus.irg;
                self.last_ext = bus.ext;
            }
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
