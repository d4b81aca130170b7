//! The contract every chip on the bus implements.

use std::any::Any;
use thiserror::Error;
use crate::bus::Bus;

/// Why a chip ended the run.
///
/// This is a normal result of a run rather than a failure; it implements
/// `Error` so callers can propagate it with `?` when they treat any stop as
/// unexpected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Stop {
    /// The program store ran past the end of its image.
    #[error("end of program")]
    EndOfProgram,
    /// A chip reported a fault with an implementation-defined code.
    #[error("chip fault {0}")]
    Fault(i32),
}

/// A chip attached to the bus.
///
/// `process` is called once per serial state and phase. During the write
/// phase a chip may drive bus fields; during the read phase it only samples
/// them.
pub trait Chip {
    /// Name used in logs and ownership violations.
    fn name(&self) -> &str;

    /// Handle one phase of one serial state.
    fn process(&mut self, bus: &mut Bus) -> Result<(), Stop>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
