pub mod event;
pub mod slot;

pub use event::{Choice, Progress, SolverEvent, SolverResult};
pub use slot::{Iteration, Slot, SlotError};
