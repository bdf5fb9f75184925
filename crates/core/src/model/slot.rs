use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Iteration key of a reported frame.
///
/// The solver numbers its construction steps and reports the schedule it
/// settled on under the literal `FINAL`, which orders after every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Iteration {
    Step(u64),
    Final,
}

impl Iteration {
    pub const FINAL_LITERAL: &'static str = "FINAL";

    pub fn step(&self) -> Option<u64> {
        match self {
            Self::Step(n) => Some(*n),
            Self::Final => None,
        }
    }
}

impl Default for Iteration {
    fn default() -> Self {
        Self::Step(0)
    }
}

impl From<u64> for Iteration {
    fn from(n: u64) -> Self {
        Self::Step(n)
    }
}

impl fmt::Display for Iteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(n) => write!(f, "{n}"),
            Self::Final => f.write_str(Self::FINAL_LITERAL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("end {end} precedes start {start}")]
    EndBeforeStart { start: i64, end: i64 },
    #[error("negative setup {0}")]
    NegativeSetup(i64),
    #[error("setup {setup} starts before time zero (start {start})")]
    SetupBeforeZero { start: i64, setup: i64 },
    #[error("times out of range (setup {setup}, start {start}, end {end})")]
    TimeOverflow { setup: i64, start: i64, end: i64 },
}

/// One operation of a job on a machine, as reported for one iteration.
///
/// Times are in the solver's discrete time unit. Slots are only built via
/// [`Slot::new`], which enforces the geometric invariants, and are never
/// modified after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub iteration: Iteration,
    pub machine: u32,
    /// Job processed on this machine immediately before, if any.
    pub previous_job: Option<u32>,
    pub job: u32,
    /// Setup time spent right before `start`.
    pub setup: i64,
    pub start: i64,
    pub end: i64,
}

impl Slot {
    pub fn new(
        iteration: Iteration,
        machine: u32,
        previous_job: Option<u32>,
        job: u32,
        setup: i64,
        start: i64,
        end: i64,
    ) -> Result<Self, SlotError> {
        if end < start {
            return Err(SlotError::EndBeforeStart { start, end });
        }
        if setup < 0 {
            return Err(SlotError::NegativeSetup(setup));
        }
        let overflow = SlotError::TimeOverflow { setup, start, end };
        end.checked_sub(start).ok_or_else(|| overflow.clone())?;
        let setup_start = start.checked_sub(setup).ok_or(overflow)?;
        if setup > 0 && setup_start < 0 {
            return Err(SlotError::SetupBeforeZero { start, setup });
        }
        Ok(Self {
            iteration,
            machine,
            previous_job,
            job,
            setup,
            start,
            end,
        })
    }

    pub fn duration(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    pub fn has_setup(&self) -> bool {
        self.setup > 0
    }

    /// Start of the setup segment `[start - setup, start)`, when there is one.
    pub fn setup_start(&self) -> Option<i64> {
        self.has_setup().then(|| self.start.saturating_sub(self.setup))
    }
}
