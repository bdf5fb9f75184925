use serde::{Deserialize, Serialize};

use super::slot::{Iteration, Slot};

/// Progress report from the constructive phase (`NEH_PROGRESS`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub iteration: Iteration,
    pub percent: f64,
    pub cmax: f64,
    /// Makespan change relative to the previous step.
    pub delta: f64,
    pub sequence: Vec<u32>,
}

/// Insertion decision of one constructive step (`NEH_CHOICE`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub iteration: Iteration,
    pub job: u32,
    pub best_position: u32,
    pub cmax_after: f64,
}

/// Final answer of one algorithm phase (`<TAG>_RESULT`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    /// Prefix of the `_RESULT` tag, e.g. `NEH`, `SA`, `ASA`.
    pub variant: String,
    pub cmax: f64,
    pub permutation: Vec<u32>,
}

/// One decoded line of solver output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolverEvent {
    Progress(Progress),
    Choice(Choice),
    Slot(Slot),
    FrameEnd { iteration: Iteration },
    Result(SolverResult),
    ErrorNotice { message: String },
    /// Any line that is not part of the protocol.
    RawLog { text: String },
    /// The `END` sentinel.
    Terminate,
}

impl SolverEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Choice(_) => "choice",
            Self::Slot(_) => "slot",
            Self::FrameEnd { .. } => "frame_end",
            Self::Result(_) => "result",
            Self::ErrorNotice { .. } => "error_notice",
            Self::RawLog { .. } => "raw_log",
            Self::Terminate => "terminate",
        }
    }
}
