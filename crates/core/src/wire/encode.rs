use std::fmt;

use crate::model::SolverEvent;

use super::{END_SENTINEL, RESULT_SUFFIX, TAG_CHOICE, TAG_ERROR, TAG_FRAME_END, TAG_PROGRESS, TAG_SLOT};

/// Render an event as the protocol line that decodes back to it.
pub fn encode(event: &SolverEvent) -> String {
    event.to_string()
}

struct JobList<'a>(&'a [u32]);

impl fmt::Display for JobList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, job) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{job}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SolverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(p) => write!(
                f,
                "{TAG_PROGRESS};iter={};percent={};cmax={};delta={};seq={}",
                p.iteration,
                p.percent,
                p.cmax,
                p.delta,
                JobList(&p.sequence)
            ),
            Self::Choice(c) => write!(
                f,
                "{TAG_CHOICE};iter={};job={};best_pos={};cmax_after={}",
                c.iteration, c.job, c.best_position, c.cmax_after
            ),
            Self::Slot(s) => {
                let prev = s.previous_job.map_or(-1, i64::from);
                write!(
                    f,
                    "{TAG_SLOT};iter={};machine={};prev={prev};job={};setup={};start={};end={}",
                    s.iteration, s.machine, s.job, s.setup, s.start, s.end
                )
            }
            Self::FrameEnd { iteration } => write!(f, "{TAG_FRAME_END};iter={iteration}"),
            Self::Result(r) => write!(
                f,
                "{}{RESULT_SUFFIX};perm={};cmax={}",
                r.variant,
                JobList(&r.permutation),
                r.cmax
            ),
            Self::ErrorNotice { message } => write!(f, "{TAG_ERROR};{message}"),
            Self::RawLog { text } => f.write_str(text),
            Self::Terminate => f.write_str(END_SENTINEL),
        }
    }
}
