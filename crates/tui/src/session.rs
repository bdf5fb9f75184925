//! One live solver run as seen by the front-end.

use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use flowshop_core::supervisor::{
    BestKnown, EndReason, JsonlSink, LineSink, RunOutcome, TracingSink,
};
use flowshop_core::{LayoutModel, RunHandle, RunUpdate, Supervisor};

/// How to start (and restart) the solver.
#[derive(Debug, Clone)]
pub struct Launch {
    pub solver: String,
    pub args: Vec<String>,
    /// Append raw lines as JSON to this file.
    pub transcript: Option<PathBuf>,
}

impl Launch {
    fn sink(&self) -> Result<Box<dyn LineSink>> {
        let Some(path) = &self.transcript else {
            return Ok(Box::new(TracingSink));
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open transcript {}", path.display()))?;
        Ok(Box::new(JsonlSink::new(BufWriter::new(file))))
    }

    fn start(&self, supervisor: &mut Supervisor) -> Result<RunHandle> {
        let sink = self.sink()?;
        let handle = supervisor
            .start_run_with_sink(&self.solver, &self.args, sink)
            .with_context(|| format!("could not start {}", self.solver))?;
        Ok(handle)
    }
}

/// Everything the front-end shows, folded from [`RunUpdate`]s.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub layout: LayoutModel,
    pub best: Option<BestKnown>,
    pub percent: Option<f64>,
    pub last_warning: Option<String>,
    pub decode_failures: usize,
    pub frames: u64,
    pub outcome: Option<RunOutcome>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            layout: LayoutModel::empty(),
            best: None,
            percent: None,
            last_warning: None,
            decode_failures: 0,
            frames: 0,
            outcome: None,
        }
    }
}

impl SessionState {
    pub fn apply(&mut self, update: RunUpdate) {
        match update {
            RunUpdate::Layout(model) => {
                self.frames += 1;
                self.layout = model;
            }
            RunUpdate::Progress(progress) => {
                self.percent = Some(progress.percent);
                self.best = Some(BestKnown::from(&progress));
            }
            RunUpdate::Choice(_) => {}
            RunUpdate::Best(best) => self.best = Some(best),
            RunUpdate::Warning(message) => self.last_warning = Some(message),
            RunUpdate::DecodeFailed { .. } => self.decode_failures += 1,
            RunUpdate::Finished(outcome) => self.outcome = Some(outcome),
        }
    }

    pub fn status_line(&self) -> String {
        let mut parts = Vec::new();
        parts.push(match &self.outcome {
            None => "running".to_string(),
            Some(outcome) => describe_outcome(outcome),
        });
        if let Some(iteration) = self.layout.iteration {
            parts.push(format!("iter {iteration}"));
        }
        if let Some(percent) = self.percent.filter(|_| self.outcome.is_none()) {
            parts.push(format!("{percent:.0}%"));
        }
        match &self.best {
            Some(best) => {
                let sequence: Vec<String> = best.sequence.iter().map(u32::to_string).collect();
                parts.push(format!("Cmax {}", best.cmax));
                parts.push(format!("seq {}", sequence.join(" ")));
            }
            None => parts.push("Cmax -".to_string()),
        }
        if self.decode_failures > 0 {
            parts.push(format!("{} bad lines", self.decode_failures));
        }
        if let Some(warning) = &self.last_warning {
            parts.push(format!("warning: {warning}"));
        }
        parts.join(" | ")
    }
}

pub fn describe_outcome(outcome: &RunOutcome) -> String {
    let code = outcome
        .exit_code
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    match &outcome.reason {
        EndReason::Terminated | EndReason::EndOfStream if outcome.success() => "done".to_string(),
        EndReason::Terminated | EndReason::EndOfStream => format!("failed (exit {code})"),
        EndReason::Stopped => "stopped".to_string(),
        EndReason::StreamFailed(message) => format!("output lost: {message}"),
    }
}

/// The supervisor, its active run and the folded state.
#[derive(Debug)]
pub struct LiveSession {
    supervisor: Supervisor,
    launch: Launch,
    handle: RunHandle,
    pub state: SessionState,
}

impl LiveSession {
    pub fn start(mut supervisor: Supervisor, launch: Launch) -> Result<Self> {
        let handle = launch.start(&mut supervisor)?;
        Ok(Self {
            supervisor,
            launch,
            handle,
            state: SessionState::default(),
        })
    }

    /// Fold every queued update into the state. Returns whether anything
    /// arrived.
    pub fn poll(&mut self) -> bool {
        let updates = self.handle.drain();
        let changed = !updates.is_empty();
        for update in updates {
            self.state.apply(update);
        }
        changed
    }

    /// Block for the next update. `None` once the run has finished and
    /// everything was consumed.
    pub fn recv(&self) -> Option<RunUpdate> {
        self.handle.updates().recv().ok()
    }

    pub fn stop(&self) {
        self.supervisor.stop(&self.handle);
    }

    pub fn restart(&mut self) -> Result<()> {
        self.handle = self.launch.start(&mut self.supervisor)?;
        self.state = SessionState::default();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.is_running(&self.handle)
    }

    pub fn shutdown(&mut self) {
        self.supervisor.shutdown();
        self.poll();
    }
}
