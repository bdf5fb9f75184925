//! Child-process lifecycle for solver runs.
//!
//! [`Supervisor::start_run`] spawns the solver with piped output and hands
//! back a [`RunHandle`]. A reader thread per run decodes lines in arrival
//! order, feeds slots into the shared [`IterationStore`], and sends
//! [`RunUpdate`]s over the handle's channel. Only one run is live at a time.

mod reader;
pub mod sink;

use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::LayoutModel;
use crate::model::{Choice, Iteration, Progress, SolverResult};
use crate::store::IterationStore;
use crate::wire::DecodeError;

pub use sink::{JsonlSink, LineSink, LineStatus, RawLine, StreamKind, TracingSink};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// How long a stopped child may take to exit before it is killed. Also
    /// bounds the drain after `stop`.
    pub grace_period: Duration,
    /// Keep reading after `END`; the solver prints it after every phase of
    /// a multi-phase run. When off, lines after `END` are discarded but the
    /// child is still left to exit on its own.
    pub follow_after_end: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            follow_after_end: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("child {0} was not captured")]
    MissingPipe(&'static str),
    #[error("failed to start reader thread: {0}")]
    Thread(#[source] io::Error),
}

/// Latest best schedule reported by the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestKnown {
    pub cmax: f64,
    pub sequence: Vec<u32>,
    /// Phase tag of a `_RESULT` line; `None` while construction is running.
    pub variant: Option<String>,
    pub iteration: Option<Iteration>,
}

impl From<&Progress> for BestKnown {
    fn from(progress: &Progress) -> Self {
        Self {
            cmax: progress.cmax,
            sequence: progress.sequence.clone(),
            variant: None,
            iteration: Some(progress.iteration),
        }
    }
}

impl From<&SolverResult> for BestKnown {
    fn from(result: &SolverResult) -> Self {
        Self {
            cmax: result.cmax,
            sequence: result.permutation.clone(),
            variant: Some(result.variant.clone()),
            iteration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// The `END` sentinel.
    Terminated,
    EndOfStream,
    Stopped,
    StreamFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: u64,
    pub reason: EndReason,
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !matches!(self.reason, EndReason::StreamFailed(_))
    }
}

/// Message from a run's reader thread.
#[derive(Debug)]
pub enum RunUpdate {
    /// A frame was completed and laid out.
    Layout(LayoutModel),
    Progress(Progress),
    Choice(Choice),
    Best(BestKnown),
    /// `ERROR` line from the solver.
    Warning(String),
    DecodeFailed { line: String, error: DecodeError },
    /// Always the last message of a run.
    Finished(RunOutcome),
}

#[derive(Debug)]
struct RunShared {
    running: AtomicBool,
    stop_requested: AtomicBool,
    best: Mutex<Option<BestKnown>>,
    child: Mutex<Child>,
}

impl RunShared {
    fn child(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_best(&self, best: BestKnown) {
        *self.best.lock().unwrap_or_else(PoisonError::into_inner) = Some(best);
    }

    fn request_stop(&self) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.child().kill() {
            // Already exited.
            tracing::debug!(error = %err, "kill on stop failed");
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

/// Caller's view of one run.
#[derive(Debug)]
pub struct RunHandle {
    id: u64,
    updates: Receiver<RunUpdate>,
    shared: Arc<RunShared>,
}

impl RunHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn updates(&self) -> &Receiver<RunUpdate> {
        &self.updates
    }

    /// Every update queued so far, without blocking.
    pub fn drain(&self) -> Vec<RunUpdate> {
        let mut out = Vec::new();
        loop {
            match self.updates.try_recv() {
                Ok(update) => out.push(update),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return out,
            }
        }
    }

    pub fn latest_best(&self) -> Option<BestKnown> {
        self.shared
            .best
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct ActiveRun {
    id: u64,
    shared: Arc<RunShared>,
    reader: JoinHandle<()>,
}

/// Owns the solver child process and the run's [`IterationStore`].
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    store: Arc<IterationStore>,
    active: Option<ActiveRun>,
    next_id: u64,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            store: Arc::new(IterationStore::new()),
            active: None,
            next_id: 1,
        }
    }

    /// The store of the current or most recent run. Left intact after a run
    /// ends until the next run starts.
    pub fn store(&self) -> &Arc<IterationStore> {
        &self.store
    }

    /// Start `command` with `args`, logging raw lines through [`TracingSink`].
    pub fn start_run<S: AsRef<str>>(
        &mut self,
        command: &str,
        args: &[S],
    ) -> Result<RunHandle, LaunchError> {
        self.start_run_with_sink(command, args, Box::new(TracingSink))
    }

    /// Start `command` with `args`. Any active run is stopped and joined and
    /// the store is cleared before the child is spawned.
    pub fn start_run_with_sink<S: AsRef<str>>(
        &mut self,
        command: &str,
        args: &[S],
        sink: Box<dyn LineSink>,
    ) -> Result<RunHandle, LaunchError> {
        self.shutdown();
        self.store.clear();

        let mut child = Command::new(command)
            .args(args.iter().map(AsRef::as_ref))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: command.to_string(),
                source,
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            (out, _) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(LaunchError::MissingPipe(if out.is_none() {
                    "stdout"
                } else {
                    "stderr"
                }));
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        tracing::info!(run = id, command, pid = child.id(), "solver started");

        let shared = Arc::new(RunShared {
            running: AtomicBool::new(true),
            stop_requested: AtomicBool::new(false),
            best: Mutex::new(None),
            child: Mutex::new(child),
        });

        let (lines_tx, lines_rx) = mpsc::channel();
        let pumps = reader::spawn_pump(stdout, StreamKind::Stdout, lines_tx.clone())
            .and_then(|()| reader::spawn_pump(stderr, StreamKind::Stderr, lines_tx));
        let (updates_tx, updates_rx) = mpsc::channel();
        let spawned = pumps.and_then(|()| {
            let ctx = reader::ReaderContext {
                run_id: id,
                store: Arc::clone(&self.store),
                shared: Arc::clone(&shared),
                updates: updates_tx,
                sink,
                config: self.config.clone(),
            };
            thread::Builder::new()
                .name(format!("flowshop-reader-{id}"))
                .spawn(move || reader::run(ctx, &lines_rx))
        });
        let reader = match spawned {
            Ok(reader) => reader,
            Err(err) => {
                shared.request_stop();
                let _ = shared.child().wait();
                return Err(LaunchError::Thread(err));
            }
        };

        self.active = Some(ActiveRun {
            id,
            shared: Arc::clone(&shared),
            reader,
        });

        Ok(RunHandle {
            id,
            updates: updates_rx,
            shared,
        })
    }

    /// Ask the run's child to terminate. The reader keeps draining output
    /// for up to the grace period and then reports [`EndReason::Stopped`].
    pub fn stop(&self, handle: &RunHandle) {
        tracing::info!(run = handle.id, "stop requested");
        handle.shared.request_stop();
    }

    pub fn is_running(&self, handle: &RunHandle) -> bool {
        handle.is_running()
    }

    /// Stop the active run, if any, and wait for its reader to exit.
    pub fn shutdown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if active.shared.running.load(Ordering::SeqCst) {
            active.shared.request_stop();
        }
        if active.reader.join().is_err() {
            tracing::error!(run = active.id, "reader thread panicked");
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_success_needs_zero_exit() {
        let ok = RunOutcome {
            run_id: 1,
            reason: EndReason::Terminated,
            exit_code: Some(0),
        };
        assert!(ok.success());
        let failed = RunOutcome {
            exit_code: Some(3),
            ..ok.clone()
        };
        assert!(!failed.success());
        let broken = RunOutcome {
            reason: EndReason::StreamFailed("boom".into()),
            ..ok
        };
        assert!(!broken.success());
    }

    #[test]
    fn launch_failure_surfaces_before_any_reader() {
        let mut supervisor = Supervisor::default();
        let err = supervisor
            .start_run("/nonexistent/flowshop-solver", &["data.txt"])
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/flowshop-solver"));
        assert!(supervisor.store().is_empty());
    }

    #[test]
    fn best_from_result_keeps_variant() {
        let result = SolverResult {
            variant: "SA".into(),
            cmax: 812.0,
            permutation: vec![2, 0, 1],
        };
        let best = BestKnown::from(&result);
        assert_eq!(best.variant.as_deref(), Some("SA"));
        assert_eq!(best.sequence, vec![2, 0, 1]);
    }
}
