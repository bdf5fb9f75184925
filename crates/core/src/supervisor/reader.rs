//! Pump threads and the per-run decode loop.

use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::sink::{LineSink, LineStatus, RawLine, StreamKind};
use super::{BestKnown, EndReason, RunOutcome, RunShared, RunUpdate, SupervisorConfig};
use crate::layout::layout;
use crate::model::{Iteration, SolverEvent};
use crate::store::{IterationStore, SlotArrival};
use crate::wire;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const REAP_POLL: Duration = Duration::from_millis(20);

pub(super) enum Feed {
    Line(StreamKind, String),
    Failed(StreamKind, String),
}

/// Forward lines of `pipe` into `tx` until EOF. Invalid UTF-8 is replaced,
/// and a trailing `\r\n` or `\n` is stripped.
pub(super) fn spawn_pump<R: Read + Send + 'static>(
    pipe: R,
    stream: StreamKind,
    tx: Sender<Feed>,
) -> std::io::Result<()> {
    let name = match stream {
        StreamKind::Stdout => "flowshop-stdout",
        StreamKind::Stderr => "flowshop-stderr",
    };
    thread::Builder::new().name(name.into()).spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\r', '\n']).to_string();
                    if tx.send(Feed::Line(stream, line)).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => {
                    let _ = tx.send(Feed::Failed(stream, err.to_string()));
                    break;
                }
            }
        }
    })?;
    Ok(())
}

pub(super) struct ReaderContext {
    pub run_id: u64,
    pub store: Arc<IterationStore>,
    pub shared: Arc<RunShared>,
    pub updates: Sender<RunUpdate>,
    pub sink: Box<dyn LineSink>,
    pub config: SupervisorConfig,
}

pub(super) fn run(mut ctx: ReaderContext, lines: &Receiver<Feed>) {
    let span = tracing::info_span!("reader", run = ctx.run_id);
    let _guard = span.enter();

    let reason = ctx.read_loop(lines);
    ctx.sink.flush();
    let exit_code = ctx.reap();
    let outcome = RunOutcome {
        run_id: ctx.run_id,
        reason,
        exit_code,
    };
    if outcome.success() {
        tracing::info!(reason = ?outcome.reason, "solver finished");
    } else {
        tracing::warn!(reason = ?outcome.reason, exit_code = ?outcome.exit_code, "solver run failed");
    }
    ctx.shared.running.store(false, Ordering::SeqCst);
    let _ = ctx.updates.send(RunUpdate::Finished(outcome));
}

impl ReaderContext {
    fn read_loop(&mut self, lines: &Receiver<Feed>) -> EndReason {
        let mut seq = 0u64;
        let mut drain_deadline: Option<Instant> = None;
        loop {
            if drain_deadline.is_none() && self.shared.stop_requested() {
                drain_deadline = Some(Instant::now() + self.config.grace_period);
            }
            match lines.recv_timeout(POLL_INTERVAL) {
                Ok(Feed::Line(stream, text)) => {
                    let terminate = self.handle_line(seq, stream, text);
                    seq += 1;
                    if terminate {
                        if self.config.follow_after_end {
                            tracing::debug!("END received, following until EOF");
                        } else {
                            return EndReason::Terminated;
                        }
                    }
                }
                Ok(Feed::Failed(stream, message)) => {
                    tracing::error!(?stream, error = %message, "reading solver output failed");
                    return EndReason::StreamFailed(message);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if drain_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        tracing::debug!("drain window elapsed after stop");
                        return EndReason::Stopped;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return if self.shared.stop_requested() {
                        EndReason::Stopped
                    } else {
                        EndReason::EndOfStream
                    };
                }
            }
        }
    }

    /// Decode, record and dispatch one line. Returns `true` for `END`.
    fn handle_line(&mut self, seq: u64, stream: StreamKind, text: String) -> bool {
        let decoded = wire::decode(&text);
        let status = match &decoded {
            Ok(event) => LineStatus::Decoded {
                kind: event.kind().to_string(),
            },
            Err(err) => LineStatus::Failed {
                error: err.to_string(),
            },
        };
        let raw = RawLine {
            seq,
            received_at: Utc::now(),
            stream,
            text,
            status,
        };
        self.sink.record(&raw);

        match decoded {
            Ok(SolverEvent::Terminate) => true,
            Ok(event) => {
                self.dispatch(event);
                false
            }
            Err(error) => {
                tracing::warn!(seq, %error, "discarding malformed line");
                self.send(RunUpdate::DecodeFailed {
                    line: raw.text,
                    error,
                });
                false
            }
        }
    }

    fn dispatch(&self, event: SolverEvent) {
        match event {
            SolverEvent::Slot(slot) => {
                let iteration = slot.iteration;
                if self.store.append(slot) == SlotArrival::Late {
                    tracing::debug!(%iteration, "late slot for completed frame");
                }
            }
            SolverEvent::FrameEnd { iteration } => self.publish_frame(iteration),
            SolverEvent::Progress(progress) => {
                self.shared.set_best(BestKnown::from(&progress));
                self.send(RunUpdate::Progress(progress));
            }
            SolverEvent::Choice(choice) => self.send(RunUpdate::Choice(choice)),
            SolverEvent::Result(result) => {
                tracing::info!(variant = %result.variant, cmax = result.cmax, "phase result");
                let best = BestKnown::from(&result);
                self.shared.set_best(best.clone());
                self.send(RunUpdate::Best(best));
            }
            SolverEvent::ErrorNotice { message } => {
                tracing::warn!(%message, "solver reported an error");
                self.send(RunUpdate::Warning(message));
            }
            SolverEvent::RawLog { .. } | SolverEvent::Terminate => {}
        }
    }

    fn publish_frame(&self, iteration: Iteration) {
        let slots = self.store.mark_complete(iteration);
        let mut model = self.store.with_colors(|colors| layout(&slots, colors));
        model.iteration = Some(iteration);
        tracing::debug!(%iteration, slots = slots.len(), "frame complete");
        self.send(RunUpdate::Layout(model));
    }

    fn send(&self, update: RunUpdate) {
        // A dropped handle only means nobody is watching.
        let _ = self.updates.send(update);
    }

    /// Wait for the child to exit. Only a stopped child is killed, once the
    /// grace period has run out.
    fn reap(&self) -> Option<i32> {
        let mut kill_at: Option<Instant> = None;
        loop {
            match self.shared.child().try_wait() {
                Ok(Some(status)) => return status.code(),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(error = %err, "waiting for solver failed");
                    return None;
                }
            }
            if self.shared.stop_requested() {
                let deadline =
                    *kill_at.get_or_insert_with(|| Instant::now() + self.config.grace_period);
                if Instant::now() >= deadline {
                    break;
                }
            }
            thread::sleep(REAP_POLL);
        }
        tracing::warn!("solver did not exit in time, killing it");
        let mut child = self.shared.child();
        let _ = child.kill();
        child.wait().ok().and_then(|status| status.code())
    }
}
