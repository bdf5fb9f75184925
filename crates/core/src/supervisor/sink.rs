//! Audit trail of every raw line a run produced.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipe a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// What the decoder made of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LineStatus {
    Decoded { kind: String },
    Failed { error: String },
}

/// One line of child output as it was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    /// Arrival order within the run, starting at 0.
    pub seq: u64,
    pub received_at: DateTime<Utc>,
    pub stream: StreamKind,
    pub text: String,
    #[serde(flatten)]
    pub status: LineStatus,
}

/// Destination for raw lines. Called on the reader thread before the
/// decoded event is dispatched.
pub trait LineSink: Send {
    fn record(&mut self, line: &RawLine);

    fn flush(&mut self) {}
}

/// Emits every line as a `trace` event under the `flowshop::wire` target.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn record(&mut self, line: &RawLine) {
        match &line.status {
            LineStatus::Decoded { kind } => tracing::trace!(
                target: "flowshop::wire",
                seq = line.seq,
                stream = ?line.stream,
                kind = %kind,
                "{}",
                line.text
            ),
            LineStatus::Failed { error } => tracing::trace!(
                target: "flowshop::wire",
                seq = line.seq,
                stream = ?line.stream,
                error = %error,
                "{}",
                line.text
            ),
        }
    }
}

/// Writes one JSON object per line.
///
/// After the first write error the sink goes quiet; the run itself is not
/// affected.
#[derive(Debug)]
pub struct JsonlSink<W: Write + Send> {
    writer: W,
    broken: bool,
}

impl<W: Write + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            broken: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> LineSink for JsonlSink<W> {
    fn record(&mut self, line: &RawLine) {
        if self.broken {
            return;
        }
        let written = serde_json::to_writer(&mut self.writer, line)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(err) = written {
            tracing::warn!(error = %err, "transcript write failed, disabling transcript");
            self.broken = true;
        }
    }

    fn flush(&mut self) {
        if !self.broken {
            let _ = self.writer.flush();
        }
    }
}
