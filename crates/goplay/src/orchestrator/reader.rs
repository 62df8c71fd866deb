//! Pipe readers
//!
//! Each runner pipe gets one reader task. Bytes are framed into lines
//! (`\n` and `\r` end a line, form feed clears the screen), turned into
//! events and pushed into the request's channel.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::orchestrator::event::{EventKind, OutputEvent};
use crate::orchestrator::filter::OutputFilter;
use crate::sandbox::{ProcessKiller, is_stats_line};
use crate::types::ExecutionStats;

const READ_BUFFER_SIZE: usize = 4096;

const FORM_FEED: u8 = 0x0c;

/// A unit produced by [`LineFramer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    Clear,
}

/// Byte-level line splitter
///
/// Keeps the unterminated tail between chunks, so multi-byte characters and
/// terminators split across reads come out whole. Empty lines are dropped.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' | b'\r' => frames.extend(self.take_line()),
                FORM_FEED => {
                    frames.extend(self.take_line());
                    frames.push(Frame::Clear);
                }
                _ => self.pending.push(byte),
            }
        }
        frames
    }

    /// Flush the unterminated tail at EOF
    pub fn finish(&mut self) -> Option<Frame> {
        self.take_line()
    }

    fn take_line(&mut self) -> Option<Frame> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(Frame::Line(line))
    }
}

/// How a reader ended
#[derive(Debug, Default)]
pub struct ReaderOutcome {
    /// Last stats line seen on stderr
    pub stats: Option<ExecutionStats>,

    /// The caller went away while the reader was running
    pub disconnected: bool,
}

/// Forwards one pipe into the event channel
pub struct StreamReader {
    kind: EventKind,
    tx: mpsc::Sender<OutputEvent>,
    killer: ProcessKiller,
    filter: Option<Arc<OutputFilter>>,
    outcome: ReaderOutcome,
}

impl StreamReader {
    pub fn new(kind: EventKind, tx: mpsc::Sender<OutputEvent>, killer: ProcessKiller) -> Self {
        Self {
            kind,
            tx,
            killer,
            filter: None,
            outcome: ReaderOutcome::default(),
        }
    }

    /// Filter lines and pick out stats lines (used for stderr)
    pub fn with_filter(mut self, filter: Arc<OutputFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Read until EOF, disconnect or kill
    ///
    /// A disconnect kills the process group; nothing is sent afterwards.
    pub async fn run<R>(mut self, mut pipe: R) -> ReaderOutcome
    where
        R: AsyncRead + Unpin,
    {
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let read = tokio::select! {
                biased;
                _ = self.tx.closed() => {
                    self.disconnect();
                    return self.outcome;
                }
                read = pipe.read(&mut buf) => read,
            };

            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(kind = %self.kind, error = %e, "failed to read runner output");
                    break;
                }
            };

            for frame in framer.push(&buf[..n]) {
                if !self.emit(frame).await {
                    return self.outcome;
                }
            }
        }

        if let Some(frame) = framer.finish() {
            self.emit(frame).await;
        }
        self.outcome
    }

    /// Send one frame; `false` once the reader should stop
    async fn emit(&mut self, frame: Frame) -> bool {
        let event = match frame {
            Frame::Clear => OutputEvent::clear(),
            Frame::Line(line) => match self.prepare_line(&line) {
                Some(payload) => OutputEvent::new(self.kind, payload),
                None => return true,
            },
        };

        // Once the group is killed only the terminal event may follow
        if self.killer.is_killed() {
            return false;
        }

        if self.tx.send(event).await.is_err() {
            self.disconnect();
            return false;
        }
        true
    }

    fn prepare_line(&mut self, line: &str) -> Option<String> {
        let Some(filter) = &self.filter else {
            return Some(line.to_owned());
        };

        if is_stats_line(line) {
            match ExecutionStats::parse_line(line) {
                Ok(stats) => self.outcome.stats = stats,
                Err(e) => debug!(error = %e, "ignoring malformed stats line"),
            }
            return None;
        }
        filter.apply(line)
    }

    fn disconnect(&mut self) {
        debug!(kind = %self.kind, "caller disconnected");
        self.outcome.disconnected = true;
        self.killer.kill();
    }
}
