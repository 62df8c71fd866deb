//! Output events and their `text/event-stream` framing

use std::fmt;

/// What an [`OutputEvent`] carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Stdout,
    Stderr,
    /// The program asked for the screen to be cleared
    Clear,
    Error,
    Timeout,
    Done,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Stdout => "stdout",
            EventKind::Stderr => "stderr",
            EventKind::Clear => "clear",
            EventKind::Error => "error",
            EventKind::Timeout => "timeout",
            EventKind::Done => "done",
        }
    }

    /// Whether this kind ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Error | EventKind::Timeout | EventKind::Done)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of streamed output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub kind: EventKind,
    pub payload: String,
}

impl OutputEvent {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn stdout(line: impl Into<String>) -> Self {
        Self::new(EventKind::Stdout, line)
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        Self::new(EventKind::Stderr, line)
    }

    pub fn clear() -> Self {
        Self::new(EventKind::Clear, "")
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(EventKind::Timeout, message)
    }

    pub fn done(message: impl Into<String>) -> Self {
        Self::new(EventKind::Done, message)
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Encode as a server-sent event frame
    ///
    /// A payload spanning several lines gets one `data:` field per line.
    pub fn to_frame(&self) -> String {
        let mut frame = format!("event:{}\n", self.kind);
        for line in self.payload.split('\n') {
            frame.push_str("data:");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }
}
