//! Operator-facing console output.
//!
//! Phase transitions and rendered status reports are written as plain lines through an
//! [`OutputSink`]. This is separate from `tracing`: these lines are the load test's
//! primary output and must appear regardless of `RUST_LOG`.

use std::io::Write;

/// Destination for human-readable output lines.
pub trait OutputSink: Send + Sync {
    fn println(&self, line: &str);
}

/// Writes each line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn println(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout is not worth aborting a load test over.
        let _ = writeln!(out, "{}", line);
    }
}
