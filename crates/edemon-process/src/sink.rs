//! Destinations for echoed process output

use edemon_core::prelude::*;

/// Receives lines a [`ProcessInteraction`](crate::ProcessInteraction) chose to echo.
pub trait OutputSink: Send + Sync + 'static {
    /// A line classified as informational output.
    fn out(&self, line: &str);

    /// A line classified as error output.
    fn err(&self, line: &str);
}

/// Echo through `tracing` (`info` / `warn`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn out(&self, line: &str) {
        info!(target: "edemon_process::output", "{}", line);
    }

    fn err(&self, line: &str) {
        warn!(target: "edemon_process::output", "{}", line);
    }
}

/// Echo to the host's stdout / stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn out(&self, line: &str) {
        println!("{}", line);
    }

    fn err(&self, line: &str) {
        eprintln!("{}", line);
    }
}
