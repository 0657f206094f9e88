//! Test utilities for process supervision
//!
//! Provides a recording [`OutputSink`] and helpers for building `sh -c` commands.

use std::sync::{Arc, Mutex};

use crate::command::CommandLine;
use crate::sink::OutputSink;

/// Records every echoed line.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    out: Arc<Mutex<Vec<String>>>,
    err: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines echoed to the informational output so far.
    pub fn out_lines(&self) -> Vec<String> {
        self.out.lock().unwrap().clone()
    }

    /// Lines echoed to the error output so far.
    pub fn err_lines(&self) -> Vec<String> {
        self.err.lock().unwrap().clone()
    }
}

impl OutputSink for CollectingSink {
    fn out(&self, line: &str) {
        self.out.lock().unwrap().push(line.to_string());
    }

    fn err(&self, line: &str) {
        self.err.lock().unwrap().push(line.to_string());
    }
}

/// `sh -c <script>` as a command line.
pub fn sh(script: &str) -> CommandLine {
    // Built token by token: `parse` would split the script on whitespace.
    CommandLine::new("sh").arg("-c").arg(script)
}
