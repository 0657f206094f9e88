//! Handles to spawned processes

use std::fmt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::answer::Answer;
use crate::command::CommandLine;
use edemon_core::prelude::*;

/// How long [`ProcessExecution::wait`] keeps draining output after exit.
///
/// Grandchildren (the emulator's qemu, adb's server) can inherit the output
/// pipes and keep them open long after the direct child exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Exit code reported for a process terminated by a signal.
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// Global process id counter
static PROCESS_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Supervisor-assigned identity of a spawned process.
///
/// Unlike the OS pid this is never reused within one host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u64);

impl ProcessId {
    pub(crate) fn next() -> Self {
        Self(PROCESS_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared, append-only log of completed output lines.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl OutputLog {
    pub(crate) fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Channels connecting a [`ProcessExecution`] to its background tasks.
pub(crate) struct ExecutionChannels {
    pub(crate) reply_tx: mpsc::UnboundedSender<Answer>,
    pub(crate) kill_tx: mpsc::Sender<()>,
    pub(crate) exit_rx: watch::Receiver<Option<ExitStatus>>,
    pub(crate) output_done_rx: watch::Receiver<bool>,
    pub(crate) input_open: Arc<AtomicBool>,
}

/// A spawned external process.
///
/// Cloning is cheap; all clones observe the same process. Output lines are
/// appended by the interaction loop in the order the process produced them.
#[derive(Debug, Clone)]
pub struct ProcessExecution {
    id: ProcessId,
    pid: Option<u32>,
    command: CommandLine,
    output: OutputLog,
    reply_tx: mpsc::UnboundedSender<Answer>,
    kill_tx: mpsc::Sender<()>,
    exit_rx: watch::Receiver<Option<ExitStatus>>,
    output_done_rx: watch::Receiver<bool>,
    input_open: Arc<AtomicBool>,
}

impl ProcessExecution {
    pub(crate) fn new(
        id: ProcessId,
        pid: Option<u32>,
        command: CommandLine,
        output: OutputLog,
        channels: ExecutionChannels,
    ) -> Self {
        Self {
            id,
            pid,
            command,
            output,
            reply_tx: channels.reply_tx,
            kill_tx: channels.kill_tx,
            exit_rx: channels.exit_rx,
            output_done_rx: channels.output_done_rx,
            input_open: channels.input_open,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// OS process id, if the platform reported one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    /// Completed output lines so far, trimmed of line terminators.
    pub fn output(&self) -> Vec<String> {
        self.output.snapshot()
    }

    pub fn output_line_count(&self) -> usize {
        self.output.len()
    }

    /// Whether any completed line contains `needle`.
    pub fn output_contains(&self, needle: &str) -> bool {
        self.output.snapshot().iter().any(|line| line.contains(needle))
    }

    /// Whether the process's input still accepts replies.
    ///
    /// False from the start for an interaction without reply rules.
    pub fn is_input_open(&self) -> bool {
        self.input_open.load(Ordering::SeqCst)
    }

    /// Queue an answer for the interaction loop, which owns the process's input.
    ///
    /// Fails with [`Error::ChannelSend`] once the input is closed. A reply
    /// queued just as the loop closes the input is dropped and logged.
    ///
    /// A queued [`Answer::EOF`] only closes the input; output keeps being
    /// read until the process closes it. An `EOF` produced by a reply rule
    /// also stops reading.
    pub fn write_reply(&self, answer: Answer) -> Result<()> {
        if !self.is_input_open() {
            return Err(self.input_closed());
        }
        self.reply_tx.send(answer).map_err(|_| self.input_closed())
    }

    fn input_closed(&self) -> Error {
        Error::channel_send(format!("input of {} is closed", self.command))
    }

    /// Whether the process has exited.
    pub fn is_finished(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Exit code of a finished process.
    ///
    /// Fails with [`Error::ProcessNotFinished`] while the process runs.
    /// A process terminated by a signal reports [`SIGNALLED_EXIT_CODE`].
    pub fn exit_code(&self) -> Result<i32> {
        match *self.exit_rx.borrow() {
            Some(status) => Ok(status.code().unwrap_or(SIGNALLED_EXIT_CODE)),
            None => Err(Error::ProcessNotFinished {
                command: self.command.to_string(),
            }),
        }
    }

    /// `exit_code() != 0`, with the same precondition as [`exit_code`](Self::exit_code).
    pub fn execution_failed(&self) -> Result<bool> {
        self.exit_code().map(|code| code != 0)
    }

    /// Wait for the process to exit and its output to be consumed.
    pub async fn wait(&self) -> Result<i32> {
        let mut exit_rx = self.exit_rx.clone();
        let status = *exit_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::ChannelClosed)?;

        if tokio::time::timeout(OUTPUT_DRAIN_GRACE, self.output_closed())
            .await
            .is_err()
        {
            debug!(
                "{} {} exited but its output is still open, not waiting for it",
                self.id, self.command
            );
        }

        Ok(status
            .and_then(|status| status.code())
            .unwrap_or(SIGNALLED_EXIT_CODE))
    }

    /// Wait until the interaction loop stopped reading output.
    ///
    /// This happens at end of stream or after an [`Answer::EOF`] reply, which
    /// may be long before the process exits.
    pub async fn output_closed(&self) {
        let mut done_rx = self.output_done_rx.clone();
        // A dropped sender means the loop is gone, which is just as final.
        let _ = done_rx.wait_for(|done| *done).await;
    }

    /// Ask the supervisor task to force-terminate the process.
    pub fn kill(&self) {
        // Full or closed channel: a kill is already pending or the process is reaped.
        let _ = self.kill_tx.try_send(());
    }
}
