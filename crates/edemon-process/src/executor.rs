//! Process supervisor
//!
//! [`ProcessExecutor`] spawns external processes, drives their interaction
//! loops, and offers [`ProcessExecutor::schedule_until_true`], the bounded
//! polling primitive every device wait is built on.
//!
//! Each spawned process gets three background tasks:
//! 1. two pumps copying stdout and stderr into one merged channel
//! 2. the [`InteractionLoop`] consuming that channel and owning stdin
//! 3. a wait task owning the `Child`, reaping it or force-killing it on request

use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::command::{CommandLine, ProcessOptions};
use crate::execution::{ExecutionChannels, OutputLog, ProcessExecution, ProcessId};
use crate::interaction::ProcessInteraction;
use crate::interaction_loop::{pump, InteractionLoop};
use crate::registry::CleanupRegistry;
use crate::sink::{OutputSink, TracingSink};
use edemon_core::prelude::*;
use edemon_core::{Deadline, TimeUnit};

/// Capacity of the merged stdout/stderr chunk channel.
const OUTPUT_CHANNEL_CAPACITY: usize = 64;

/// Spawns and supervises external processes.
///
/// Cloning is cheap; clones share the cleanup registry.
#[derive(Clone)]
pub struct ProcessExecutor {
    registry: CleanupRegistry,
    sink: Arc<dyn OutputSink>,
    options: ProcessOptions,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessExecutor")
            .field("registered", &self.registry.len())
            .field("options", &self.options)
            .finish()
    }
}

impl ProcessExecutor {
    /// Executor echoing through `tracing`, inheriting the host environment.
    pub fn new() -> Self {
        Self::with_sink(TracingSink)
    }

    pub fn with_sink(sink: impl OutputSink) -> Self {
        Self {
            registry: CleanupRegistry::new(),
            sink: Arc::new(sink),
            options: ProcessOptions::default(),
        }
    }

    /// Default options applied by [`spawn`](Self::spawn) and [`execute`](Self::execute).
    #[must_use]
    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    pub fn registry(&self) -> &CleanupRegistry {
        &self.registry
    }

    /// Run a unit of work on the shared runtime.
    pub fn submit<F>(&self, work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(work)
    }

    /// Start `command` and return immediately.
    ///
    /// The process stays registered for cleanup until [`unregister`](Self::unregister)
    /// is called or the executor shuts down.
    pub fn spawn(
        &self,
        interaction: ProcessInteraction,
        command: &CommandLine,
    ) -> Result<ProcessExecution> {
        self.spawn_with(interaction, command, &self.options)
    }

    /// [`spawn`](Self::spawn) with explicit options.
    pub fn spawn_with(
        &self,
        interaction: ProcessInteraction,
        command: &CommandLine,
        options: &ProcessOptions,
    ) -> Result<ProcessExecution> {
        let program = command
            .program()
            .ok_or_else(|| Error::process("cannot spawn an empty command line"))?;

        let id = ProcessId::next();
        info!("Spawning {}: {}", id, command);

        let mut cmd = Command::new(program);
        cmd.args(command.arguments())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true); // Last line of defence if the wait task is dropped
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &options.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::launch(command.to_string(), &e))?;

        let pid = child.id();
        debug!("{} started with PID: {:?}", id, pid);

        // Merge stdout and stderr so replies can follow prompts on either stream
        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, chunk_tx.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, chunk_tx.clone(), "stderr"));
        }
        drop(chunk_tx);

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = mpsc::channel::<()>(1);
        let (exit_tx, exit_rx) = watch::channel::<Option<ExitStatus>>(None);
        let (output_done_tx, output_done_rx) = watch::channel(false);

        let output = OutputLog::default();
        let label = format!("{} {}", id, program);
        // Without reply rules the loop closes stdin as soon as it starts
        let input_open = Arc::new(AtomicBool::new(
            interaction.requires_input_interaction() && child.stdin.is_some(),
        ));

        let interaction_loop = InteractionLoop {
            label: label.clone(),
            interaction: Arc::new(interaction),
            sink: Arc::clone(&self.sink),
            output: output.clone(),
            input_open: Arc::clone(&input_open),
        };
        tokio::spawn(interaction_loop.run(chunk_rx, child.stdin.take(), reply_rx, output_done_tx));
        tokio::spawn(wait_for_exit(child, kill_rx, exit_tx, label));

        let execution = ProcessExecution::new(
            id,
            pid,
            command.clone(),
            output,
            ExecutionChannels {
                reply_tx,
                kill_tx,
                exit_rx,
                output_done_rx,
                input_open,
            },
        );
        self.registry.register(&execution);

        Ok(execution)
    }

    /// Start `command` and wait for it to finish.
    ///
    /// A non-zero exit code fails with [`Error::ProcessExit`]. The finished
    /// process is removed from the cleanup registry either way.
    pub async fn execute(
        &self,
        interaction: ProcessInteraction,
        command: &CommandLine,
    ) -> Result<ProcessExecution> {
        self.execute_with(interaction, command, &self.options).await
    }

    /// [`execute`](Self::execute) with explicit options.
    pub async fn execute_with(
        &self,
        interaction: ProcessInteraction,
        command: &CommandLine,
        options: &ProcessOptions,
    ) -> Result<ProcessExecution> {
        let execution = self.spawn_with(interaction, command, options)?;
        let code = execution.wait().await;
        self.registry.unregister(execution.id());

        match code? {
            0 => Ok(execution),
            code => {
                debug!(
                    "{} failed with code {}, last output: {:?}",
                    command,
                    code,
                    execution.output().last()
                );
                Err(Error::ProcessExit {
                    command: command.to_string(),
                    code: Some(code),
                })
            }
        }
    }

    /// Evaluate `condition` every `step` until it returns true or `timeout` elapses.
    ///
    /// Both amounts are in `unit`, which must be whole seconds or coarser.
    /// Returns `Ok(false)` when the deadline passes; a deadline is not an error.
    pub async fn schedule_until_true<F, Fut>(
        &self,
        condition: F,
        timeout: u64,
        step: u64,
        unit: TimeUnit,
    ) -> Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let deadline = Deadline::new(timeout, unit)?;
        Ok(self
            .poll_until(&deadline, unit.to_duration(step.max(1)), condition)
            .await)
    }

    /// Polling against an existing deadline, so several phases can share one budget.
    ///
    /// Each evaluation runs as its own task and is awaited for at most the
    /// remaining budget. An evaluation still running at the deadline is left
    /// to finish on its own and its result is discarded.
    pub async fn poll_until<F, Fut>(
        &self,
        deadline: &Deadline,
        step: Duration,
        mut condition: F,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut ticker = tokio::time::interval(step.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts = 0u32;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::time::sleep(deadline.remaining()) => {}
            }
            if deadline.is_expired() {
                debug!("Deadline elapsed after {} checks", attempts);
                return false;
            }

            attempts += 1;
            let check = self.submit(condition());

            match tokio::time::timeout(deadline.remaining(), check).await {
                Ok(Ok(true)) => {
                    debug!(
                        "Condition met after {} checks ({:?})",
                        attempts,
                        deadline.elapsed()
                    );
                    return true;
                }
                Ok(Ok(false)) => trace!("Check {} returned false", attempts),
                Ok(Err(e)) => warn!("Check {} failed: {}", attempts, e),
                Err(_) => {
                    debug!("Deadline elapsed while check {} was running", attempts);
                    return false;
                }
            }
        }
    }

    /// Track `execution` for forced termination on shutdown.
    pub fn register_for_cleanup(&self, execution: &ProcessExecution) {
        self.registry.register(execution);
    }

    /// Take over responsibility for a process; shutdown will no longer kill it.
    pub fn unregister(&self, id: ProcessId) -> bool {
        self.registry.unregister(id)
    }

    /// Force-terminate and reap every registered process.
    pub async fn shutdown(&self) {
        let count = self.registry.terminate_all().await;
        if count > 0 {
            info!("Terminated {} running process(es) on shutdown", count);
        }
    }
}

/// Background task: owns `child`, waits for it to exit, publishes the status.
///
/// Two ways the task can end:
/// 1. The process exits naturally: `child.wait()` resolves.
/// 2. `kill_rx` fires: kill the child first, then wait for it.
async fn wait_for_exit(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<()>,
    exit_tx: watch::Sender<Option<ExitStatus>>,
    label: String,
) {
    let status = tokio::select! {
        // Natural exit path
        result = child.wait() => result,
        // Force-kill path
        Some(()) = kill_rx.recv() => {
            info!("{}: kill requested", label);
            if let Err(e) = child.kill().await {
                error!("{}: failed to kill: {}", label, e);
            }
            child.wait().await
        }
    };

    match status {
        Ok(status) => {
            debug!("{} exited with status: {:?}", label, status);
            let _ = exit_tx.send(Some(status));
        }
        Err(e) => {
            // Dropping exit_tx wakes waiters with a closed-channel error
            error!("{}: error waiting for process: {}", label, e);
        }
    }
}
