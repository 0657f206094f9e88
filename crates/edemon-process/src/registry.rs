//! Cleanup registry for spawned processes
//!
//! Every spawned process is registered here until its owner adopts it. The
//! host application calls [`CleanupRegistry::terminate_all`] (through
//! [`ProcessExecutor::shutdown`](crate::ProcessExecutor::shutdown)) before
//! exiting so no emulator or adb child outlives it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::execution::{ProcessExecution, ProcessId};
use edemon_core::prelude::*;

/// How long to wait for a killed process to be reaped.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Concurrency-safe map of live processes to terminate on shutdown.
#[derive(Debug, Clone, Default)]
pub struct CleanupRegistry {
    entries: Arc<Mutex<HashMap<ProcessId, ProcessExecution>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProcessId, ProcessExecution>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track `execution` for forced termination.
    pub fn register(&self, execution: &ProcessExecution) {
        trace!("Registering {} for cleanup", execution.id());
        self.lock().insert(execution.id(), execution.clone());
    }

    /// Stop tracking a process; its owner manages it from now on.
    ///
    /// Returns whether the process was registered.
    pub fn unregister(&self, id: ProcessId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            trace!("Unregistered {} from cleanup", id);
        }
        removed
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Kill and reap every registered process. Returns how many were still running.
    pub async fn terminate_all(&self) -> usize {
        let executions: Vec<ProcessExecution> = self.lock().drain().map(|(_, e)| e).collect();
        let mut terminated = 0;

        for execution in executions {
            if execution.is_finished() {
                continue;
            }

            info!(
                "Terminating {} (pid {:?}): {}",
                execution.id(),
                execution.pid(),
                execution.command()
            );
            execution.kill();
            terminated += 1;

            match tokio::time::timeout(KILL_WAIT, execution.wait()).await {
                Ok(Ok(code)) => debug!("{} terminated with code {}", execution.id(), code),
                Ok(Err(e)) => warn!("Lost track of {} while terminating: {}", execution.id(), e),
                Err(_) => warn!(
                    "{} did not exit within {:?} after kill",
                    execution.id(),
                    KILL_WAIT
                ),
            }
        }

        terminated
    }
}
