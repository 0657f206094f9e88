//! # edemon-process - Process Supervision
//!
//! Spawns external tools, consumes their merged stdout/stderr one character at
//! a time, answers prompts on their stdin, and bounds waits on external
//! conditions with a [`edemon_core::Deadline`].
//!
//! Depends on [`edemon_core`] for error handling and deadlines.
//!
//! ## Public API
//!
//! ### Commands
//! - [`CommandLine`] - Ordered, trimmed, non-empty tokens
//! - [`ProcessOptions`] - Environment and working directory for a spawn
//!
//! ### Interaction Policies
//! - [`ProcessInteraction`] - Reply rules plus output classification
//! - [`ProcessInteractionBuilder`] - Validating builder
//! - [`Answer`], [`AnswerKind`] - What gets written back to a process
//!
//! ### Supervision
//! - [`ProcessExecutor`] - `spawn`, `execute`, `schedule_until_true`, `shutdown`
//! - [`ProcessExecution`] - Handle to one spawned process
//! - [`CleanupRegistry`] - Processes to force-terminate on shutdown
//!
//! ### Output
//! - [`OutputSink`] - Destination for echoed lines
//! - [`TracingSink`], [`StdioSink`] - Built-in sinks

pub mod answer;
pub mod command;
pub mod execution;
pub mod executor;
pub mod interaction;
mod interaction_loop;
pub mod registry;
pub mod sentence;
pub mod sink;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use answer::{Answer, AnswerKind};
pub use command::{CommandLine, ProcessOptions};
pub use execution::{ProcessExecution, ProcessId, SIGNALLED_EXIT_CODE};
pub use executor::ProcessExecutor;
pub use interaction::{ProcessInteraction, ProcessInteractionBuilder};
pub use registry::CleanupRegistry;
pub use sentence::Sentence;
pub use sink::{OutputSink, StdioSink, TracingSink};
