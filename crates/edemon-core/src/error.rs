//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid time unit {unit}: deadlines are polled in whole seconds")]
    InvalidTimeUnit { unit: String },

    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("Required tool not found: {tool}. Set ANDROID_HOME or configure [sdk] paths.")]
    ToolNotFound { tool: String },

    // ─────────────────────────────────────────────────────────────
    // Process Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid process interaction: {message}")]
    InvalidInteraction { message: String },

    #[error("Failed to launch `{command}`{}: {reason}", interrupted_suffix(.interrupted))]
    ProcessLaunch {
        command: String,
        reason: String,
        interrupted: bool,
    },

    #[error("`{command}` exited with code {code:?}")]
    ProcessExit { command: String, code: Option<i32> },

    #[error("`{command}` has not finished yet, exit code is not available")]
    ProcessNotFinished { command: String },

    #[error("Process error: {message}")]
    Process { message: String },

    // ─────────────────────────────────────────────────────────────
    // Device Errors
    // ─────────────────────────────────────────────────────────────
    #[error("AVD '{name}' not found. Available: [{}]", join_names(.available))]
    AvdNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error(
        "Emulator for AVD '{avd}' never came online within {waited_secs}s \
         (the emulator binary most likely failed to start the device)"
    )]
    DeviceNeverOnline { avd: String, waited_secs: u64 },

    #[error(
        "Device {serial} came online but did not finish booting within {waited_secs}s \
         (sys.boot_completed was never set)"
    )]
    BootIncomplete { serial: String, waited_secs: u64 },

    #[error("Device {serial} did not disconnect within {waited_secs}s")]
    DeviceNeverDisconnected { serial: String, waited_secs: u64 },

    #[error("Device bridge error: {message}")]
    Bridge { message: String },
}

fn interrupted_suffix(interrupted: &bool) -> &'static str {
    if *interrupted {
        " (interrupted)"
    } else {
        ""
    }
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    pub fn invalid_interaction(message: impl Into<String>) -> Self {
        Self::InvalidInteraction {
            message: message.into(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge {
            message: message.into(),
        }
    }

    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Wrap an I/O error raised while launching `command`.
    pub fn launch(command: impl Into<String>, err: &std::io::Error) -> Self {
        Self::ProcessLaunch {
            command: command.into(),
            reason: err.to_string(),
            interrupted: err.kind() == std::io::ErrorKind::Interrupted,
        }
    }

    /// Check if this error should trigger application exit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound { .. }
                | Error::ProcessLaunch { .. }
                | Error::AvdNotFound { .. }
                | Error::DeviceNeverOnline { .. }
                | Error::BootIncomplete { .. }
                | Error::ConfigNotFound { .. }
                | Error::ConfigInvalid { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }
}
