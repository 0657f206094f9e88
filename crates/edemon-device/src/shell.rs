//! `adb -s SERIAL ...` commands against one device

use std::path::{Path, PathBuf};

use edemon_core::prelude::*;
use edemon_process::{CommandLine, ProcessExecutor, ProcessInteraction};

/// `getprop` line printed once the OS finished booting
pub const BOOT_COMPLETED_MARKER: &str = "[sys.boot_completed]: [1]";

/// Key events sent by [`DeviceShell::unlock`]: menu (dismisses the keyguard), then back
const UNLOCK_KEY_EVENTS: [&str; 2] = ["82", "4"];

/// Runs `adb` commands against a single device through a [`ProcessExecutor`].
#[derive(Debug, Clone)]
pub struct DeviceShell {
    executor: ProcessExecutor,
    adb: PathBuf,
    serial: String,
}

impl DeviceShell {
    pub fn new(executor: ProcessExecutor, adb: impl Into<PathBuf>, serial: impl Into<String>) -> Self {
        Self {
            executor,
            adb: adb.into(),
            serial: serial.into(),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn adb(&self) -> &Path {
        &self.adb
    }

    /// `adb -s SERIAL <args>`
    pub fn command<I, S>(&self, args: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        CommandLine::new(self.adb.to_string_lossy())
            .arg("-s")
            .arg(&self.serial)
            .args(args)
    }

    /// Run `adb -s SERIAL shell <args>` to completion, returning its output lines.
    pub async fn shell<I, S>(&self, args: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let command = self.command(["shell"]).args(args);
        let execution = self
            .executor
            .execute(ProcessInteraction::silent(), &command)
            .await?;
        Ok(execution.output())
    }

    /// All system properties, one `[key]: [value]` per line.
    pub async fn getprop(&self) -> Result<Vec<String>> {
        self.shell(["getprop"]).await
    }

    /// Whether `getprop` reports the boot as completed. Any failure counts as "not yet".
    pub async fn is_boot_completed(&self) -> bool {
        match self.getprop().await {
            Ok(props) => props.iter().any(|line| line.trim() == BOOT_COMPLETED_MARKER),
            Err(e) => {
                debug!("{}: getprop failed: {}", self.serial, e);
                false
            }
        }
    }

    /// Best-effort keyguard dismissal. Failures are logged and swallowed.
    pub async fn unlock(&self) {
        for key in UNLOCK_KEY_EVENTS {
            if let Err(e) = self.shell(["input", "keyevent", key]).await {
                debug!("{}: unlock key event {} failed: {}", self.serial, key, e);
            }
        }
    }

    /// Ask the emulator console to shut the emulator down.
    pub async fn emu_kill(&self) -> Result<()> {
        self.executor
            .execute(ProcessInteraction::silent(), &self.command(["emu", "kill"]))
            .await
            .map(|_| ())
    }
}
