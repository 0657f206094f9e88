//! Configuration types for Emulator Demon
//!
//! Defines:
//! - `Settings` - Contents of `.edemon/config.toml`
//! - `EmulatorSettings`, `SdkSettings`, `TimeoutSettings` - its sections

use std::path::PathBuf;

use edemon_core::prelude::*;
use edemon_device::{BootTimeouts, EmulatorOptions, ToolOverrides};
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub emulator: EmulatorSettings,

    #[serde(default)]
    pub sdk: SdkSettings,

    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

/// `[emulator]`: what to boot
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmulatorSettings {
    /// AVD name
    #[serde(default)]
    pub avd: Option<String>,

    /// SD card image passed to `-sdcard`
    #[serde(default)]
    pub sdcard: Option<PathBuf>,

    /// Console port; the device registers as `emulator-<port>`
    #[serde(default)]
    pub console_port: Option<u16>,

    /// adb port, only used together with `console_port`
    #[serde(default)]
    pub adb_port: Option<u16>,

    /// Extra emulator options, e.g. "-no-window -no-audio"
    #[serde(default)]
    pub extra_options: Option<String>,
}

/// `[sdk]`: where the Android SDK tools live
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SdkSettings {
    /// SDK root, searched before ANDROID_HOME / ANDROID_SDK_ROOT
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub emulator: Option<PathBuf>,

    #[serde(default)]
    pub adb: Option<PathBuf>,
}

/// `[timeouts]`: budgets in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeoutSettings {
    /// Budget for the device to come online and finish booting
    #[serde(default = "default_boot_secs")]
    pub boot_secs: u64,

    /// Interval between readiness checks
    #[serde(default = "default_step_secs")]
    pub step_secs: u64,

    /// Budget for the device to disconnect on stop
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            boot_secs: default_boot_secs(),
            step_secs: default_step_secs(),
            shutdown_secs: default_shutdown_secs(),
        }
    }
}

fn default_boot_secs() -> u64 {
    120
}

fn default_step_secs() -> u64 {
    1
}

fn default_shutdown_secs() -> u64 {
    20
}

impl Settings {
    /// Reject settings that cannot work.
    ///
    /// `booting` additionally requires an AVD name.
    pub fn validate(&self, booting: bool) -> Result<()> {
        let t = &self.timeouts;
        if t.boot_secs == 0 || t.step_secs == 0 || t.shutdown_secs == 0 {
            return Err(Error::config_invalid("timeouts must be at least one second"));
        }
        if t.step_secs >= t.boot_secs {
            return Err(Error::config_invalid(format!(
                "step_secs ({}) must be shorter than boot_secs ({})",
                t.step_secs, t.boot_secs
            )));
        }
        if booting
            && self
                .emulator
                .avd
                .as_deref()
                .map_or(true, |avd| avd.trim().is_empty())
        {
            return Err(Error::config_invalid(
                "no AVD configured: pass --avd or set [emulator] avd",
            ));
        }
        Ok(())
    }

    /// Launch options for the configured AVD, if one is set.
    pub fn emulator_options(&self) -> Option<EmulatorOptions> {
        let emulator = &self.emulator;
        let avd = emulator.avd.as_deref()?.trim();
        if avd.is_empty() {
            return None;
        }
        Some(EmulatorOptions {
            avd: avd.to_string(),
            sdcard: emulator.sdcard.clone(),
            console_port: emulator.console_port,
            adb_port: emulator.adb_port,
            extra_options: emulator.extra_options.clone(),
        })
    }

    pub fn tool_overrides(&self) -> ToolOverrides {
        ToolOverrides {
            sdk_root: self.sdk.root.clone(),
            emulator: self.sdk.emulator.clone(),
            adb: self.sdk.adb.clone(),
        }
    }

    pub fn boot_timeouts(&self) -> BootTimeouts {
        BootTimeouts {
            boot_secs: self.timeouts.boot_secs,
            step_secs: self.timeouts.step_secs,
            shutdown_secs: self.timeouts.shutdown_secs,
        }
    }
}
