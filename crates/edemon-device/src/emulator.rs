//! Emulator command line construction

use std::path::{Path, PathBuf};

use edemon_core::prelude::*;
use edemon_process::{CommandLine, ProcessInteraction};

use crate::discovery::DeviceFilter;

/// How to launch one emulator instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmulatorOptions {
    /// AVD name passed to `-avd`
    pub avd: String,
    pub sdcard: Option<PathBuf>,
    pub console_port: Option<u16>,
    pub adb_port: Option<u16>,
    /// Free-form options appended as-is, split on whitespace
    pub extra_options: Option<String>,
}

impl EmulatorOptions {
    pub fn new(avd: impl Into<String>) -> Self {
        Self {
            avd: avd.into(),
            ..Default::default()
        }
    }

    pub fn sdcard(mut self, path: impl Into<PathBuf>) -> Self {
        self.sdcard = Some(path.into());
        self
    }

    pub fn ports(mut self, console: Option<u16>, adb: Option<u16>) -> Self {
        self.console_port = console;
        self.adb_port = adb;
        self
    }

    pub fn extra_options(mut self, options: impl Into<String>) -> Self {
        self.extra_options = Some(options.into());
        self
    }

    /// `emulator -avd NAME [-sdcard PATH] [-ports C,A | -port C] [extra...]`
    ///
    /// An adb port without a console port cannot be expressed and is ignored.
    pub fn command_line(&self, emulator: &Path) -> CommandLine {
        let ports = match (self.console_port, self.adb_port) {
            (Some(console), Some(adb)) => Some(("-ports", format!("{},{}", console, adb))),
            (Some(console), None) => Some(("-port", console.to_string())),
            (None, Some(adb)) => {
                warn!("adb port {} ignored without a console port", adb);
                None
            }
            (None, None) => None,
        };

        let mut command = CommandLine::new(emulator.to_string_lossy())
            .arg("-avd")
            .arg(&self.avd)
            .opt_arg("-sdcard", self.sdcard.as_ref().map(|p| p.to_string_lossy()));
        if let Some((flag, value)) = ports {
            command = command.arg(flag).arg(value);
        }
        if let Some(extra) = &self.extra_options {
            command = command.args(extra.split_whitespace());
        }
        command
    }

    /// Serial the device will register under, when the console port is pinned.
    pub fn expected_serial(&self) -> Option<String> {
        self.console_port.map(|port| format!("emulator-{}", port))
    }

    /// Which connecting device belongs to this launch.
    pub fn device_filter(&self) -> DeviceFilter {
        match self.expected_serial() {
            Some(serial) => DeviceFilter::Serial(serial),
            None => DeviceFilter::AnyEmulator,
        }
    }
}

/// Emulator output policy: nothing to answer, diagnostics echoed by severity.
pub fn emulator_interaction() -> Result<ProcessInteraction> {
    ProcessInteraction::builder()
        .output(r"(?:INFO|WARNING) *\|.*")
        .output(r".*[Bb]oot completed.*")
        .error_output(r"(?:ERROR|FATAL|PANIC)\b.*")
        .error_output(r".*emulator: ERROR:.*")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMULATOR: &str = "/sdk/emulator/emulator";

    #[test]
    fn test_minimal_command() {
        let command = EmulatorOptions::new("Pixel_6_API_33").command_line(Path::new(EMULATOR));
        assert_eq!(command.tokens(), &[EMULATOR, "-avd", "Pixel_6_API_33"]);
    }

    #[test]
    fn test_full_command() {
        let command = EmulatorOptions::new("Pixel_6_API_33")
            .sdcard("/tmp/sdcard.img")
            .ports(Some(5580), Some(5581))
            .extra_options("  -no-window   -gpu swiftshader_indirect ")
            .command_line(Path::new(EMULATOR));

        assert_eq!(
            command.to_string(),
            "/sdk/emulator/emulator -avd Pixel_6_API_33 -sdcard /tmp/sdcard.img \
             -ports 5580,5581 -no-window -gpu swiftshader_indirect"
        );
    }

    #[test]
    fn test_console_port_only() {
        let options = EmulatorOptions::new("Tablet").ports(Some(5560), None);
        let command = options.command_line(Path::new(EMULATOR));
        assert_eq!(command.arguments(), &["-avd", "Tablet", "-port", "5560"]);
        assert_eq!(options.expected_serial().as_deref(), Some("emulator-5560"));
        assert_eq!(
            options.device_filter(),
            DeviceFilter::Serial("emulator-5560".into())
        );
    }

    #[test]
    fn test_adb_port_alone_is_dropped() {
        let options = EmulatorOptions::new("Tablet").ports(None, Some(5561));
        let command = options.command_line(Path::new(EMULATOR));
        assert_eq!(command.arguments(), &["-avd", "Tablet"]);
        assert_eq!(options.expected_serial(), None);
        assert_eq!(options.device_filter(), DeviceFilter::AnyEmulator);
    }

    #[test]
    fn test_emulator_interaction_classifies_diagnostics() {
        let interaction = emulator_interaction().unwrap();
        assert!(!interaction.requires_input_interaction());
        assert!(interaction.should_output("INFO    | Android emulator version 34.1.19"));
        assert!(interaction.should_output_to_err("PANIC: Missing emulator engine program"));
        assert!(interaction.should_output_to_err("ERROR   | Unknown AVD name [Foo]"));
        assert!(interaction.should_output_to_err("emulator: ERROR: x86 emulation requires KVM"));
        assert!(!interaction.should_output_to_err("INFO    | no errors here"));
    }
}
