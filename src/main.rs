//! Emulator Demon - boot Android emulators and script interactive tools
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::eyre::Result;
use edemon_core::Error;
use edemon_process::{CommandLine, ProcessExecutor, StdioSink};
use emulator_demon::commands;
use emulator_demon::config::{load_settings, load_settings_from, Settings};
use emulator_demon::signals::wait_for_signal;
use tracing::{error, info};

/// Exit code used when a command is interrupted by a signal
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Exit code for a failure that is not a setup problem
const FAILURE_EXIT_CODE: i32 = 1;

/// Emulator Demon - boot Android emulators and script interactive tools
#[derive(Parser, Debug)]
#[command(name = "edemon", version)]
#[command(about = "Boot Android emulators and script interactive tools", long_about = None)]
struct Args {
    /// Config file (default: .edemon/config.toml in the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Boot an AVD and keep it running until Ctrl-C
    Boot(BootArgs),
    /// List available AVDs
    Avds,
    /// Run a command, answering its prompts
    Exec(ExecArgs),
}

#[derive(ClapArgs, Debug)]
struct BootArgs {
    /// AVD name
    #[arg(long)]
    avd: Option<String>,

    /// SD card image
    #[arg(long, value_name = "PATH")]
    sdcard: Option<PathBuf>,

    #[arg(long)]
    console_port: Option<u16>,

    #[arg(long)]
    adb_port: Option<u16>,

    /// Extra emulator options, e.g. "-no-window -no-audio"
    #[arg(long, allow_hyphen_values = true)]
    extra_options: Option<String>,

    /// Boot budget in seconds
    #[arg(long, value_name = "SECS")]
    boot_timeout: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct ExecArgs {
    /// Reply rule: when the output so far matches PATTERN, write REPLY
    #[arg(long = "answer", value_name = "PATTERN=REPLY")]
    answers: Vec<String>,

    /// Stop reading output and close input once PATTERN matches
    #[arg(long = "eof-on", value_name = "PATTERN")]
    eof_on: Vec<String>,

    /// Do not echo the command's output
    #[arg(short, long)]
    quiet: bool,

    /// Command and arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl BootArgs {
    fn apply(self, settings: &mut Settings) {
        let emulator = &mut settings.emulator;
        emulator.avd = self.avd.or(emulator.avd.take());
        emulator.sdcard = self.sdcard.or(emulator.sdcard.take());
        emulator.console_port = self.console_port.or(emulator.console_port);
        emulator.adb_port = self.adb_port.or(emulator.adb_port);
        emulator.extra_options = self.extra_options.or(emulator.extra_options.take());
        if let Some(secs) = self.boot_timeout {
            settings.timeouts.boot_secs = secs;
        }
    }
}

/// Exit code for a failed command, or `None` when the error is fatal and
/// gets the full report.
fn failure_exit_code(e: &Error) -> Option<i32> {
    if e.is_fatal() {
        None
    } else {
        Some(FAILURE_EXIT_CODE)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if args.verbose {
        edemon_core::logging::init_stderr();
    } else {
        edemon_core::logging::init()?;
    }

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(&std::env::current_dir()?),
    };

    let outcome = match args.command {
        Command::Boot(boot) => {
            boot.apply(&mut settings);
            let executor = ProcessExecutor::new();
            let result = commands::boot(&executor, &settings, |emulator| {
                println!(
                    "{} booted as {}. Press Ctrl-C to stop.",
                    emulator.avd,
                    emulator.serial()
                );
            })
            .await;
            executor.shutdown().await;
            result.map(|()| 0)
        }
        Command::Avds => {
            let executor = ProcessExecutor::new();
            let result = match settings.validate(false) {
                Ok(()) => commands::avds(&executor, &settings).await,
                Err(e) => Err(e),
            };
            executor.shutdown().await;
            result.map(|avds| {
                for avd in avds {
                    match avd.api_level {
                        Some(api) => println!("{}\t{} (API {})", avd.name, avd.display_name, api),
                        None => println!("{}\t{}", avd.name, avd.display_name),
                    }
                }
                0
            })
        }
        Command::Exec(exec) => {
            let interaction = commands::exec_interaction(&exec.answers, &exec.eof_on, exec.quiet)?;
            let command: CommandLine = exec.command.iter().collect();
            let executor = ProcessExecutor::with_sink(StdioSink);

            let result = tokio::select! {
                code = commands::exec(&executor, &command, interaction) => code,
                signal = wait_for_signal() => signal.map(|()| INTERRUPTED_EXIT_CODE),
            };
            executor.shutdown().await;
            result
        }
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => match failure_exit_code(&e) {
            None => return Err(e.into()),
            Some(code) => {
                error!("{}", e);
                eprintln!("edemon: {}", e);
                code
            }
        },
    };

    info!("Exiting with code {}", code);
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_args_override_settings() {
        let args = Args::parse_from([
            "edemon",
            "boot",
            "--avd",
            "Tablet",
            "--console-port",
            "5570",
            "--extra-options",
            "-no-window -no-audio",
            "--boot-timeout",
            "300",
        ]);
        let Command::Boot(boot) = args.command else {
            panic!("expected boot");
        };

        let mut settings = Settings::default();
        settings.emulator.avd = Some("Pixel_6_API_33".to_string());
        settings.emulator.adb_port = Some(5571);
        boot.apply(&mut settings);

        assert_eq!(settings.emulator.avd.as_deref(), Some("Tablet"));
        assert_eq!(settings.emulator.console_port, Some(5570));
        assert_eq!(settings.emulator.adb_port, Some(5571));
        assert_eq!(
            settings.emulator.extra_options.as_deref(),
            Some("-no-window -no-audio")
        );
        assert_eq!(settings.timeouts.boot_secs, 300);
    }

    #[test]
    fn test_exec_args() {
        let args = Args::parse_from([
            "edemon",
            "--verbose",
            "exec",
            "--answer",
            r"continue\? =yes",
            "--eof-on",
            ".*Done.*",
            "--",
            "sdkmanager",
            "--licenses",
        ]);
        assert!(args.verbose);
        let Command::Exec(exec) = args.command else {
            panic!("expected exec");
        };
        assert_eq!(exec.answers, vec![r"continue\? =yes"]);
        assert_eq!(exec.eof_on, vec![".*Done.*"]);
        assert_eq!(exec.command, vec!["sdkmanager", "--licenses"]);
    }

    #[test]
    fn test_fatal_errors_get_the_full_report() {
        assert_eq!(failure_exit_code(&Error::config_invalid("no AVD")), None);
        assert_eq!(failure_exit_code(&Error::tool_not_found("adb")), None);
        assert_eq!(
            failure_exit_code(&Error::ProcessExit {
                command: "sdkmanager --licenses".to_string(),
                code: Some(2),
            }),
            Some(FAILURE_EXIT_CODE)
        );
        assert_eq!(
            failure_exit_code(&Error::DeviceNeverDisconnected {
                serial: "emulator-5554".to_string(),
                waited_secs: 20,
            }),
            Some(FAILURE_EXIT_CODE)
        );
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
