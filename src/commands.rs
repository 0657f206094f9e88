//! CLI command implementations
//!
//! Each command receives the shared [`ProcessExecutor`]; the caller is
//! responsible for calling [`ProcessExecutor::shutdown`] afterwards.

use std::sync::Arc;

use edemon_core::prelude::*;
use edemon_device::{
    list_avds, AdbDeviceMonitor, AndroidAvd, EmulatorBooter, RunningEmulator, SdkTools,
};
use edemon_process::{Answer, CommandLine, ProcessExecutor, ProcessInteraction};

use crate::config::Settings;
use crate::signals::wait_for_signal;

/// Boot the configured AVD, hold it until a termination signal, then stop it.
///
/// `on_booted` is invoked once the device is online and unlocked.
pub async fn boot<F>(executor: &ProcessExecutor, settings: &Settings, on_booted: F) -> Result<()>
where
    F: FnOnce(&RunningEmulator),
{
    settings.validate(true)?;
    let options = settings
        .emulator_options()
        .ok_or_else(|| Error::config_invalid("no AVD configured"))?;
    let tools = SdkTools::resolve(&settings.tool_overrides())?;

    let mut monitor = AdbDeviceMonitor::start(&tools.adb)
        .await
        .context("Failed to start the device monitor")?;
    let bridge = Arc::new(monitor.hub().clone());
    let booter = EmulatorBooter::new(executor.clone(), bridge, tools, settings.boot_timeouts());

    let booted = tokio::select! {
        booted = booter.boot(&options) => Some(booted),
        signal = wait_for_signal() => {
            signal?;
            None
        }
    };

    let result = match booted {
        None => {
            info!("Boot of {} interrupted", options.avd);
            Ok(())
        }
        Some(Err(e)) => Err(e),
        Some(Ok(emulator)) => {
            on_booted(&emulator);
            let held = wait_for_signal().await;
            let stopped = booter.stop(&emulator).await;
            held.and(stopped)
        }
    };

    monitor.stop().await;
    result
}

/// AVDs known to the resolved SDK.
pub async fn avds(executor: &ProcessExecutor, settings: &Settings) -> Result<Vec<AndroidAvd>> {
    let tools = SdkTools::resolve(&settings.tool_overrides())?;
    list_avds(executor, &tools).await
}

/// Build the interaction for `exec` from `PATTERN=REPLY` rules and EOF patterns.
///
/// Reply rules are tried before EOF rules. The split happens at the last `=`,
/// so patterns may contain `=` themselves.
pub fn exec_interaction(
    answers: &[String],
    eof_on: &[String],
    quiet: bool,
) -> Result<ProcessInteraction> {
    let mut builder = ProcessInteraction::builder();
    for rule in answers {
        let (pattern, reply) = rule.rsplit_once('=').ok_or_else(|| {
            Error::invalid_interaction(format!("expected PATTERN=REPLY, got '{}'", rule))
        })?;
        builder = builder.reply(pattern, Answer::text(reply));
    }
    for pattern in eof_on {
        builder = builder.reply(pattern.as_str(), Answer::EOF);
    }
    if !quiet {
        builder = builder.output_all();
    }
    builder.build()
}

/// Run `command` to completion under `interaction`, returning its exit code.
pub async fn exec(
    executor: &ProcessExecutor,
    command: &CommandLine,
    interaction: ProcessInteraction,
) -> Result<i32> {
    let execution = executor.spawn(interaction, command)?;
    let code = execution.wait().await;
    executor.unregister(execution.id());
    let code = code?;
    debug!(
        "{} finished with code {} after {} line(s)",
        command,
        code,
        execution.output_line_count()
    );
    Ok(code)
}
