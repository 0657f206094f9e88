//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable controlling the log filter.
pub const LOG_ENV: &str = "EDEMON_LOG";

const DEFAULT_FILTER: &str =
    "emulator_demon=info,edemon_core=info,edemon_process=info,edemon_device=info,warn";

/// Initialize the logging subsystem
///
/// Logs are written to `~/.local/share/emulator-demon/logs/`
/// Log level is controlled by `EDEMON_LOG` environment variable.
///
/// # Examples
/// ```bash
/// EDEMON_LOG=debug edemon boot --avd Pixel_6_API_33
/// EDEMON_LOG=edemon_process=trace edemon exec -- adb devices
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "edemon.log");

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Emulator Demon starting");
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

/// Initialize logging to stderr only (used with `--verbose`).
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_timer(fmt::time::ChronoLocal::new("%H:%M:%S%.3f".to_string())),
        )
        .init();
}

fn env_filter() -> EnvFilter {
    // Default to info for our crates, allow override via EDEMON_LOG
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Get the log directory path
fn get_log_directory() -> Result<PathBuf> {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(base.join("emulator-demon").join("logs"))
}

