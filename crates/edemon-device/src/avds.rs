//! Android AVD (Android Virtual Device) discovery
//!
//! Lists the AVDs the SDK knows about using `emulator -list-avds`.

use std::sync::LazyLock;

use regex::Regex;

use crate::tools::SdkTools;
use edemon_core::prelude::*;
use edemon_process::{CommandLine, ProcessExecutor, ProcessInteraction};

/// Static regex pattern for extracting API level from AVD names
static API_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_API_(\d+)$").expect("Invalid API pattern regex"));

/// An Android Virtual Device (AVD)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidAvd {
    /// AVD name (used for `-avd`)
    pub name: String,
    /// Friendly display name
    pub display_name: String,
    /// API level (e.g., 33 for Android 13)
    pub api_level: Option<u32>,
}

/// List all available Android AVDs.
pub async fn list_avds(executor: &ProcessExecutor, tools: &SdkTools) -> Result<Vec<AndroidAvd>> {
    let command = CommandLine::new(tools.emulator.to_string_lossy()).arg("-list-avds");
    let execution = executor
        .execute(ProcessInteraction::silent(), &command)
        .await?;

    Ok(parse_avd_list(&execution.output()))
}

/// Fail with [`Error::AvdNotFound`] unless `name` is among `avds`.
pub fn ensure_avd_exists(avds: &[AndroidAvd], name: &str) -> Result<()> {
    if avds.iter().any(|avd| avd.name == name) {
        return Ok(());
    }
    Err(Error::AvdNotFound {
        name: name.to_string(),
        available: avds.iter().map(|avd| avd.name.clone()).collect(),
    })
}

/// Parse the output lines of `emulator -list-avds`.
///
/// One AVD name per line. Newer emulators interleave log lines such as
/// `INFO    | Storing crashdata in: ...`; AVD names never contain whitespace,
/// so any line that does is skipped.
fn parse_avd_list<S: AsRef<str>>(lines: &[S]) -> Vec<AndroidAvd> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace))
        .map(|name| {
            let (display_name, api_level) = parse_avd_name(name);
            AndroidAvd {
                name: name.to_string(),
                display_name,
                api_level,
            }
        })
        .collect()
}

/// Parse AVD name to extract display name and API level
///
/// Common naming patterns:
/// - "Pixel_6_API_33" -> ("Pixel 6", Some(33))
/// - "Nexus_5X_API_29" -> ("Nexus 5X", Some(29))
/// - "My_Custom_AVD" -> ("My Custom AVD", None)
fn parse_avd_name(name: &str) -> (String, Option<u32>) {
    if let Some(caps) = API_PATTERN.captures(name) {
        let api_level = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let display = API_PATTERN.replace(name, "").replace('_', " ");
        return (display.trim().to_string(), api_level);
    }

    (name.replace('_', " "), None)
}
