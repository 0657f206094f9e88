//! Settings loading from `.edemon/config.toml`

use std::path::Path;

use edemon_core::prelude::*;

use super::types::Settings;

const EDEMON_DIR: &str = ".edemon";
const CONFIG_FILENAME: &str = "config.toml";

/// Load settings from `.edemon/config.toml` under `project_path`.
///
/// A missing or unreadable file yields defaults.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(EDEMON_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Load settings from an explicitly requested file. Unlike
/// [`load_settings`], every failure is an error.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {}", path.display(), e)))
}
