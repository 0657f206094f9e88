//! Configuration loading
//!
//! Settings come from `.edemon/config.toml` in the working directory, or from
//! an explicit `--config` path. CLI flags override file values.

pub mod settings;
pub mod types;

pub use settings::{load_settings, load_settings_from};
pub use types::{EmulatorSettings, SdkSettings, Settings, TimeoutSettings};
