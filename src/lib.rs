//! Emulator Demon Library
//!
//! Boots Android emulators and drives interactive command-line tools,
//! bounding every wait with a deadline.

pub mod commands;
pub mod config;
pub mod signals;

pub use config::{load_settings, load_settings_from, Settings};
