//! # edemon-device - Device Discovery and Emulator Boot
//!
//! Observes devices through a device bridge and boots Android emulators,
//! waiting for the transport to come online and the OS to finish booting
//! within one deadline.
//!
//! Depends on [`edemon_core`] for errors and deadlines and on
//! [`edemon_process`] for running `emulator` and `adb`.
//!
//! ## Public API
//!
//! ### Devices and Signals
//! - [`Device`], [`DeviceState`] - A device as reported by `adb`
//! - [`DeviceSignal`], [`DeviceChange`] - Bridge notifications
//!
//! ### Device Bridge
//! - [`DeviceBridge`] - Subscribe / unsubscribe to signals
//! - [`SignalHub`] - In-process fan-out
//! - [`AdbDeviceMonitor`] - Bridge fed by `adb track-devices`
//!
//! ### Discovery
//! - [`DiscoveryState`] - Pure reducer over signals
//! - [`DeviceDiscovery`] - Reducer driven by a live subscription
//!
//! ### Emulators
//! - [`EmulatorOptions`] - `-avd`, `-sdcard`, ports, extra options
//! - [`EmulatorBooter`] - `boot` and `stop`
//! - [`list_avds()`] - AVDs known to the SDK
//! - [`DeviceShell`] - `adb -s SERIAL ...` helpers
//! - [`SdkTools`] - Resolved `emulator` / `adb` paths

pub mod avds;
pub mod boot;
pub mod bridge;
pub mod device;
pub mod discovery;
pub mod emulator;
pub mod monitor;
pub mod shell;
pub mod signal;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tools;

pub use avds::{ensure_avd_exists, list_avds, AndroidAvd};
pub use boot::{BootTimeouts, EmulatorBooter, RunningEmulator};
pub use bridge::{DeviceBridge, SignalHub, Subscription, SubscriptionId};
pub use device::{Device, DeviceState};
pub use discovery::{DeviceDiscovery, DeviceFilter, DiscoveryPhase, DiscoveryState};
pub use emulator::{emulator_interaction, EmulatorOptions};
pub use monitor::{diff_snapshots, parse_device_list, AdbDeviceMonitor, DeviceSnapshot, FrameDecoder};
pub use shell::{DeviceShell, BOOT_COMPLETED_MARKER};
pub use signal::{DeviceChange, DeviceSignal};
pub use tools::{SdkTools, Tool, ToolOverrides};
