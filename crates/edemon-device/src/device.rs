//! Devices as reported by the device bridge

use std::fmt;

/// Connection state reported by `adb` for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// `device`: transport is up and the device accepts commands
    Online,
    Offline,
    Unauthorized,
    Bootloader,
    Recovery,
    /// Any state string this crate does not know about
    Unknown,
}

impl DeviceState {
    /// Parse the state column of `adb devices` / `adb track-devices`.
    pub fn from_adb(state: &str) -> Self {
        match state.trim() {
            "device" => Self::Online,
            "offline" => Self::Offline,
            "unauthorized" => Self::Unauthorized,
            "bootloader" => Self::Bootloader,
            "recovery" => Self::Recovery,
            _ => Self::Unknown,
        }
    }

    pub fn as_adb(&self) -> &'static str {
        match self {
            Self::Online => "device",
            Self::Offline => "offline",
            Self::Unauthorized => "unauthorized",
            Self::Bootloader => "bootloader",
            Self::Recovery => "recovery",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_adb())
    }
}

/// A device known to the bridge, identified by its serial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Serial number, e.g. `emulator-5554`
    pub serial: String,
    pub state: DeviceState,
}

impl Device {
    pub fn new(serial: impl Into<String>, state: DeviceState) -> Self {
        Self {
            serial: serial.into(),
            state,
        }
    }

    pub fn is_online(&self) -> bool {
        self.state == DeviceState::Online
    }

    /// Whether the serial names a local emulator instance
    pub fn is_emulator(&self) -> bool {
        self.serial.starts_with("emulator-")
    }

    /// Whether `other` is the same physical/virtual device, regardless of state.
    pub fn same_device(&self, other: &Device) -> bool {
        self.serial == other.serial
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.serial, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_adb() {
        assert_eq!(DeviceState::from_adb("device"), DeviceState::Online);
        assert_eq!(DeviceState::from_adb("offline"), DeviceState::Offline);
        assert_eq!(
            DeviceState::from_adb("unauthorized"),
            DeviceState::Unauthorized
        );
        assert_eq!(DeviceState::from_adb(" recovery\n"), DeviceState::Recovery);
        assert_eq!(DeviceState::from_adb("sideload"), DeviceState::Unknown);
    }

    #[test]
    fn test_state_round_trips_known_values() {
        for state in ["device", "offline", "unauthorized", "bootloader", "recovery"] {
            assert_eq!(DeviceState::from_adb(state).as_adb(), state);
        }
    }

    #[test]
    fn test_device_identity_ignores_state() {
        let offline = Device::new("emulator-5554", DeviceState::Offline);
        let online = Device::new("emulator-5554", DeviceState::Online);
        let other = Device::new("emulator-5556", DeviceState::Online);

        assert!(offline.same_device(&online));
        assert!(!online.same_device(&other));
        assert!(online.is_online());
        assert!(!offline.is_online());
    }

    #[test]
    fn test_is_emulator() {
        assert!(Device::new("emulator-5554", DeviceState::Online).is_emulator());
        assert!(!Device::new("R58M123ABC", DeviceState::Online).is_emulator());
    }

    #[test]
    fn test_display() {
        let device = Device::new("emulator-5554", DeviceState::Online);
        assert_eq!(device.to_string(), "emulator-5554 (device)");
    }
}
