//! Device bridge notifications

use std::fmt;
use std::ops::BitOr;

use crate::device::Device;

/// Bitmask of what changed in a [`DeviceSignal::StateChanged`] notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceChange(u32);

impl DeviceChange {
    /// Connection state (`offline` → `device`, ...)
    pub const STATE: DeviceChange = DeviceChange(0x0001);
    /// Debuggable client processes
    pub const CLIENT_LIST: DeviceChange = DeviceChange(0x0002);
    /// Build properties became readable
    pub const BUILD_INFO: DeviceChange = DeviceChange(0x0004);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(&self, other: DeviceChange) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DeviceChange {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A notification delivered by a [`DeviceBridge`](crate::DeviceBridge)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSignal {
    Connected(Device),
    StateChanged(Device, DeviceChange),
    Disconnected(Device),
}

impl DeviceSignal {
    pub fn device(&self) -> &Device {
        match self {
            Self::Connected(device)
            | Self::StateChanged(device, _)
            | Self::Disconnected(device) => device,
        }
    }
}

impl fmt::Display for DeviceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(device) => write!(f, "connected {}", device),
            Self::StateChanged(device, change) => {
                write!(f, "changed {} (mask {:#x})", device, change.bits())
            }
            Self::Disconnected(device) => write!(f, "disconnected {}", device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;

    #[test]
    fn test_change_mask_contains() {
        let mask = DeviceChange::STATE | DeviceChange::BUILD_INFO;
        assert!(mask.contains(DeviceChange::STATE));
        assert!(mask.contains(DeviceChange::BUILD_INFO));
        assert!(!mask.contains(DeviceChange::CLIENT_LIST));
        assert!(!DeviceChange::empty().contains(DeviceChange::STATE));
    }

    #[test]
    fn test_signal_device() {
        let device = Device::new("emulator-5554", DeviceState::Online);
        let signal = DeviceSignal::StateChanged(device.clone(), DeviceChange::STATE);
        assert_eq!(signal.device(), &device);
        assert_eq!(
            DeviceSignal::Disconnected(device).to_string(),
            "disconnected emulator-5554 (device)"
        );
    }
}
