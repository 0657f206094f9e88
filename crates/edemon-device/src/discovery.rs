//! Device discovery state machine
//!
//! [`DiscoveryState`] is a pure reducer over [`DeviceSignal`]s tracking a
//! single device:
//!
//! ```text
//! Unknown ──Connected──▶ Discovered ──StateChanged(STATE, online)──▶ Online
//!                            │
//!                            └──────────Disconnected──────────▶ Disconnected
//! ```
//!
//! [`DeviceDiscovery`] feeds it from a bridge subscription on a background
//! task and exposes the `is_online` / `is_offline` predicates that
//! [`ProcessExecutor::poll_until`](edemon_process::ProcessExecutor::poll_until)
//! waits on.

use std::sync::Arc;

use tokio::sync::watch;

use crate::bridge::{DeviceBridge, SubscriptionId};
use crate::device::Device;
use crate::signal::{DeviceChange, DeviceSignal};
use edemon_core::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    Unknown,
    Discovered,
    Online,
    Disconnected,
}

/// Which device a discovery accepts on its first `Connected` signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    /// Exactly this serial
    Serial(String),
    /// The first emulator instance to connect
    AnyEmulator,
}

impl DeviceFilter {
    fn accepts(&self, device: &Device) -> bool {
        match self {
            Self::Serial(serial) => device.serial == *serial,
            Self::AnyEmulator => device.is_emulator(),
        }
    }
}

/// Per-device discovery state.
#[derive(Debug, Clone)]
pub struct DiscoveryState {
    filter: DeviceFilter,
    device: Option<Device>,
    online: bool,
    offline: bool,
}

impl DiscoveryState {
    pub fn new(filter: DeviceFilter) -> Self {
        Self {
            filter,
            device: None,
            online: false,
            offline: false,
        }
    }

    /// Start out already tracking `device`, for watching it go away.
    pub fn tracking(device: Device) -> Self {
        Self {
            filter: DeviceFilter::Serial(device.serial.clone()),
            online: device.is_online(),
            device: Some(device),
            offline: false,
        }
    }

    /// Fold one signal into the state. Returns whether anything changed.
    pub fn apply(&mut self, signal: &DeviceSignal) -> bool {
        match signal {
            DeviceSignal::Connected(device) => {
                let accept = match &self.device {
                    None => self.filter.accepts(device),
                    // The tracked device came back
                    Some(tracked) => tracked.same_device(device),
                };
                if !accept {
                    return false;
                }
                self.device = Some(device.clone());
                self.offline = false;
                true
            }
            DeviceSignal::StateChanged(device, change) => {
                if !self.is_tracked(device) {
                    return false;
                }
                self.device = Some(device.clone());
                if change.contains(DeviceChange::STATE) {
                    self.online = device.is_online();
                }
                true
            }
            DeviceSignal::Disconnected(device) => {
                if !self.is_tracked(device) {
                    return false;
                }
                self.online = false;
                self.offline = true;
                true
            }
        }
    }

    fn is_tracked(&self, device: &Device) -> bool {
        self.device
            .as_ref()
            .is_some_and(|tracked| tracked.same_device(device))
    }

    pub fn phase(&self) -> DiscoveryPhase {
        match (&self.device, self.online, self.offline) {
            (None, _, _) => DiscoveryPhase::Unknown,
            (Some(_), _, true) => DiscoveryPhase::Disconnected,
            (Some(_), true, false) => DiscoveryPhase::Online,
            (Some(_), false, false) => DiscoveryPhase::Discovered,
        }
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }
}

/// A [`DiscoveryState`] driven by a live bridge subscription.
///
/// Cloning is cheap; clones observe the same state. Call
/// [`close`](Self::close) to unsubscribe.
#[derive(Clone)]
pub struct DeviceDiscovery {
    bridge: Arc<dyn DeviceBridge>,
    subscription: SubscriptionId,
    state: watch::Receiver<DiscoveryState>,
}

impl std::fmt::Debug for DeviceDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDiscovery")
            .field("subscription", &self.subscription)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl DeviceDiscovery {
    /// Subscribe to `bridge` and wait for the first device `filter` accepts.
    pub fn start(bridge: Arc<dyn DeviceBridge>, filter: DeviceFilter) -> Self {
        Self::with_state(bridge, DiscoveryState::new(filter))
    }

    /// Subscribe to `bridge` already tracking `device`.
    pub fn tracking(bridge: Arc<dyn DeviceBridge>, device: Device) -> Self {
        Self::with_state(bridge, DiscoveryState::tracking(device))
    }

    fn with_state(bridge: Arc<dyn DeviceBridge>, initial: DiscoveryState) -> Self {
        let mut subscription = bridge.subscribe();
        let (state_tx, state) = watch::channel(initial);
        let id = subscription.id;

        tokio::spawn(async move {
            while let Some(signal) = subscription.signals.recv().await {
                if state_tx.send_if_modified(|state| state.apply(&signal)) {
                    trace!("{}: {:?}", id, state_tx.borrow().phase());
                }
                if state_tx.is_closed() {
                    // Every handle was dropped without closing
                    break;
                }
            }
            trace!("{}: signal stream closed", id);
        });

        Self {
            bridge,
            subscription: id,
            state,
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().is_online()
    }

    pub fn is_offline(&self) -> bool {
        self.state.borrow().is_offline()
    }

    pub fn phase(&self) -> DiscoveryPhase {
        self.state.borrow().phase()
    }

    /// The tracked device, once one connected.
    pub fn device(&self) -> Option<Device> {
        self.state.borrow().device().cloned()
    }

    /// Remove the bridge subscription; the state freezes as it is.
    pub fn close(&self) {
        self.bridge.unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::SignalHub;
    use crate::device::DeviceState;
    use std::time::Duration;

    fn device(serial: &str, state: DeviceState) -> Device {
        Device::new(serial, state)
    }

    fn state_changed(serial: &str, state: DeviceState) -> DeviceSignal {
        DeviceSignal::StateChanged(device(serial, state), DeviceChange::STATE)
    }

    #[test]
    fn test_connect_then_online() {
        let mut state = DiscoveryState::new(DeviceFilter::Serial("emulator-5554".into()));
        assert_eq!(state.phase(), DiscoveryPhase::Unknown);

        assert!(state.apply(&DeviceSignal::Connected(device(
            "emulator-5554",
            DeviceState::Offline
        ))));
        assert_eq!(state.phase(), DiscoveryPhase::Discovered);
        assert!(!state.is_online());

        assert!(state.apply(&state_changed("emulator-5554", DeviceState::Online)));
        assert_eq!(state.phase(), DiscoveryPhase::Online);
        assert!(state.is_online());
    }

    #[test]
    fn test_state_change_for_other_device_is_ignored() {
        let mut state = DiscoveryState::new(DeviceFilter::AnyEmulator);
        state.apply(&DeviceSignal::Connected(device(
            "emulator-5554",
            DeviceState::Offline,
        )));

        assert!(!state.apply(&state_changed("emulator-5556", DeviceState::Online)));
        assert!(!state.is_online());
        assert_eq!(state.device().unwrap().serial, "emulator-5554");
    }

    #[test]
    fn test_online_requires_state_bit() {
        let mut state = DiscoveryState::new(DeviceFilter::AnyEmulator);
        state.apply(&DeviceSignal::Connected(device(
            "emulator-5554",
            DeviceState::Offline,
        )));

        state.apply(&DeviceSignal::StateChanged(
            device("emulator-5554", DeviceState::Online),
            DeviceChange::BUILD_INFO,
        ));
        assert!(!state.is_online());
    }

    #[test]
    fn test_state_change_before_connect_is_ignored() {
        let mut state = DiscoveryState::new(DeviceFilter::AnyEmulator);
        assert!(!state.apply(&state_changed("emulator-5554", DeviceState::Online)));
        assert_eq!(state.phase(), DiscoveryPhase::Unknown);
    }

    #[test]
    fn test_filter_by_serial() {
        let mut state = DiscoveryState::new(DeviceFilter::Serial("emulator-5556".into()));
        assert!(!state.apply(&DeviceSignal::Connected(device(
            "emulator-5554",
            DeviceState::Online
        ))));
        assert!(state.apply(&DeviceSignal::Connected(device(
            "emulator-5556",
            DeviceState::Offline
        ))));
        assert_eq!(state.device().unwrap().serial, "emulator-5556");
    }

    #[test]
    fn test_any_emulator_skips_physical_devices() {
        let mut state = DiscoveryState::new(DeviceFilter::AnyEmulator);
        assert!(!state.apply(&DeviceSignal::Connected(device(
            "R58M123ABC",
            DeviceState::Online
        ))));
        assert_eq!(state.phase(), DiscoveryPhase::Unknown);
    }

    #[test]
    fn test_disconnect_of_tracked_device() {
        let mut state = DiscoveryState::tracking(device("emulator-5554", DeviceState::Online));
        assert_eq!(state.phase(), DiscoveryPhase::Online);

        assert!(!state.apply(&DeviceSignal::Disconnected(device(
            "emulator-5556",
            DeviceState::Offline
        ))));
        assert!(!state.is_offline());

        assert!(state.apply(&DeviceSignal::Disconnected(device(
            "emulator-5554",
            DeviceState::Offline
        ))));
        assert!(state.is_offline());
        assert!(!state.is_online());
        assert_eq!(state.phase(), DiscoveryPhase::Disconnected);
    }

    #[test]
    fn test_going_offline_clears_online() {
        let mut state = DiscoveryState::tracking(device("emulator-5554", DeviceState::Online));
        state.apply(&state_changed("emulator-5554", DeviceState::Offline));
        assert!(!state.is_online());
        assert_eq!(state.phase(), DiscoveryPhase::Discovered);
    }

    async fn settle<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_discovery_follows_bridge() {
        let hub = SignalHub::new();
        let discovery = DeviceDiscovery::start(Arc::new(hub.clone()), DeviceFilter::AnyEmulator);

        hub.publish(DeviceSignal::Connected(device(
            "emulator-5554",
            DeviceState::Offline,
        )));
        hub.publish(state_changed("emulator-5554", DeviceState::Online));

        assert!(settle(|| discovery.is_online()).await);
        assert_eq!(discovery.device().unwrap().serial, "emulator-5554");
        assert_eq!(discovery.phase(), DiscoveryPhase::Online);
    }

    #[tokio::test]
    async fn test_close_unsubscribes() {
        let hub = SignalHub::new();
        let discovery = DeviceDiscovery::tracking(
            Arc::new(hub.clone()),
            device("emulator-5554", DeviceState::Online),
        );
        assert_eq!(hub.subscriber_count(), 1);

        discovery.close();
        assert_eq!(hub.subscriber_count(), 0);

        hub.publish(DeviceSignal::Disconnected(device(
            "emulator-5554",
            DeviceState::Offline,
        )));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!discovery.is_offline());
    }
}
