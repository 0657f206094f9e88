//! Device bridge notification channel
//!
//! A [`DeviceBridge`] delivers [`DeviceSignal`]s to any number of subscribers.
//! [`SignalHub`] is the in-process fan-out used both by the real
//! [`AdbDeviceMonitor`](crate::AdbDeviceMonitor) and directly by tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::signal::DeviceSignal;
use edemon_core::prelude::*;

/// Global subscription id counter
static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One listener's view of the bridge.
///
/// `signals` yields `None` once the subscription is removed.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub signals: mpsc::UnboundedReceiver<DeviceSignal>,
}

/// Source of device connect / state-change / disconnect notifications.
pub trait DeviceBridge: Send + Sync {
    fn subscribe(&self) -> Subscription;

    /// Stop delivering to `id`. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Fan-out of published signals to every live subscriber.
#[derive(Debug, Clone, Default)]
pub struct SignalHub {
    subscribers: Arc<Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<DeviceSignal>>>>,
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, mpsc::UnboundedSender<DeviceSignal>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `signal` to every subscriber, dropping those whose receiver is gone.
    pub fn publish(&self, signal: DeviceSignal) {
        debug!("Device signal: {}", signal);
        self.lock()
            .retain(|id, tx| match tx.send(signal.clone()) {
                Ok(()) => true,
                Err(_) => {
                    trace!("Dropping closed subscription {}", id);
                    false
                }
            });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

impl DeviceBridge for SignalHub {
    fn subscribe(&self) -> Subscription {
        let id = SubscriptionId::next();
        let (tx, signals) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        trace!("Subscribed {}", id);
        Subscription { id, signals }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.lock().remove(&id).is_some() {
            trace!("Unsubscribed {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceState};

    fn connected(serial: &str) -> DeviceSignal {
        DeviceSignal::Connected(Device::new(serial, DeviceState::Offline))
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = SignalHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.publish(connected("emulator-5554"));

        assert_eq!(first.signals.recv().await, Some(connected("emulator-5554")));
        assert_eq!(second.signals.recv().await, Some(connected("emulator-5554")));
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_the_stream() {
        let hub = SignalHub::new();
        let mut subscription = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        hub.unsubscribe(subscription.id);
        hub.publish(connected("emulator-5554"));

        assert_eq!(subscription.signals.recv().await, None);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let hub = SignalHub::new();
        let subscription = hub.subscribe();
        drop(subscription);

        hub.publish(connected("emulator-5554"));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let hub = SignalHub::new();
        assert_ne!(hub.subscribe().id, hub.subscribe().id);
    }
}
