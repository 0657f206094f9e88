//! Device bridge backed by `adb track-devices`
//!
//! `adb track-devices` prints the full device list every time it changes,
//! each list framed by a 4-digit hex length:
//!
//! ```text
//! 0000
//! 0016emulator-5554	offline
//! 0015emulator-5554	device
//! ```
//!
//! [`AdbDeviceMonitor`] diffs consecutive lists into [`DeviceSignal`]s and
//! publishes them on a [`SignalHub`].

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::bridge::{DeviceBridge, SignalHub, Subscription, SubscriptionId};
use crate::device::{Device, DeviceState};
use crate::signal::{DeviceChange, DeviceSignal};
use edemon_core::prelude::*;

/// Serial → state, ordered for deterministic diffs
pub type DeviceSnapshot = BTreeMap<String, DeviceState>;

const HEADER_LEN: usize = 4;

/// How long `adb track-devices` may take to print its first list; this
/// includes starting the adb server.
const FIRST_LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Incremental decoder for hex-length framed device lists.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and return every complete device list.
    ///
    /// Fails on a header that is not hexadecimal; the stream cannot be
    /// resynchronised after that.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<DeviceSnapshot>> {
        self.buffer.extend_from_slice(bytes);
        let mut snapshots = Vec::new();

        loop {
            // Tolerate line breaks between frames
            let skip = self
                .buffer
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            self.buffer.drain(..skip);

            if self.buffer.len() < HEADER_LEN {
                break;
            }
            let header = std::str::from_utf8(&self.buffer[..HEADER_LEN])
                .ok()
                .and_then(|h| usize::from_str_radix(h, 16).ok())
                .ok_or_else(|| {
                    Error::bridge(format!(
                        "invalid track-devices header {:?}",
                        String::from_utf8_lossy(&self.buffer[..HEADER_LEN])
                    ))
                })?;

            if self.buffer.len() < HEADER_LEN + header {
                break;
            }
            let payload: Vec<u8> = self.buffer.drain(..HEADER_LEN + header).skip(HEADER_LEN).collect();
            snapshots.push(parse_device_list(&String::from_utf8_lossy(&payload)));
        }

        Ok(snapshots)
    }
}

/// Parse `serial<TAB>state` lines, as printed by `adb devices` without its title.
pub fn parse_device_list(payload: &str) -> DeviceSnapshot {
    payload
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let serial = columns.next()?;
            let state = columns.next()?;
            Some((serial.to_string(), DeviceState::from_adb(state)))
        })
        .collect()
}

/// Signals that turn `previous` into `next`.
///
/// A device first seen already online yields `Connected` followed by a
/// state change, so listeners see the same sequence as for a slow boot.
pub fn diff_snapshots(previous: &DeviceSnapshot, next: &DeviceSnapshot) -> Vec<DeviceSignal> {
    let mut signals = Vec::new();

    for (serial, state) in next {
        let device = Device::new(serial.clone(), *state);
        match previous.get(serial) {
            None => {
                signals.push(DeviceSignal::Connected(device.clone()));
                if *state != DeviceState::Offline {
                    signals.push(DeviceSignal::StateChanged(device, DeviceChange::STATE));
                }
            }
            Some(old) if old != state => {
                signals.push(DeviceSignal::StateChanged(device, DeviceChange::STATE));
            }
            Some(_) => {}
        }
    }

    for (serial, state) in previous {
        if !next.contains_key(serial) {
            signals.push(DeviceSignal::Disconnected(Device::new(serial.clone(), *state)));
        }
    }

    signals
}

/// A running `adb track-devices` feeding a [`SignalHub`].
pub struct AdbDeviceMonitor {
    hub: SignalHub,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for AdbDeviceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdbDeviceMonitor")
            .field("subscribers", &self.hub.subscriber_count())
            .field("running", &self.task.is_some())
            .finish()
    }
}

impl AdbDeviceMonitor {
    /// Start tracking devices through the `adb` binary at `adb`.
    ///
    /// Waits for the first device list and records it without publishing,
    /// so devices attached before the monitor started are never reported as
    /// connecting. Only later changes reach subscribers.
    pub async fn start(adb: &Path) -> Result<Self> {
        let command = format!("{} track-devices", adb.display());
        info!("Starting device monitor: {}", command);

        let mut child = Command::new(adb)
            .arg("track-devices")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::launch(command, &e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::bridge("track-devices has no stdout"))?;

        let mut decoder = FrameDecoder::new();
        let attached = tokio::time::timeout(
            FIRST_LIST_TIMEOUT,
            read_first_snapshot(&mut stdout, &mut decoder),
        )
        .await
        .map_err(|_| {
            Error::bridge(format!(
                "adb track-devices listed no devices within {:?}",
                FIRST_LIST_TIMEOUT
            ))
        })??;
        info!(
            "Device monitor started, {} device(s) already attached",
            attached.len()
        );

        let hub = SignalHub::new();
        let publisher = hub.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut known = attached;
            let mut buf = [0u8; 1024];

            loop {
                tokio::select! {
                    read = stdout.read(&mut buf) => match read {
                        Ok(0) => {
                            warn!("adb track-devices closed its output");
                            break;
                        }
                        Ok(n) => match decoder.push(&buf[..n]) {
                            Ok(snapshots) => {
                                for snapshot in snapshots {
                                    for signal in diff_snapshots(&known, &snapshot) {
                                        publisher.publish(signal);
                                    }
                                    known = snapshot;
                                }
                            }
                            Err(e) => {
                                error!("Device monitor stopped: {}", e);
                                break;
                            }
                        },
                        Err(e) => {
                            warn!("Failed to read adb track-devices: {}", e);
                            break;
                        }
                    },
                    _ = &mut shutdown_rx => {
                        debug!("Device monitor shutting down");
                        break;
                    }
                }
            }

            if let Err(e) = child.kill().await {
                debug!("track-devices already gone: {}", e);
            }
        });

        Ok(Self {
            hub,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Stop the background `adb` process and wait for it to be reaped.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Device monitor task failed: {}", e);
            }
        }
    }

    pub fn hub(&self) -> &SignalHub {
        &self.hub
    }
}

/// Read until one full device list arrives; later lists in the same read
/// supersede it.
async fn read_first_snapshot<R>(
    reader: &mut R,
    decoder: &mut FrameDecoder,
) -> Result<DeviceSnapshot>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::bridge("adb track-devices exited before listing devices"));
        }
        if let Some(snapshot) = decoder.push(&buf[..n])?.pop() {
            return Ok(snapshot);
        }
    }
}

impl DeviceBridge for AdbDeviceMonitor {
    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.hub.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, DeviceState)]) -> DeviceSnapshot {
        entries
            .iter()
            .map(|(serial, state)| (serial.to_string(), *state))
            .collect()
    }

    #[test]
    fn test_decoder_single_frame() {
        let mut decoder = FrameDecoder::new();
        let snapshots = decoder.push(b"0016emulator-5554\toffline\n").unwrap();
        assert_eq!(
            snapshots,
            vec![snapshot(&[("emulator-5554", DeviceState::Offline)])]
        );
    }

    #[test]
    fn test_decoder_empty_list_and_split_frames() {
        let mut decoder = FrameDecoder::new();
        let mut snapshots = decoder.push(b"00000015emu").unwrap();
        assert_eq!(snapshots, vec![DeviceSnapshot::new()]);

        snapshots = decoder.push(b"lator-5554\tdevice\n").unwrap();
        assert_eq!(
            snapshots,
            vec![snapshot(&[("emulator-5554", DeviceState::Online)])]
        );
    }

    #[test]
    fn test_decoder_tolerates_newlines_between_frames() {
        let mut decoder = FrameDecoder::new();
        let snapshots = decoder.push(b"0000\n0000\n").unwrap();
        assert_eq!(snapshots.len(), 2);
    }

    #[tokio::test]
    async fn test_first_snapshot_is_the_attached_list() {
        let mut reader: &[u8] = b"0015emulator-5554\tdevice\n0016emu";
        let mut decoder = FrameDecoder::new();

        let attached = read_first_snapshot(&mut reader, &mut decoder).await.unwrap();
        assert_eq!(
            attached,
            snapshot(&[("emulator-5554", DeviceState::Online)])
        );

        // The partial second frame stays buffered for the monitor task
        let rest = decoder.push(b"lator-5556\toffline\n").unwrap();
        assert_eq!(
            rest,
            vec![snapshot(&[("emulator-5556", DeviceState::Offline)])]
        );
    }

    #[tokio::test]
    async fn test_first_snapshot_fails_when_adb_exits() {
        let mut reader: &[u8] = b"";
        let result = read_first_snapshot(&mut reader, &mut FrameDecoder::new()).await;
        assert!(matches!(result, Err(Error::Bridge { .. })));
    }

    #[test]
    fn test_decoder_rejects_garbage_header() {
        let mut decoder = FrameDecoder::new();
        assert!(matches!(decoder.push(b"xyz!"), Err(Error::Bridge { .. })));
    }

    #[test]
    fn test_parse_multiple_devices() {
        let list = parse_device_list("emulator-5554\tdevice\nR58M123ABC\tunauthorized\n");
        assert_eq!(list.len(), 2);
        assert_eq!(list["emulator-5554"], DeviceState::Online);
        assert_eq!(list["R58M123ABC"], DeviceState::Unauthorized);
    }

    #[test]
    fn test_diff_new_offline_device() {
        let next = snapshot(&[("emulator-5554", DeviceState::Offline)]);
        let signals = diff_snapshots(&DeviceSnapshot::new(), &next);
        assert_eq!(
            signals,
            vec![DeviceSignal::Connected(Device::new(
                "emulator-5554",
                DeviceState::Offline
            ))]
        );
    }

    #[test]
    fn test_diff_new_online_device_reports_state_change() {
        let next = snapshot(&[("emulator-5554", DeviceState::Online)]);
        let signals = diff_snapshots(&DeviceSnapshot::new(), &next);
        let device = Device::new("emulator-5554", DeviceState::Online);
        assert_eq!(
            signals,
            vec![
                DeviceSignal::Connected(device.clone()),
                DeviceSignal::StateChanged(device, DeviceChange::STATE),
            ]
        );
    }

    #[test]
    fn test_diff_state_change_and_disconnect() {
        let previous = snapshot(&[
            ("emulator-5554", DeviceState::Offline),
            ("emulator-5556", DeviceState::Online),
        ]);
        let next = snapshot(&[("emulator-5554", DeviceState::Online)]);

        let signals = diff_snapshots(&previous, &next);
        assert_eq!(
            signals,
            vec![
                DeviceSignal::StateChanged(
                    Device::new("emulator-5554", DeviceState::Online),
                    DeviceChange::STATE
                ),
                DeviceSignal::Disconnected(Device::new("emulator-5556", DeviceState::Online)),
            ]
        );
    }

    #[test]
    fn test_diff_unchanged_is_silent() {
        let same = snapshot(&[("emulator-5554", DeviceState::Online)]);
        assert!(diff_snapshots(&same, &same).is_empty());
    }
}
