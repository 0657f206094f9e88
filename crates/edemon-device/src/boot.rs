//! Emulator boot orchestration
//!
//! [`EmulatorBooter::boot`] runs two deadline-bounded phases against a single
//! boot budget:
//! 1. the transport comes online (device bridge reports `device`)
//! 2. the OS finishes booting (`getprop` reports `sys.boot_completed`)
//!
//! Phase 2 gets whatever time phase 1 left over. Each phase has its own
//! error so "the emulator never started" is distinguishable from "the
//! emulator started but never finished booting".

use std::sync::Arc;
use std::time::Duration;

use edemon_core::prelude::*;
use edemon_core::{Deadline, TimeUnit};
use edemon_process::{ProcessExecution, ProcessExecutor};

use crate::avds::{ensure_avd_exists, list_avds};
use crate::bridge::DeviceBridge;
use crate::device::{Device, DeviceState};
use crate::discovery::DeviceDiscovery;
use crate::emulator::{emulator_interaction, EmulatorOptions};
use crate::shell::DeviceShell;
use crate::tools::SdkTools;

/// Time budgets for booting and stopping, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootTimeouts {
    /// Total budget for both boot phases
    pub boot_secs: u64,
    /// Cadence of online / boot-completed checks
    pub step_secs: u64,
    /// How long `stop` waits for the device to disconnect
    pub shutdown_secs: u64,
}

impl Default for BootTimeouts {
    fn default() -> Self {
        Self {
            boot_secs: 120,
            step_secs: 1,
            shutdown_secs: 20,
        }
    }
}

/// A booted emulator and the process running it
#[derive(Debug, Clone)]
pub struct RunningEmulator {
    pub avd: String,
    pub device: Device,
    pub execution: ProcessExecution,
}

impl RunningEmulator {
    pub fn serial(&self) -> &str {
        &self.device.serial
    }
}

/// Boots and stops emulators.
#[derive(Clone)]
pub struct EmulatorBooter {
    executor: ProcessExecutor,
    bridge: Arc<dyn DeviceBridge>,
    tools: SdkTools,
    timeouts: BootTimeouts,
}

impl std::fmt::Debug for EmulatorBooter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatorBooter")
            .field("tools", &self.tools)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl EmulatorBooter {
    pub fn new(
        executor: ProcessExecutor,
        bridge: Arc<dyn DeviceBridge>,
        tools: SdkTools,
        timeouts: BootTimeouts,
    ) -> Self {
        Self {
            executor,
            bridge,
            tools,
            timeouts,
        }
    }

    pub fn timeouts(&self) -> BootTimeouts {
        self.timeouts
    }

    fn step(&self) -> Duration {
        TimeUnit::Seconds.to_duration(self.timeouts.step_secs.max(1))
    }

    fn shell(&self, serial: &str) -> DeviceShell {
        DeviceShell::new(self.executor.clone(), &self.tools.adb, serial)
    }

    /// Boot `options.avd` and wait until it is online, booted and unlocked.
    ///
    /// The emulator process stays registered with the executor, so an
    /// executor shutdown still terminates it.
    #[instrument(skip(self, options), fields(avd = %options.avd))]
    pub async fn boot(&self, options: &EmulatorOptions) -> Result<RunningEmulator> {
        let avds = list_avds(&self.executor, &self.tools).await?;
        ensure_avd_exists(&avds, &options.avd)?;

        let deadline = Deadline::new(self.timeouts.boot_secs, TimeUnit::Seconds)?;
        let discovery = DeviceDiscovery::start(Arc::clone(&self.bridge), options.device_filter());

        let result = self.boot_with(options, &discovery, &deadline).await;
        discovery.close();
        result
    }

    async fn boot_with(
        &self,
        options: &EmulatorOptions,
        discovery: &DeviceDiscovery,
        deadline: &Deadline,
    ) -> Result<RunningEmulator> {
        let command = options.command_line(&self.tools.emulator);
        info!("Booting {}: {}", options.avd, command);
        let execution = self.executor.spawn(emulator_interaction()?, &command)?;

        // Phase 1: transport online. An emulator that exits early ends the wait.
        let online = {
            let discovery = discovery.clone();
            let execution = execution.clone();
            self.executor
                .poll_until(deadline, self.step(), move || {
                    let ready = discovery.is_online() || execution.is_finished();
                    async move { ready }
                })
                .await
        };

        let device = match discovery.device() {
            Some(device) if online && discovery.is_online() => device,
            _ => {
                if execution.is_finished() {
                    warn!(
                        "Emulator for {} exited with code {:?}",
                        options.avd,
                        execution.exit_code().ok()
                    );
                }
                self.abandon(&execution).await;
                return Err(Error::DeviceNeverOnline {
                    avd: options.avd.clone(),
                    waited_secs: deadline.time_elapsed(),
                });
            }
        };
        info!(
            "{} online as {} after {}s",
            options.avd,
            device.serial,
            deadline.time_elapsed()
        );

        // Phase 2: OS boot, within whatever is left of the same budget
        let shell = self.shell(&device.serial);
        let booted = {
            let shell = shell.clone();
            self.executor
                .poll_until(deadline, self.step(), move || {
                    let shell = shell.clone();
                    async move { shell.is_boot_completed().await }
                })
                .await
        };
        if !booted {
            self.abandon(&execution).await;
            return Err(Error::BootIncomplete {
                serial: device.serial,
                waited_secs: deadline.time_elapsed(),
            });
        }
        info!(
            "{} finished booting after {}s",
            device.serial,
            deadline.time_elapsed()
        );

        shell.unlock().await;

        Ok(RunningEmulator {
            avd: options.avd.clone(),
            device,
            execution,
        })
    }

    /// Shut `emulator` down through its console, force-killing it if it lingers.
    ///
    /// Fails with [`Error::DeviceNeverDisconnected`] when neither the
    /// disconnect nor the process exit was observed in time; the process is
    /// force-killed in that case too.
    #[instrument(skip(self, emulator), fields(serial = %emulator.device.serial))]
    pub async fn stop(&self, emulator: &RunningEmulator) -> Result<()> {
        let tracked = Device::new(emulator.device.serial.clone(), DeviceState::Online);
        let discovery = DeviceDiscovery::tracking(Arc::clone(&self.bridge), tracked);
        let deadline = Deadline::new(self.timeouts.shutdown_secs, TimeUnit::Seconds)?;

        if let Err(e) = self.shell(emulator.serial()).emu_kill().await {
            warn!("emu kill failed for {}: {}", emulator.serial(), e);
        }

        let gone = {
            let discovery = discovery.clone();
            let execution = emulator.execution.clone();
            self.executor
                .poll_until(&deadline, self.step(), move || {
                    let gone = discovery.is_offline() || execution.is_finished();
                    async move { gone }
                })
                .await
        };
        discovery.close();
        self.abandon(&emulator.execution).await;

        if gone {
            info!("{} stopped", emulator.serial());
            Ok(())
        } else {
            Err(Error::DeviceNeverDisconnected {
                serial: emulator.device.serial.clone(),
                waited_secs: deadline.time_elapsed(),
            })
        }
    }

    /// Force-kill a still-running emulator and drop it from the cleanup registry.
    async fn abandon(&self, execution: &ProcessExecution) {
        if !execution.is_finished() {
            debug!("Killing emulator process {}", execution.id());
            execution.kill();
            if let Err(e) = execution.wait().await {
                warn!("Lost track of emulator process {}: {}", execution.id(), e);
            }
        }
        self.executor.unregister(execution.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::SignalHub;
    use crate::signal::{DeviceChange, DeviceSignal};
    use crate::test_utils::FakeSdk;
    use edemon_process::test_utils::{sh, CollectingSink};
    use edemon_process::ProcessInteraction;
    use tokio_test::assert_err;

    fn booter(sdk: &FakeSdk, hub: &SignalHub, timeouts: BootTimeouts) -> EmulatorBooter {
        EmulatorBooter::new(
            ProcessExecutor::with_sink(CollectingSink::new()),
            Arc::new(hub.clone()),
            sdk.tools(),
            timeouts,
        )
    }

    fn short_timeouts() -> BootTimeouts {
        BootTimeouts {
            boot_secs: 3,
            step_secs: 1,
            shutdown_secs: 3,
        }
    }

    /// Publish connect + online for `serial` once the discovery subscribed.
    fn bring_online(hub: &SignalHub, serial: &'static str) {
        let hub = hub.clone();
        tokio::spawn(async move {
            while hub.subscriber_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            let offline = Device::new(serial, DeviceState::Offline);
            let online = Device::new(serial, DeviceState::Online);
            hub.publish(DeviceSignal::Connected(offline));
            hub.publish(DeviceSignal::StateChanged(online, DeviceChange::STATE));
        });
    }

    #[tokio::test]
    async fn test_boot_happy_path() {
        let sdk = FakeSdk::new();
        sdk.set_boot_completed(true);
        let hub = SignalHub::new();
        let booter = booter(&sdk, &hub, short_timeouts());

        bring_online(&hub, "emulator-5580");
        let options = EmulatorOptions::new("Pixel_6_API_33").ports(Some(5580), Some(5581));
        let emulator = booter.boot(&options).await.unwrap();

        assert_eq!(emulator.serial(), "emulator-5580");
        assert!(!emulator.execution.is_finished());
        assert_eq!(
            sdk.emulator_calls(),
            vec!["-avd Pixel_6_API_33 -ports 5580,5581"]
        );
        let adb_calls = sdk.adb_calls();
        assert!(adb_calls.contains(&"-s emulator-5580 shell getprop".to_string()));
        assert!(adb_calls.ends_with(&[
            "-s emulator-5580 shell input keyevent 82".to_string(),
            "-s emulator-5580 shell input keyevent 4".to_string(),
        ]));
        // Discovery unsubscribed once booted
        assert_eq!(hub.subscriber_count(), 0);

        booter.stop(&emulator).await.unwrap();
        assert!(emulator.execution.is_finished());
    }

    #[tokio::test]
    async fn test_unknown_avd_fails_before_spawning() {
        let sdk = FakeSdk::new();
        let hub = SignalHub::new();
        let booter = booter(&sdk, &hub, short_timeouts());

        let result = booter.boot(&EmulatorOptions::new("Missing_AVD")).await;

        assert!(matches!(result, Err(Error::AvdNotFound { .. })));
        assert!(sdk.emulator_calls().is_empty());
    }

    #[tokio::test]
    async fn test_never_online() {
        let sdk = FakeSdk::new();
        let hub = SignalHub::new();
        let booter = booter(&sdk, &hub, short_timeouts());

        let result = booter.boot(&EmulatorOptions::new("Pixel_6_API_33")).await;

        match result {
            Err(Error::DeviceNeverOnline { avd, waited_secs }) => {
                assert_eq!(avd, "Pixel_6_API_33");
                assert!(waited_secs >= 2, "waited {}s", waited_secs);
            }
            other => panic!("expected DeviceNeverOnline, got {:?}", other),
        }
        assert_eq!(hub.subscriber_count(), 0);
        assert!(booter.executor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_emulator_crash_ends_wait_early() {
        let sdk = FakeSdk::new();
        sdk.set_emulator_panics(true);
        let hub = SignalHub::new();
        let booter = booter(
            &sdk,
            &hub,
            BootTimeouts {
                boot_secs: 30,
                ..short_timeouts()
            },
        );

        let started = tokio::time::Instant::now();
        let result = booter.boot(&EmulatorOptions::new("Pixel_6_API_33")).await;

        assert!(matches!(result, Err(Error::DeviceNeverOnline { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_online_but_never_booted() {
        let sdk = FakeSdk::new();
        sdk.set_boot_completed(false);
        let hub = SignalHub::new();
        let booter = booter(&sdk, &hub, short_timeouts());

        bring_online(&hub, "emulator-5554");
        let result = booter.boot(&EmulatorOptions::new("Pixel_6_API_33")).await;

        match result {
            Err(Error::BootIncomplete { serial, .. }) => assert_eq!(serial, "emulator-5554"),
            other => panic!("expected BootIncomplete, got {:?}", other),
        }
        assert!(booter.executor.registry().is_empty());
        // The unlock sequence never ran
        assert!(!sdk
            .adb_calls()
            .iter()
            .any(|call| call.contains("keyevent")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_gives_up_after_shutdown_budget() {
        let sdk = FakeSdk::new();
        let hub = SignalHub::new();
        let booter = booter(&sdk, &hub, BootTimeouts::default());

        // An emulator that ignores `emu kill` and never disconnects
        let execution = booter
            .executor
            .spawn(ProcessInteraction::silent(), &sh("sleep 600"))
            .unwrap();
        let emulator = RunningEmulator {
            avd: "Pixel_6_API_33".to_string(),
            device: Device::new("emulator-5554", DeviceState::Online),
            execution,
        };

        let err = assert_err!(booter.stop(&emulator).await);
        match err {
            Error::DeviceNeverDisconnected {
                serial,
                waited_secs,
            } => {
                assert_eq!(serial, "emulator-5554");
                assert!(waited_secs >= 20, "gave up after {}s", waited_secs);
            }
            other => panic!("expected DeviceNeverDisconnected, got {:?}", other),
        }

        assert!(sdk
            .adb_calls()
            .contains(&"-s emulator-5554 emu kill".to_string()));
        // Force-killed and handed back
        assert!(emulator.execution.is_finished());
        assert!(booter.executor.registry().is_empty());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
