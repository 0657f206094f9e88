//! Test utilities for device orchestration
//!
//! [`FakeSdk`] writes shell-script stand-ins for `emulator` and `adb` into a
//! temporary directory. The scripts record their arguments and read their
//! canned answers from files the test controls.
//!
//! The fake `adb track-devices` prints the already-attached devices (an
//! empty list by default), waits for the fake emulator to start, prints the
//! configured frames, then prints an empty list again once the emulator
//! process is gone.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::tools::SdkTools;

const FAKE_EMULATOR: &str = r#"#!/bin/sh
DIR="__DIR__"
if [ "$1" = "-list-avds" ]; then
    cat "$DIR/avds" 2>/dev/null
    exit 0
fi
echo "$*" >> "$DIR/emulator.calls"
echo "INFO    | Android emulator version 34.1.19"
if [ -f "$DIR/emulator.panic" ]; then
    echo "PANIC: Missing emulator engine program for 'x86' CPU."
    exit 1
fi
echo $$ > "$DIR/emulator.pid"
exec sleep 600
"#;

const FAKE_ADB: &str = r#"#!/bin/sh
DIR="__DIR__"
echo "$*" >> "$DIR/adb.calls"
if [ "$1" = "track-devices" ]; then
    if [ -f "$DIR/attached" ]; then cat "$DIR/attached"; else printf '0000'; fi
    while [ ! -s "$DIR/emulator.pid" ]; do sleep 0.1; done
    cat "$DIR/track-devices" 2>/dev/null
    while kill -0 "$(cat "$DIR/emulator.pid")" 2>/dev/null; do sleep 0.1; done
    printf '0000'
    exec sleep 600
fi
[ "$1" = "-s" ] && shift 2
case "$*" in
    "shell getprop")
        echo "[ro.kernel.qemu]: [1]"
        if [ -f "$DIR/boot_completed" ]; then
            echo "[sys.boot_completed]: [1]"
        fi
        ;;
    "emu kill")
        [ -f "$DIR/emulator.pid" ] && kill "$(cat "$DIR/emulator.pid")"
        echo "OK: killing emulator, bye bye"
        ;;
esac
exit 0
"#;

/// A temporary Android SDK with scripted `emulator` and `adb` binaries
#[derive(Debug)]
pub struct FakeSdk {
    dir: TempDir,
}

impl Default for FakeSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSdk {
    /// Lay out `emulator/emulator` and `platform-tools/adb` like a real SDK.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp sdk dir");
        let root = dir.path().to_string_lossy().into_owned();

        install(&dir.path().join("emulator/emulator"), &FAKE_EMULATOR.replace("__DIR__", &root));
        install(&dir.path().join("platform-tools/adb"), &FAKE_ADB.replace("__DIR__", &root));

        let sdk = Self { dir };
        sdk.set_avds(&["Pixel_6_API_33"]);
        sdk
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn emulator(&self) -> PathBuf {
        self.root().join("emulator/emulator")
    }

    pub fn adb(&self) -> PathBuf {
        self.root().join("platform-tools/adb")
    }

    pub fn tools(&self) -> SdkTools {
        SdkTools::new(self.emulator(), self.adb())
    }

    /// Names printed by `emulator -list-avds`.
    pub fn set_avds(&self, names: &[&str]) {
        let mut listing = names.join("\n");
        listing.push('\n');
        self.write("avds", &listing);
    }

    /// Whether `getprop` includes the boot-completed marker.
    pub fn set_boot_completed(&self, completed: bool) {
        self.toggle("boot_completed", completed);
    }

    /// Make the emulator print a panic and exit 1 instead of running.
    pub fn set_emulator_panics(&self, panics: bool) {
        self.toggle("emulator.panic", panics);
    }

    /// Frames `adb track-devices` prints while the fake emulator runs.
    pub fn set_track_devices_output(&self, output: &str) {
        self.write("track-devices", output);
    }

    /// First frame `adb track-devices` prints: devices attached before any boot.
    pub fn set_attached_devices(&self, frame: &str) {
        self.write("attached", frame);
    }

    /// Argument lists `adb` was invoked with, in order.
    pub fn adb_calls(&self) -> Vec<String> {
        self.read_lines("adb.calls")
    }

    /// Argument lists the emulator was booted with, in order.
    pub fn emulator_calls(&self) -> Vec<String> {
        self.read_lines("emulator.calls")
    }

    fn write(&self, name: &str, contents: &str) {
        fs::write(self.root().join(name), contents).expect("write fake sdk file");
    }

    fn toggle(&self, name: &str, present: bool) {
        let path = self.root().join(name);
        if present {
            fs::write(path, "").expect("create fake sdk flag");
        } else {
            let _ = fs::remove_file(path);
        }
    }

    fn read_lines(&self, name: &str) -> Vec<String> {
        fs::read_to_string(self.root().join(name))
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

fn install(path: &Path, script: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fake sdk dir");
    }
    fs::write(path, script).expect("write fake tool");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .expect("make fake tool executable");
    }
}
