//! Android SDK tool resolution
//!
//! `emulator` and `adb` are looked up, in order:
//! 1. an explicitly configured path
//! 2. `<root>/emulator/emulator` and `<root>/platform-tools/adb` under the
//!    configured SDK root, `ANDROID_HOME`, then `ANDROID_SDK_ROOT`
//! 3. `PATH`

use std::path::{Path, PathBuf};

use edemon_core::prelude::*;

/// Environment variables naming the SDK root, in lookup order
const SDK_ROOT_VARS: [&str; 2] = ["ANDROID_HOME", "ANDROID_SDK_ROOT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Emulator,
    Adb,
}

impl Tool {
    pub fn binary_name(&self) -> String {
        let stem = match self {
            Self::Emulator => "emulator",
            Self::Adb => "adb",
        };
        format!("{}{}", stem, std::env::consts::EXE_SUFFIX)
    }

    /// Directory holding the tool, relative to the SDK root
    fn sdk_subdir(&self) -> &'static str {
        match self {
            Self::Emulator => "emulator",
            Self::Adb => "platform-tools",
        }
    }
}

/// Configured locations that take precedence over discovery
#[derive(Debug, Clone, Default)]
pub struct ToolOverrides {
    pub sdk_root: Option<PathBuf>,
    pub emulator: Option<PathBuf>,
    pub adb: Option<PathBuf>,
}

/// Resolved paths to the SDK binaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkTools {
    pub emulator: PathBuf,
    pub adb: PathBuf,
}

impl SdkTools {
    pub fn new(emulator: impl Into<PathBuf>, adb: impl Into<PathBuf>) -> Self {
        Self {
            emulator: emulator.into(),
            adb: adb.into(),
        }
    }

    /// Resolve both tools from overrides, the environment and `PATH`.
    pub fn resolve(overrides: &ToolOverrides) -> Result<Self> {
        let roots = sdk_roots(overrides.sdk_root.as_deref(), |var| std::env::var(var).ok());
        let tools = Self {
            emulator: locate(Tool::Emulator, overrides.emulator.as_deref(), &roots)?,
            adb: locate(Tool::Adb, overrides.adb.as_deref(), &roots)?,
        };
        debug!(
            "Using emulator {} and adb {}",
            tools.emulator.display(),
            tools.adb.display()
        );
        Ok(tools)
    }
}

/// SDK roots to search, configured root first.
fn sdk_roots(configured: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = configured.map(Path::to_path_buf).into_iter().collect();
    roots.extend(
        SDK_ROOT_VARS
            .iter()
            .filter_map(|var| env(var))
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from),
    );
    roots
}

fn locate(tool: Tool, explicit: Option<&Path>, roots: &[PathBuf]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(canonical(path))
        } else {
            Err(Error::tool_not_found(path.display().to_string()))
        };
    }

    let name = tool.binary_name();
    if let Some(path) = roots
        .iter()
        .map(|root| root.join(tool.sdk_subdir()).join(&name))
        .find(|path| path.is_file())
    {
        return Ok(canonical(&path));
    }

    match which::which(&name) {
        Ok(path) => Ok(canonical(&path)),
        Err(e) => {
            debug!("{} not on PATH: {}", name, e);
            Err(Error::tool_not_found(name))
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeSdk;
    use serial_test::serial;

    #[test]
    fn test_roots_prefer_configured() {
        let roots = sdk_roots(Some(Path::new("/configured")), |var| match var {
            "ANDROID_HOME" => Some("/home-sdk".to_string()),
            "ANDROID_SDK_ROOT" => Some("/root-sdk".to_string()),
            _ => None,
        });
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/configured"),
                PathBuf::from("/home-sdk"),
                PathBuf::from("/root-sdk"),
            ]
        );
    }

    #[test]
    fn test_roots_skip_blank_variables() {
        let roots = sdk_roots(None, |var| match var {
            "ANDROID_HOME" => Some("  ".to_string()),
            _ => None,
        });
        assert!(roots.is_empty());
    }

    #[test]
    fn test_explicit_paths_win() {
        let sdk = FakeSdk::new();
        let overrides = ToolOverrides {
            sdk_root: Some(PathBuf::from("/nonexistent")),
            emulator: Some(sdk.emulator()),
            adb: Some(sdk.adb()),
        };
        let tools = SdkTools::resolve(&overrides).unwrap();
        assert_eq!(tools.emulator, canonical(&sdk.emulator()));
        assert_eq!(tools.adb, canonical(&sdk.adb()));
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let overrides = ToolOverrides {
            adb: Some(PathBuf::from("/nonexistent/adb")),
            ..Default::default()
        };
        let result = locate(Tool::Adb, overrides.adb.as_deref(), &[]);
        match result {
            Err(Error::ToolNotFound { tool }) => assert_eq!(tool, "/nonexistent/adb"),
            other => panic!("expected ToolNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_sdk_root_layout() {
        let sdk = FakeSdk::new();
        let overrides = ToolOverrides {
            sdk_root: Some(sdk.root().to_path_buf()),
            ..Default::default()
        };
        let tools = SdkTools::resolve(&overrides).unwrap();
        assert_eq!(tools, SdkTools::new(canonical(&sdk.emulator()), canonical(&sdk.adb())));
    }

    #[test]
    #[serial]
    fn test_android_home_is_searched() {
        let sdk = FakeSdk::new();
        std::env::set_var("ANDROID_HOME", sdk.root());
        let tools = SdkTools::resolve(&ToolOverrides::default());
        std::env::remove_var("ANDROID_HOME");

        assert_eq!(tools.unwrap().adb, canonical(&sdk.adb()));
    }

    #[test]
    fn test_unresolvable_tool_names_the_binary() {
        if which::which(Tool::Emulator.binary_name()).is_ok() {
            // A real SDK is on PATH
            return;
        }
        let result = locate(Tool::Emulator, None, &[PathBuf::from("/nonexistent")]);
        match result {
            Err(Error::ToolNotFound { tool }) => assert!(tool.starts_with("emulator")),
            other => panic!("expected ToolNotFound, got {:?}", other),
        }
    }
}
