//! Command lines and spawn options
//!
//! A [`CommandLine`] is an ordered list of trimmed, non-empty tokens: the
//! program followed by its arguments. Blank tokens are dropped on insertion so
//! optional arguments can be appended unconditionally.

use std::fmt;
use std::path::PathBuf;

/// Program path plus arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    /// Start a command line with `program` as the first token.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self::default().arg(program)
    }

    /// Split a single command string on whitespace.
    ///
    /// No shell quoting is interpreted.
    pub fn parse(line: &str) -> Self {
        Self::default().args(line.split_whitespace())
    }

    /// Append one token. Blank tokens are ignored.
    #[must_use]
    pub fn arg(mut self, token: impl AsRef<str>) -> Self {
        let token = token.as_ref().trim();
        if !token.is_empty() {
            self.tokens.push(token.to_string());
        }
        self
    }

    /// Append several tokens, dropping blank ones.
    #[must_use]
    pub fn args<I, S>(self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens.into_iter().fold(self, |cmd, token| cmd.arg(token))
    }

    /// Append `flag value` only when `value` is present.
    #[must_use]
    pub fn opt_arg(self, flag: &str, value: Option<impl AsRef<str>>) -> Self {
        match value {
            Some(value) if !value.as_ref().trim().is_empty() => self.arg(flag).arg(value),
            _ => self,
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    pub fn arguments(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or_default()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

impl<S: AsRef<str>> FromIterator<S> for CommandLine {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::default().args(iter)
    }
}

/// Per-spawn process settings.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Extra environment variables, applied on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Working directory for the child
    pub current_dir: Option<PathBuf>,
}

impl ProcessOptions {
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_tokens_are_dropped() {
        let cmd = CommandLine::new("emulator")
            .arg("-avd")
            .arg("  Pixel_6  ")
            .arg("")
            .arg("   ")
            .args(["-no-window", " ", "-gpu", "off"]);

        assert_eq!(
            cmd.tokens(),
            &["emulator", "-avd", "Pixel_6", "-no-window", "-gpu", "off"]
        );
        assert_eq!(cmd.program(), Some("emulator"));
        assert_eq!(cmd.arguments().len(), 5);
    }

    #[test]
    fn test_parse_single_string() {
        let cmd = CommandLine::parse("  adb -s emulator-5554   shell getprop ");
        assert_eq!(
            cmd.tokens(),
            &["adb", "-s", "emulator-5554", "shell", "getprop"]
        );
        assert_eq!(cmd.to_string(), "adb -s emulator-5554 shell getprop");
    }

    #[test]
    fn test_opt_arg() {
        let cmd = CommandLine::new("emulator")
            .opt_arg("-sdcard", Some("/tmp/sd.img"))
            .opt_arg("-skin", None::<&str>)
            .opt_arg("-prop", Some("  "));
        assert_eq!(cmd.tokens(), &["emulator", "-sdcard", "/tmp/sd.img"]);
    }

    #[test]
    fn test_empty_command_line() {
        let cmd = CommandLine::new("  ");
        assert!(cmd.is_empty());
        assert_eq!(cmd.program(), None);
        assert!(cmd.arguments().is_empty());
    }

    #[test]
    fn test_collect_from_iterator() {
        let cmd: CommandLine = vec!["sh", "-c", "exit 0"].into_iter().collect();
        assert_eq!(cmd.program(), Some("sh"));
        assert_eq!(cmd.arguments(), &["-c", "exit 0"]);
    }

    #[test]
    fn test_process_options_builder() {
        let options = ProcessOptions::default()
            .env("ANDROID_SDK_ROOT", "/opt/android")
            .current_dir("/tmp");
        assert_eq!(options.env.len(), 1);
        assert_eq!(options.current_dir, Some(PathBuf::from("/tmp")));
    }
}
