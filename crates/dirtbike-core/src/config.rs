use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADMINDIR: &str = "/var/lib/dpkg";
const DEFAULT_INTERPRETER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 300;
/// Per-stream bound on captured subprocess output.
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    fn flag_is_disabled(&self, key: &str) -> bool {
        self.var(key).is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            )
        })
    }

    fn seconds(&self, key: &str, default: u64) -> Duration {
        let secs = match self.var(key) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    tracing::warn!(key, value = raw, default, "ignoring invalid timeout");
                    default
                }
            },
            None => default,
        };
        Duration::from_secs(secs)
    }

    fn bytes(&self, key: &str, default: usize) -> usize {
        match self.var(key) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => {
                    tracing::warn!(key, value = raw, default, "ignoring invalid byte limit");
                    default
                }
            },
            None => default,
        }
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Settings for one invocation, captured from the environment and then
/// overridden by command-line flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) directory: Option<PathBuf>,
    pub(crate) python: Option<PathBuf>,
    pub(crate) admindir: PathBuf,
    pub(crate) interpreter_timeout: Duration,
    pub(crate) write_timeout: Duration,
    pub(crate) alternates: bool,
    pub(crate) max_capture_bytes: usize,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    #[must_use]
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            directory: snapshot.var("DIRTBIKE_DIRECTORY").map(PathBuf::from),
            python: snapshot.var("DIRTBIKE_PYTHON").map(PathBuf::from),
            admindir: snapshot
                .var("DIRTBIKE_DPKG_ADMINDIR")
                .map_or_else(|| PathBuf::from(DEFAULT_ADMINDIR), PathBuf::from),
            interpreter_timeout: snapshot.seconds(
                "DIRTBIKE_INTERPRETER_TIMEOUT",
                DEFAULT_INTERPRETER_TIMEOUT_SECS,
            ),
            write_timeout: snapshot.seconds("DIRTBIKE_WRITE_TIMEOUT", DEFAULT_WRITE_TIMEOUT_SECS),
            alternates: !snapshot.flag_is_disabled("DIRTBIKE_ALTERNATES"),
            max_capture_bytes: snapshot
                .bytes("DIRTBIKE_MAX_CAPTURE_BYTES", DEFAULT_MAX_CAPTURE_BYTES),
        }
    }

    #[must_use]
    pub fn with_python(mut self, python: Option<PathBuf>) -> Self {
        if python.is_some() {
            self.python = python;
        }
        self
    }

    #[must_use]
    pub fn with_admindir(mut self, admindir: Option<PathBuf>) -> Self {
        if let Some(admindir) = admindir {
            self.admindir = admindir;
        }
        self
    }

    /// `--no-alternates` can only turn the fallback off.
    #[must_use]
    pub fn with_alternates(mut self, enabled: bool) -> Self {
        self.alternates &= enabled;
        self
    }

    /// `DIRTBIKE_DIRECTORY`, the second source in destination precedence.
    #[must_use]
    pub fn directory_override(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    #[must_use]
    pub fn python(&self) -> Option<&Path> {
        self.python.as_deref()
    }

    #[must_use]
    pub fn admindir(&self) -> &Path {
        &self.admindir
    }

    #[must_use]
    pub fn interpreter_timeout(&self) -> Duration {
        self.interpreter_timeout
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    #[must_use]
    pub fn alternates(&self) -> bool {
        self.alternates
    }

    #[must_use]
    pub fn max_capture_bytes(&self) -> usize {
        self.max_capture_bytes
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_snapshot(&EnvSnapshot {
            vars: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[]));
        assert_eq!(config.admindir(), Path::new(DEFAULT_ADMINDIR));
        assert_eq!(config.interpreter_timeout(), Duration::from_secs(30));
        assert_eq!(config.write_timeout(), Duration::from_secs(300));
        assert!(config.alternates());
        assert!(config.python().is_none());
        assert!(config.directory_override().is_none());
        assert_eq!(config.max_capture_bytes(), DEFAULT_MAX_CAPTURE_BYTES);
    }

    #[test]
    fn environment_values_are_read() {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[
            ("DIRTBIKE_DIRECTORY", "/tmp/other"),
            ("DIRTBIKE_PYTHON", "/opt/python/bin/python3"),
            ("DIRTBIKE_DPKG_ADMINDIR", "/srv/dpkg"),
            ("DIRTBIKE_INTERPRETER_TIMEOUT", "5"),
            ("DIRTBIKE_WRITE_TIMEOUT", "nonsense"),
            ("DIRTBIKE_ALTERNATES", "Off"),
            ("DIRTBIKE_MAX_CAPTURE_BYTES", "4096"),
        ]));
        assert_eq!(config.directory_override(), Some(Path::new("/tmp/other")));
        assert_eq!(config.python(), Some(Path::new("/opt/python/bin/python3")));
        assert_eq!(config.admindir(), Path::new("/srv/dpkg"));
        assert_eq!(config.interpreter_timeout(), Duration::from_secs(5));
        assert_eq!(config.write_timeout(), Duration::from_secs(300));
        assert!(!config.alternates());
        assert_eq!(config.max_capture_bytes(), 4096);
    }

    #[test]
    fn invalid_capture_limit_falls_back_to_default() {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[(
            "DIRTBIKE_MAX_CAPTURE_BYTES",
            "0",
        )]));
        assert_eq!(config.max_capture_bytes(), DEFAULT_MAX_CAPTURE_BYTES);
    }

    #[test]
    fn flags_override_environment() {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[
            ("DIRTBIKE_PYTHON", "/usr/bin/python3"),
            ("DIRTBIKE_DPKG_ADMINDIR", "/srv/dpkg"),
        ]))
        .with_python(Some(PathBuf::from("/usr/bin/python3.12")))
        .with_admindir(None)
        .with_alternates(false);
        assert_eq!(config.python(), Some(Path::new("/usr/bin/python3.12")));
        assert_eq!(config.admindir(), Path::new("/srv/dpkg"));
        assert!(!config.alternates());
    }
}
