//! Bridge configuration — TOML file with `UARTBRIDGE_*` environment overrides.
//!
//! All fields default sensibly so the bridge runs with no config file at
//! all. A partial TOML file only overrides the fields it names:
//!
//! ```toml
//! default_baud_rate = 9600
//! poll_interval_ms = 50
//! allowed_path_prefixes = ["/dev/ttyAMA", "/dev/ttyS"]
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// Default serial device path prefixes accepted by the native driver.
/// Restricting open() to known serial paths prevents arbitrary file access
/// through the bridge.
const DEFAULT_PATH_PREFIXES: &[&str] = &[
    "/dev/ttyACM",
    "/dev/ttyAMA",
    "/dev/ttyS",
    "/dev/ttyUSB",
    "/dev/tty.usbmodem",
    "/dev/cu.usbmodem",
    "/dev/tty.usbserial",
    "/dev/cu.usbserial",
    "COM",
];

const DEFAULT_BAUD_RATE: u32 = 115_200;
const DEFAULT_EVENT_CAPACITY: usize = 64;
const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

/// Runtime configuration for the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Serial device path prefixes the native driver will open.
    pub allowed_path_prefixes: Vec<String>,
    /// Line rate used when `openUart` supplies no explicit rate.
    pub default_baud_rate: u32,
    /// Capacity of the data-available broadcast channel.
    pub event_capacity: usize,
    /// Interval at which driver watchers poll for pending input, in ms.
    pub poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            allowed_path_prefixes: DEFAULT_PATH_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            default_baud_rate: DEFAULT_BAUD_RATE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl BridgeConfig {
    /// Load configuration: defaults, then the TOML file (if given), then
    /// `UARTBRIDGE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from a TOML file. A parse failure is a startup
    /// error; the bridge never runs on a half-read config.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            BridgeError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply `UARTBRIDGE_*` overrides from the given lookup. Factored over a
    /// closure so tests do not mutate process-wide environment state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("UARTBRIDGE_DEFAULT_BAUD_RATE") {
            self.default_baud_rate = parse_env("UARTBRIDGE_DEFAULT_BAUD_RATE", &raw)?;
        }
        if let Some(raw) = lookup("UARTBRIDGE_EVENT_CAPACITY") {
            self.event_capacity = parse_env("UARTBRIDGE_EVENT_CAPACITY", &raw)?;
        }
        if let Some(raw) = lookup("UARTBRIDGE_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_env("UARTBRIDGE_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("UARTBRIDGE_ALLOWED_PATH_PREFIXES") {
            self.allowed_path_prefixes = raw
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        Ok(())
    }

    /// Whether the native driver may open the given serial path.
    pub fn is_path_allowed(&self, path: &str) -> bool {
        self.allowed_path_prefixes
            .iter()
            .any(|p| path.starts_with(p.as_str()))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| BridgeError::Config(format!("invalid value for {}: {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.default_baud_rate, 115_200);
        assert_eq!(config.event_capacity, 64);
        assert_eq!(config.poll_interval_ms, 20);
        assert!(config.is_path_allowed("/dev/ttyUSB0"));
        assert!(config.is_path_allowed("COM3"));
        assert!(!config.is_path_allowed("/etc/passwd"));
    }

    #[test]
    fn test_partial_toml_overrides_named_fields_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_baud_rate = 9600").unwrap();
        let config = BridgeConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.default_baud_rate, 9600);
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn test_invalid_toml_is_a_startup_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_baud_rate = \"fast\"").unwrap();
        let err = BridgeConfig::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_unknown_toml_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bogus_key = 1").unwrap();
        assert!(BridgeConfig::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BridgeConfig::default();
        config
            .apply_env_overrides(|key| match key {
                "UARTBRIDGE_DEFAULT_BAUD_RATE" => Some("57600".into()),
                "UARTBRIDGE_ALLOWED_PATH_PREFIXES" => Some("/dev/ttyAMA, /dev/ttyS".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.default_baud_rate, 57_600);
        assert!(config.is_path_allowed("/dev/ttyAMA0"));
        assert!(!config.is_path_allowed("/dev/ttyUSB0"));
    }

    #[test]
    fn test_env_override_invalid_value_rejected() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_env_overrides(|key| {
                (key == "UARTBRIDGE_EVENT_CAPACITY").then(|| "lots".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
