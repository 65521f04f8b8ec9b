//! Port and hotplug configuration.
//!
//! Both structs deserialize with `#[serde(default)]`, so a host can load them
//! from any serde format and specify only the fields it wants to override.
//!
//! ```
//! use lockerlink_hardware::TagPortConfig;
//!
//! let config: TagPortConfig =
//!     serde_json::from_str(r#"{ "device_dir": "/dev/serial/by-id" }"#).unwrap();
//!
//! assert_eq!(config.device_dir.to_str(), Some("/dev/serial/by-id"));
//! assert_eq!(config.baud_rate, 115_200);
//! config.validate().unwrap();
//! ```

use crate::error::{HardwareError, Result};
use lockerlink_core::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_DEVICE_DIR, DEFAULT_DEVICE_ROOT, DEFAULT_SETTLE_INTERVAL_MS, DEFAULT_TEMP_SUFFIX_LEN,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Serial port of the locker-bank controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerPortConfig {
    /// Device node, e.g. `/dev/ttyAMA0`.
    pub port_name: String,

    pub baud_rate: u32,
}

impl Default for LockerPortConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl LockerPortConfig {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// # Errors
    /// Returns `HardwareError::Configuration` for an empty port name or a
    /// zero baud rate.
    pub fn validate(&self) -> Result<()> {
        if self.port_name.trim().is_empty() {
            return Err(HardwareError::configuration("locker port name is empty"));
        }
        if self.baud_rate == 0 {
            return Err(HardwareError::configuration("baud rate must be positive"));
        }
        Ok(())
    }
}

/// Hot-plugged tag readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagPortConfig {
    /// Directory holding one symlink per attached reader.
    pub device_dir: PathBuf,

    /// Device root, watched for removal and recreation of the top-level
    /// directory that contains `device_dir`.
    pub device_root: PathBuf,

    pub baud_rate: u32,

    /// Write timeout for ports opened when a device is plugged in.
    pub connect_timeout_ms: u64,

    /// Write timeout for ports opened on demand by a command.
    pub command_timeout_ms: u64,

    /// Delay before a recreated device directory is enumerated.
    pub settle_interval_ms: u64,

    /// Length of the random suffix of transient symlink names.
    pub temp_suffix_len: usize,
}

impl Default for TagPortConfig {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            device_root: PathBuf::from(DEFAULT_DEVICE_ROOT),
            baud_rate: DEFAULT_BAUD_RATE,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            settle_interval_ms: DEFAULT_SETTLE_INTERVAL_MS,
            temp_suffix_len: DEFAULT_TEMP_SUFFIX_LEN,
        }
    }
}

impl TagPortConfig {
    /// Configuration watching `device_dir` below `device_root`.
    pub fn new(device_dir: impl Into<PathBuf>, device_root: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
            device_root: device_root.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Top-level directory below `device_root` that contains `device_dir`.
    ///
    /// For `/dev/serial/by-path` under `/dev` this is `/dev/serial`.
    pub fn watched_top_dir(&self) -> Result<PathBuf> {
        let relative = self.device_dir.strip_prefix(&self.device_root).map_err(|_| {
            HardwareError::configuration(format!(
                "device directory '{}' is not below device root '{}'",
                self.device_dir.display(),
                self.device_root.display()
            ))
        })?;
        let first = relative.components().next().ok_or_else(|| {
            HardwareError::configuration("device directory must differ from device root")
        })?;
        Ok(self.device_root.join(first))
    }

    /// # Errors
    /// Returns `HardwareError::Configuration` if `device_dir` is not strictly
    /// below `device_root`, the baud rate is zero, or a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        self.watched_top_dir()?;
        if self.baud_rate == 0 {
            return Err(HardwareError::configuration("baud rate must be positive"));
        }
        if self.connect_timeout_ms == 0 || self.command_timeout_ms == 0 {
            return Err(HardwareError::configuration("port timeouts must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_defaults() {
        let config = TagPortConfig::default();
        assert_eq!(config.device_dir, PathBuf::from("/dev/serial/by-path"));
        assert_eq!(config.device_root, PathBuf::from("/dev"));
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.command_timeout(), Duration::from_secs(1));
        assert_eq!(config.settle_interval(), Duration::from_millis(100));
        assert_eq!(config.temp_suffix_len, 16);
        config.validate().unwrap();
    }

    #[test]
    fn test_watched_top_dir() {
        let config = TagPortConfig::default();
        assert_eq!(config.watched_top_dir().unwrap(), PathBuf::from("/dev/serial"));

        let nested = TagPortConfig::new("/tmp/x/a/b/c", "/tmp/x");
        assert_eq!(nested.watched_top_dir().unwrap(), PathBuf::from("/tmp/x/a"));
    }

    #[test]
    fn test_device_dir_outside_root_rejected() {
        let config = TagPortConfig::new("/var/devices", "/dev");
        assert!(matches!(
            config.validate(),
            Err(HardwareError::Configuration { .. })
        ));
    }

    #[test]
    fn test_device_dir_equal_to_root_rejected() {
        let config = TagPortConfig::new("/dev", "/dev");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = TagPortConfig {
            command_timeout_ms: 0,
            ..TagPortConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TagPortConfig = serde_json::from_str(r#"{ "baud_rate": 9600 }"#).unwrap();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.settle_interval_ms, 100);
    }

    #[test]
    fn test_locker_config() {
        let config: LockerPortConfig =
            serde_json::from_str(r#"{ "port_name": "/dev/ttyAMA0" }"#).unwrap();
        assert_eq!(config.baud_rate, 115_200);
        config.validate().unwrap();

        assert!(LockerPortConfig::default().validate().is_err());
    }
}
