//! Bridge configuration.
//!
//! Loaded from a YAML file; every field has a default so an empty file (or no
//! file at all) yields a working configuration.
//!
//! ```yaml
//! name: living-room
//! serial:
//!   path: /dev/ttyUSB0
//!   baud_rate: 38400
//! listen:
//!   bind: 0.0.0.0
//!   port: 4001
//! buffer_size: 1024
//! tick_interval_ms: 10
//! publish_volume: true
//! command_scope: per_client
//! ```

use crate::bridge::{check_drain_bound, BridgeOptions};
use crate::command::ScratchScope;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Serial device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    /// Baud rate.
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: 38400,
        }
    }
}

/// TCP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenConfig {
    /// Address to bind.
    pub bind: String,
    /// TCP port for mirror clients.
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            bind: "0.0.0.0".to_string(),
            port: 4001,
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Instance name used as a metric label.
    pub name: String,
    /// Serial device.
    pub serial: SerialConfig,
    /// TCP listener.
    pub listen: ListenConfig,
    /// Ring buffer capacity in bytes (power of two).
    pub buffer_size: usize,
    /// Milliseconds between ticks.
    pub tick_interval_ms: u64,
    /// Publish the parsed volume.
    pub publish_volume: bool,
    /// Command scratch scoping.
    pub command_scope: ScratchScope,
    /// Device bytes drained per tick at most.
    pub max_device_bytes_per_tick: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let options = BridgeOptions::default();
        BridgeConfig {
            name: "avr-bridge".to_string(),
            serial: SerialConfig::default(),
            listen: ListenConfig::default(),
            buffer_size: options.buffer_size,
            tick_interval_ms: 10,
            publish_volume: options.publish_volume,
            command_scope: options.scratch_scope,
            max_device_bytes_per_tick: options.max_device_bytes_per_tick,
        }
    }
}

impl BridgeConfig {
    /// Read and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document deserializes as null, not as an empty mapping.
        let config: BridgeConfig = if text.trim().is_empty() {
            BridgeConfig::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < 2 || !self.buffer_size.is_power_of_two() {
            return Err(BridgeError::Config(format!(
                "buffer_size must be a power of two of at least 2, got {}",
                self.buffer_size
            )));
        }
        if self.serial.path.is_empty() {
            return Err(BridgeError::Config("serial.path must not be empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(BridgeError::Config("serial.baud_rate must be non-zero".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(BridgeError::Config("tick_interval_ms must be non-zero".to_string()));
        }
        check_drain_bound(self.max_device_bytes_per_tick, self.buffer_size)
    }

    /// Options for [`crate::Bridge::new`].
    pub fn options(&self) -> BridgeOptions {
        BridgeOptions {
            buffer_size: self.buffer_size,
            publish_volume: self.publish_volume,
            max_device_bytes_per_tick: self.max_device_bytes_per_tick,
            scratch_scope: self.command_scope,
        }
    }

    /// `host:port` string for binding the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen.bind, self.listen.port)
    }

    /// Delay between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.listen.port, 4001);
        assert_eq!(config.listen_addr(), "0.0.0.0:4001");
        assert_eq!(config.serial.baud_rate, 38400);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
        assert!(config.publish_volume);
        assert_eq!(config.command_scope, ScratchScope::PerClient);
        assert_eq!(config.max_device_bytes_per_tick, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(BridgeConfig::from_yaml_str("").unwrap(), BridgeConfig::default());
        assert_eq!(BridgeConfig::from_yaml_str("  \n").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
name: den
serial:
  path: /dev/ttyS1
listen:
  port: 5000
command_scope: shared
publish_volume: false
"#;
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.name, "den");
        assert_eq!(config.serial.path, "/dev/ttyS1");
        assert_eq!(config.serial.baud_rate, 38400);
        assert_eq!(config.listen_addr(), "0.0.0.0:5000");
        assert_eq!(config.command_scope, ScratchScope::Shared);

        let options = config.options();
        assert!(!options.publish_volume);
        assert_eq!(options.scratch_scope, ScratchScope::Shared);
        assert_eq!(options.buffer_size, 1024);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(matches!(
            BridgeConfig::from_yaml_str("buffer: 1024\n"),
            Err(BridgeError::Yaml(_))
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        for yaml in [
            "buffer_size: 1000",
            "buffer_size: 1",
            "tick_interval_ms: 0",
            "max_device_bytes_per_tick: 0",
            "max_device_bytes_per_tick: 513",
            "buffer_size: 512\nmax_device_bytes_per_tick: 512",
            "serial:\n  baud_rate: 0",
            "serial:\n  path: ''",
        ] {
            assert!(
                matches!(BridgeConfig::from_yaml_str(yaml), Err(BridgeError::Config(_))),
                "accepted {:?}",
                yaml
            );
        }
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "buffer_size: 4096").unwrap();
        writeln!(file, "tick_interval_ms: 25").unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.tick_interval(), Duration::from_millis(25));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = BridgeConfig::load(dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }
}
