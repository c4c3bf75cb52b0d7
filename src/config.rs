//! Bridge configuration
//!
//! Assembled once at startup from three layers, later layers winning:
//!
//! ```text
//! defaults -> config.toml -> environment (SERIAL_PORT, BAUD_RATE, MQTT_*)
//! ```
//!
//! The result is validated and then shared read-only for the process lifetime.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::BridgeError;

/// Overrides the config file location
pub const CONFIG_PATH_ENV: &str = "SERIAL_MQTT_BRIDGE_CONFIG";

const APP_DIR: &str = "serial-mqtt-bridge";
const CONFIG_FILE: &str = "config.toml";
const CONTROL_SEGMENT: &str = "control";

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial device, e.g. `/dev/ttyACM0` or `COM3`
    pub serial_port: String,
    pub baud_rate: u32,
    /// Upper bound for one blocking read; also the shutdown latency of the read loop
    pub read_timeout_ms: u64,
    /// Pause after opening the port while the board resets
    pub reset_delay_ms: u64,

    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,

    /// Prefix for sensor topics; control topics live under `{base_topic}/control`
    pub base_topic: String,
    pub command_queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial_port: String::new(),
            baud_rate: 9600,
            read_timeout_ms: 2000,
            reset_delay_ms: 2000,
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "serial-mqtt-bridge".to_string(),
            keep_alive_secs: 60,
            connect_timeout_secs: 10,
            base_topic: "garden/sensors".to_string(),
            command_queue_capacity: 32,
        }
    }
}

impl BridgeConfig {
    /// Loads file and environment layers and validates the result
    pub fn load() -> Result<Self, BridgeError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    BridgeError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&content)?
            }
            Some(path) => {
                debug!("No configuration file at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, BridgeError> {
        toml::from_str(content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Applies environment overrides, reading variables through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SERIAL_PORT") {
            self.serial_port = port;
        }
        if let Some(baud) = lookup("BAUD_RATE") {
            self.baud_rate = parse_env("BAUD_RATE", &baud)?;
        }
        if let Some(host) = lookup("MQTT_BROKER_URL") {
            self.broker_host = host;
        }
        if let Some(port) = lookup("MQTT_BROKER_PORT") {
            self.broker_port = parse_env("MQTT_BROKER_PORT", &port)?;
        }
        if let Some(topic) = lookup("MQTT_BASE_TOPIC") {
            self.base_topic = topic;
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<(), BridgeError> {
        self.serial_port = self.serial_port.trim().to_string();
        if self.serial_port.is_empty() {
            return Err(BridgeError::Config(
                "No serial port configured (set SERIAL_PORT)".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(BridgeError::Config("Baud rate must be non-zero".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "Serial read timeout must be non-zero".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "Broker connect timeout must be non-zero".to_string(),
            ));
        }
        if self.command_queue_capacity == 0 {
            return Err(BridgeError::Config(
                "Command queue capacity must be non-zero".to_string(),
            ));
        }

        self.base_topic = self.base_topic.trim().trim_end_matches('/').to_string();
        if self.base_topic.is_empty() {
            return Err(BridgeError::Config("Base topic must not be empty".to_string()));
        }
        if self.base_topic.contains(['+', '#']) {
            return Err(BridgeError::Config(format!(
                "Base topic must not contain wildcards: {}",
                self.base_topic
            )));
        }
        Ok(())
    }

    /// `{base}/control`
    pub fn control_prefix(&self) -> String {
        format!("{}/{}", self.base_topic, CONTROL_SEGMENT)
    }

    /// `{base}/control/#`
    pub fn control_filter(&self) -> String {
        format!("{}/#", self.control_prefix())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BridgeError> {
    value
        .trim()
        .parse()
        .map_err(|_| BridgeError::Config(format!("Invalid value for {}: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = BridgeConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.broker_host, "localhost");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.base_topic, "garden/sensors");
        assert_eq!(config.control_prefix(), "garden/sensors/control");
        assert_eq!(config.control_filter(), "garden/sensors/control/#");
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = BridgeConfig::default();
        config
            .apply_env(env(&[
                ("SERIAL_PORT", "/dev/ttyACM0"),
                ("BAUD_RATE", "115200"),
                ("MQTT_BROKER_URL", "broker.local"),
                ("MQTT_BROKER_PORT", "8883"),
                ("MQTT_BASE_TOPIC", "greenhouse"),
            ]))
            .unwrap();
        config.validate().unwrap();

        assert_eq!(config.serial_port, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.broker_host, "broker.local");
        assert_eq!(config.broker_port, 8883);
        assert_eq!(config.control_prefix(), "greenhouse/control");
    }

    #[test]
    fn unparsable_env_number_is_rejected() {
        let mut config = BridgeConfig::default();
        let err = config.apply_env(env(&[("BAUD_RATE", "fast")])).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn file_layer_fills_missing_fields_with_defaults() {
        let config = BridgeConfig::from_toml(
            r#"
            serial_port = "COM3"
            base_topic = "plants/"
            "#,
        )
        .unwrap();
        assert_eq!(config.serial_port, "COM3");
        assert_eq!(config.broker_port, 1883);

        let mut config = config;
        config.validate().unwrap();
        assert_eq!(config.base_topic, "plants");
    }

    #[test]
    fn env_wins_over_file() {
        let mut config =
            BridgeConfig::from_toml("serial_port = \"COM3\"\nbaud_rate = 57600").unwrap();
        config.apply_env(env(&[("BAUD_RATE", "9600")])).unwrap();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.serial_port, "COM3");
    }

    #[test]
    fn missing_serial_port_is_fatal() {
        let mut config = BridgeConfig::default();
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn wildcard_base_topic_is_rejected() {
        let mut config = BridgeConfig {
            serial_port: "/dev/ttyUSB0".to_string(),
            base_topic: "garden/+".to_string(),
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let base = BridgeConfig {
            serial_port: "/dev/ttyUSB0".to_string(),
            ..BridgeConfig::default()
        };

        let mut config = BridgeConfig {
            read_timeout_ms: 0,
            ..base.clone()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));

        let mut config = BridgeConfig {
            connect_timeout_secs: 0,
            ..base.clone()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));

        let mut config = base;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_toml_is_reported() {
        assert!(BridgeConfig::from_toml("baud_rate = \"nine\"").is_err());
    }
}
