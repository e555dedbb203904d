//! # Configuration Management
//!
//! This module handles loading and parsing the wiring configuration from the
//! trash-monitor.toml file: which GPIO lines the sensor, LEDs, buzzer and
//! button are on, and where the LCD sits on the I2C bus. Behavioural constants
//! (container height, timings, the full threshold) are fixed in their modules
//! and are not configurable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::lcd::DEFAULT_ADDRESS;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "trash-monitor.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config IO: {0}")]
    Io(#[from] io::Error),
}

/// Application configuration loaded from trash-monitor.toml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// GPIO assignments (BCM numbering)
    pub pins: PinConfig,
    /// LCD bus settings
    pub display: DisplayConfig,
}

/// GPIO line assignments, BCM numbering
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PinConfig {
    /// HC-SR04 trigger (output)
    pub trigger: u8,
    /// HC-SR04 echo (input, through a 5 V to 3.3 V divider)
    pub echo: u8,
    /// Alarm LED (output)
    pub red_led: u8,
    /// OK LED (output)
    pub green_led: u8,
    /// Passive buzzer (software PWM output)
    pub buzzer: u8,
    /// Acknowledge button to ground (input with pull-up)
    pub button: u8,
}

/// Character LCD on the I2C bus
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// I2C character device
    pub i2c_device: String,
    /// 7-bit address of the PCF8574 backpack
    pub address: u8,
    /// Keep the backlight on
    pub backlight: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pins: PinConfig {
                trigger: 23,
                echo: 24,
                red_led: 13,
                green_led: 19,
                buzzer: 17,
                button: 27,
            },
            display: DisplayConfig {
                i2c_device: "/dev/i2c-1".to_string(),
                address: DEFAULT_ADDRESS,
                backlight: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from trash-monitor.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config file format: {}", e);
                    warn!("Using default wiring");
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found, using default wiring");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Save current configuration to trash-monitor.toml
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pins.trigger, 23);
        assert_eq!(config.pins.echo, 24);
        assert_eq!(config.pins.button, 27);
        assert_eq!(config.display.address, 0x27);
        assert!(config.display.backlight);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_custom_wiring() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"
[pins]
trigger = 5
echo = 6
red_led = 13
green_led = 19
buzzer = 12
button = 26

[display]
i2c_device = "/dev/i2c-0"
address = 63
backlight = false
"#,
        )
        .unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.pins.trigger, 5);
        assert_eq!(config.pins.buzzer, 12);
        assert_eq!(config.display.address, 0x3F);
        assert_eq!(config.display.i2c_device, "/dev/i2c-0");
        assert!(!config.display.backlight);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "[pins]\ntrigger = \"twenty\"\n").unwrap();
        assert_eq!(Config::load_from_path(file.path()), Config::default());
    }

    #[test]
    fn test_save_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut config = Config::default();
        config.pins.buzzer = 18;
        config.save().unwrap();

        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(Config::load(), config);
    }

    #[test]
    fn test_save_then_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.display.address = 0x3F;
        config.save_to_path(file.path()).unwrap();
        assert_eq!(Config::load_from_path(file.path()), config);
    }
}
