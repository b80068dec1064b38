// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration loading: TOML file, then environment overrides.
//!
//! The file is looked up at `larnitech-bridge.toml` in the working directory,
//! or at the path in `LARNITECH_BRIDGE_CONFIG`. It is optional; every setting
//! can come from the environment instead:
//!
//! | Variable        | Setting            |
//! |-----------------|--------------------|
//! | `LT_HOST`       | `hub.host`         |
//! | `LT_PORT`       | `hub.port`         |
//! | `LT_KEY`        | `hub.key`          |
//! | `MQTT_HOST`     | `mqtt.host`        |
//! | `MQTT_PORT`     | `mqtt.port`        |
//! | `MQTT_USERNAME` | `mqtt.username`    |
//! | `MQTT_PASSWORD` | `mqtt.password`    |
//! | `RUST_LOG`      | `logging.filter`   |
//!
//! # Example
//!
//! ```toml
//! [hub]
//! host = "192.168.1.10"
//! port = 8080
//! key = "0123456789"
//! ignored_areas = ["Garage"]
//!
//! [mqtt]
//! host = "192.168.1.50"
//! client_id = "larnitech-bridge"
//!
//! [bridge]
//! constituent_order = ["392:1", "392:2", "392:3"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::bridge::{DEFAULT_DISCOVERY_PREFIX, DEFAULT_TOPIC_PREFIX, SessionOptions};
use crate::classifier::ClassifyOptions;
use crate::error::ConfigError;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "larnitech-bridge.toml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "LARNITECH_BRIDGE_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Hub connection and device filters.
    pub hub: HubConfig,
    /// MQTT broker connection.
    pub mqtt: MqttConfig,
    /// Topic layout and timing.
    pub bridge: BridgeOptions,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Hub connection and device filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub hostname or IP.
    pub host: String,
    /// WebSocket API port.
    pub port: u16,
    /// API key.
    pub key: String,
    /// Addresses of devices not exposed to Home Assistant.
    pub ignored_addrs: Vec<String>,
    /// Device types not exposed to Home Assistant.
    pub ignored_types: Vec<String>,
    /// Areas whose devices are not exposed (case-insensitive).
    pub ignored_areas: Vec<String>,
}

impl HubConfig {
    /// Returns the WebSocket API URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}:{}/api", self.host, self.port)
    }
}

/// MQTT broker connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker hostname or IP.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client id.
    pub client_id: String,
    /// User name, if the broker requires authentication.
    pub username: Option<String>,
    /// Password, if the broker requires authentication.
    pub password: Option<String>,
    /// Home Assistant discovery prefix.
    pub discovery_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            client_id: "larnitech-bridge".to_string(),
            username: None,
            password: None,
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
        }
    }
}

/// Topic layout and timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Prefix of every state and command topic.
    pub topic_prefix: String,
    /// Pause before publishing initial states, in milliseconds.
    pub initial_state_delay_ms: u64,
    /// Command queue poll interval, in milliseconds.
    pub poll_interval_ms: u64,
    /// Explicit composite member order, by address.
    pub constituent_order: Vec<String>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            initial_state_delay_ms: 3000,
            poll_interval_ms: 10,
            constituent_order: Vec::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "larnitech_bridge=info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Loads the file (if any), applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file exists but cannot be read or
    /// parsed, or a required setting is missing.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Applies overrides from `lookup` (normally the process environment).
    ///
    /// Unparsable port numbers are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("LT_HOST") {
            self.hub.host = val;
        }
        if let Some(port) = lookup("LT_PORT").and_then(|v| v.parse().ok()) {
            self.hub.port = port;
        }
        if let Some(val) = lookup("LT_KEY") {
            self.hub.key = val;
        }
        if let Some(val) = lookup("MQTT_HOST") {
            self.mqtt.host = val;
        }
        if let Some(port) = lookup("MQTT_PORT").and_then(|v| v.parse().ok()) {
            self.mqtt.port = port;
        }
        if let Some(val) = lookup("MQTT_USERNAME") {
            self.mqtt.username = Some(val);
        }
        if let Some(val) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// Checks that every setting needed to start a session is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first missing setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.host.is_empty() {
            return Err(ConfigError::Missing("hub.host"));
        }
        if self.hub.port == 0 {
            return Err(ConfigError::Missing("hub.port"));
        }
        if self.hub.key.is_empty() {
            return Err(ConfigError::Missing("hub.key"));
        }
        if self.mqtt.host.is_empty() {
            return Err(ConfigError::Missing("mqtt.host"));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Missing("mqtt.client_id"));
        }
        if self.mqtt.discovery_prefix.is_empty() {
            return Err(ConfigError::Missing("mqtt.discovery_prefix"));
        }
        if self.bridge.topic_prefix.is_empty() {
            return Err(ConfigError::Missing("bridge.topic_prefix"));
        }
        Ok(())
    }

    /// Builds the device filters.
    #[must_use]
    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions::new()
            .ignore_addrs(self.hub.ignored_addrs.iter().cloned())
            .ignore_types(self.hub.ignored_types.iter().cloned())
            .ignore_areas(self.hub.ignored_areas.iter().cloned())
            .constituent_order(self.bridge.constituent_order.iter().cloned())
    }

    /// Builds the session settings.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::new(self.hub.key.clone())
            .topic_prefix(self.bridge.topic_prefix.clone())
            .discovery_prefix(self.mqtt.discovery_prefix.clone())
            .classify(self.classify_options())
            .initial_state_delay(Duration::from_millis(self.bridge.initial_state_delay_ms))
            .poll_interval(Duration::from_millis(self.bridge.poll_interval_ms.max(1)))
    }
}
