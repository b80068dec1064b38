// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery metadata derived from a device's kind.
//!
//! A [`Presentation`] is computed once when a device is built and never
//! changes afterwards. It holds two things:
//!
//! - **channels**: discovery keys ending in `_topic` (for example
//!   `brightness_state_topic`) mapped to the topic suffix the bridge uses for
//!   them. Keys ending in `command_topic` are command channels, the others
//!   are state channels.
//! - **fields**: every other discovery key (payload vocabulary, ranges,
//!   device class, units).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Well-known channel keys.
pub mod channel {
    /// Main state channel.
    pub const STATE: &str = "state_topic";
    /// Main command channel.
    pub const COMMAND: &str = "command_topic";
    /// Brightness state of a dimmable lamp.
    pub const BRIGHTNESS_STATE: &str = "brightness_state_topic";
    /// Brightness command of a dimmable lamp.
    pub const BRIGHTNESS_COMMAND: &str = "brightness_command_topic";
    /// Speed state of a multi-speed fan.
    pub const PERCENTAGE_STATE: &str = "percentage_state_topic";
    /// Speed command of a multi-speed fan.
    pub const PERCENTAGE_COMMAND: &str = "percentage_command_topic";
    /// HVAC mode state.
    pub const MODE_STATE: &str = "mode_state_topic";
    /// HVAC mode command.
    pub const MODE_COMMAND: &str = "mode_command_topic";
    /// Preset state.
    pub const PRESET_STATE: &str = "preset_mode_state_topic";
    /// Preset command.
    pub const PRESET_COMMAND: &str = "preset_mode_command_topic";
    /// Target temperature state.
    pub const TEMPERATURE_STATE: &str = "temperature_state_topic";
    /// Target temperature command.
    pub const TEMPERATURE_COMMAND: &str = "temperature_command_topic";
    /// Measured temperature.
    pub const CURRENT_TEMPERATURE: &str = "current_temperature_topic";
}

/// Home Assistant component a device is announced as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    /// Read-only value.
    Sensor,
    /// Read-only on/off value.
    BinarySensor,
    /// On/off actuator.
    Switch,
    /// Lamp, optionally dimmable.
    Light,
    /// Fan, optionally multi-speed.
    Fan,
    /// Open/close valve.
    Valve,
    /// Thermostat.
    Climate,
}

impl EntityClass {
    /// Returns the component name used in discovery topics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Switch => "switch",
            Self::Light => "light",
            Self::Fan => "fan",
            Self::Valve => "valve",
            Self::Climate => "climate",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Home Assistant writes, the bridge subscribes.
    Command,
    /// The bridge publishes, Home Assistant reads.
    State,
}

impl ChannelRole {
    /// Classifies a channel key.
    #[must_use]
    pub fn of(key: &str) -> Self {
        if key.ends_with(channel::COMMAND) {
            Self::Command
        } else {
            Self::State
        }
    }
}

/// Static discovery metadata of a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    entity_class: EntityClass,
    channels: BTreeMap<String, String>,
    fields: Map<String, Value>,
}

impl Presentation {
    /// Base presentation shared by every kind: a single state channel.
    pub(crate) fn new(entity_class: EntityClass) -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(channel::STATE.to_string(), String::new());

        Self {
            entity_class,
            channels,
            fields: Map::new(),
        }
    }

    pub(crate) fn set_channel(&mut self, key: &str, suffix: &str) {
        debug_assert!(key.ends_with("_topic"), "{key}");
        self.channels.insert(key.to_string(), suffix.to_string());
    }

    pub(crate) fn remove_channel(&mut self, key: &str) {
        self.channels.remove(key);
    }

    pub(crate) fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Returns the component this device is announced as.
    #[must_use]
    pub fn entity_class(&self) -> EntityClass {
        self.entity_class
    }

    /// Iterates over `(key, suffix, role)` for every channel.
    pub fn channels(&self) -> impl Iterator<Item = (&str, &str, ChannelRole)> {
        self.channels
            .iter()
            .map(|(key, suffix)| (key.as_str(), suffix.as_str(), ChannelRole::of(key)))
    }

    /// Returns the topic suffix of a channel.
    #[must_use]
    pub fn channel_suffix(&self, key: &str) -> Option<&str> {
        self.channels.get(key).map(String::as_str)
    }

    /// Returns `true` if the device declares the channel.
    #[must_use]
    pub fn has_channel(&self, key: &str) -> bool {
        self.channels.contains_key(key)
    }

    /// Returns a non-channel discovery field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a non-channel discovery field as a string.
    #[must_use]
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns every non-channel discovery field.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The value published for "on", falling back to `"on"`.
    pub(crate) fn payload_on(&self) -> &str {
        self.field_str("payload_on").unwrap_or("on")
    }

    /// The value published for "off", falling back to `"off"`.
    pub(crate) fn payload_off(&self) -> &str {
        self.field_str("payload_off").unwrap_or("off")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_has_state_channel_only() {
        let p = Presentation::new(EntityClass::Sensor);
        let channels: Vec<_> = p.channels().collect();
        assert_eq!(channels, vec![(channel::STATE, "", ChannelRole::State)]);
    }

    #[test]
    fn role_is_derived_from_key() {
        assert_eq!(ChannelRole::of(channel::COMMAND), ChannelRole::Command);
        assert_eq!(ChannelRole::of(channel::PERCENTAGE_COMMAND), ChannelRole::Command);
        assert_eq!(ChannelRole::of(channel::CURRENT_TEMPERATURE), ChannelRole::State);
    }

    #[test]
    fn entity_class_names() {
        assert_eq!(EntityClass::BinarySensor.to_string(), "binary_sensor");
        assert_eq!(EntityClass::Climate.as_str(), "climate");
    }
}
