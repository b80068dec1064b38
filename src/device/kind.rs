// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device kinds and the vendor type-name table.
//!
//! The hub tags every record with a `type` and, sometimes, a more specific
//! `sub-type`. [`DeviceKind::resolve`] maps those names onto a kind; names
//! that are not in the table become [`DeviceKind::Generic`].
//!
//! Composite kinds are declared in [`CompositeKind::ALL`] together with the
//! member type they aggregate.

use serde_json::{Map, Value};

use crate::error::ValidationError;

use super::presentation::{EntityClass, Presentation, channel};

/// Vendor type names recognized by the bridge.
pub mod type_name {
    /// Temperature probe.
    pub const TEMPERATURE_SENSOR: &str = "temperature-sensor";
    /// Humidity probe.
    pub const HUMIDITY_SENSOR: &str = "humidity-sensor";
    /// Motion detector.
    pub const MOTION_SENSOR: &str = "motion-sensor";
    /// Water leak detector.
    pub const LEAK_SENSOR: &str = "leak-sensor";
    /// Heating valve with automations.
    pub const VALVE_HEATING: &str = "valve-heating";
    /// Relay; behaves as a switch rather than a lamp.
    pub const LAMP: &str = "lamp";
    /// Dimmable lamp.
    pub const DIMMER_LAMP: &str = "dimmer-lamp";
    /// Hub-side script trigger.
    pub const SCRIPT: &str = "script";
    /// Open/close valve.
    pub const VALVE: &str = "valve";
    /// Single air fan relay. Reported as a `sub-type`.
    pub const AIR_FAN: &str = "air-fan";
}

/// The automation value that switches a heating valve off.
pub const ALWAYS_OFF: &str = "always-off";

/// Behavior of a single hub unit.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceKind {
    /// Unrecognized type, exposed as a plain sensor.
    Generic,
    /// Temperature measurement.
    TemperatureSensor,
    /// Humidity measurement.
    HumiditySensor,
    /// Motion presence, derived from a detection percentage.
    MotionSensor,
    /// Leak alarm; the hub reports `ok` when dry.
    LeakSensor,
    /// Thermostat-driven heating valve.
    HeatingValve {
        /// Automation names the hub accepts, in hub order.
        automations: Vec<String>,
    },
    /// On/off relay or script.
    Switch,
    /// Lamp with a brightness level.
    DimmerLamp,
    /// Open/close valve.
    Valve,
    /// Single-speed air fan.
    AirFan,
}

impl DeviceKind {
    /// Returns `true` if `name` is in the type table.
    #[must_use]
    pub fn is_known(name: &str) -> bool {
        matches!(
            name,
            type_name::TEMPERATURE_SENSOR
                | type_name::HUMIDITY_SENSOR
                | type_name::MOTION_SENSOR
                | type_name::LEAK_SENSOR
                | type_name::VALVE_HEATING
                | type_name::LAMP
                | type_name::DIMMER_LAMP
                | type_name::SCRIPT
                | type_name::VALVE
                | type_name::AIR_FAN
        )
    }

    /// Returns the type name that selects the kind of a record.
    ///
    /// The `sub-type` wins when it is a known type name; otherwise the base
    /// `type` is used.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] if the record has no `type`.
    pub fn effective_type(record: &Map<String, Value>) -> Result<&str, ValidationError> {
        if let Some(sub_type) = record.get("sub-type").and_then(Value::as_str)
            && Self::is_known(sub_type)
        {
            return Ok(sub_type);
        }

        record
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingField("type"))
    }

    /// Builds the kind for a type name, reading kind-specific fields from the
    /// record.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a field the kind requires is absent or
    /// malformed.
    pub fn resolve(name: &str, record: &Map<String, Value>) -> Result<Self, ValidationError> {
        let kind = match name {
            type_name::TEMPERATURE_SENSOR => Self::TemperatureSensor,
            type_name::HUMIDITY_SENSOR => Self::HumiditySensor,
            type_name::MOTION_SENSOR => Self::MotionSensor,
            type_name::LEAK_SENSOR => Self::LeakSensor,
            type_name::VALVE_HEATING => Self::HeatingValve {
                automations: parse_automations(record)?,
            },
            type_name::LAMP | type_name::SCRIPT => Self::Switch,
            type_name::DIMMER_LAMP => Self::DimmerLamp,
            type_name::VALVE => Self::Valve,
            type_name::AIR_FAN => Self::AirFan,
            _ => Self::Generic,
        };

        Ok(kind)
    }

    /// Record fields consumed by the kind itself (not kept in `extra`).
    pub(crate) fn consumed_fields(&self) -> &'static [&'static str] {
        match self {
            Self::HeatingValve { .. } => &["automations"],
            _ => &[],
        }
    }

    /// Canonical type name of the kind.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::TemperatureSensor => type_name::TEMPERATURE_SENSOR,
            Self::HumiditySensor => type_name::HUMIDITY_SENSOR,
            Self::MotionSensor => type_name::MOTION_SENSOR,
            Self::LeakSensor => type_name::LEAK_SENSOR,
            Self::HeatingValve { .. } => type_name::VALVE_HEATING,
            Self::Switch => type_name::LAMP,
            Self::DimmerLamp => type_name::DIMMER_LAMP,
            Self::Valve => type_name::VALVE,
            Self::AirFan => type_name::AIR_FAN,
        }
    }

    /// Component the kind is announced as.
    #[must_use]
    pub fn entity_class(&self) -> EntityClass {
        match self {
            Self::Generic | Self::TemperatureSensor | Self::HumiditySensor => EntityClass::Sensor,
            Self::MotionSensor | Self::LeakSensor => EntityClass::BinarySensor,
            Self::HeatingValve { .. } => EntityClass::Climate,
            Self::Switch => EntityClass::Switch,
            Self::DimmerLamp => EntityClass::Light,
            Self::Valve => EntityClass::Valve,
            Self::AirFan => EntityClass::Fan,
        }
    }

    /// Builds the presentation: base step, then the kind's extensions.
    pub(crate) fn presentation(&self) -> Presentation {
        let mut p = Presentation::new(self.entity_class());
        self.setup(&mut p);
        p
    }

    fn setup(&self, p: &mut Presentation) {
        match self {
            Self::Generic => {}
            Self::TemperatureSensor => setup_measurement(p, "temperature", "°C"),
            Self::HumiditySensor => setup_measurement(p, "humidity", "%"),
            Self::MotionSensor => setup_motion(p),
            Self::LeakSensor => {
                setup_motion(p);
                p.set_field("device_class", "moisture");
            }
            Self::HeatingValve { automations } => setup_heating_valve(p, automations),
            Self::Switch => {
                p.set_channel(channel::COMMAND, "");
                setup_on_off(p);
            }
            Self::DimmerLamp => {
                setup_lamp(p);
                p.set_field("brightness_scale", 100);
                p.set_channel(channel::BRIGHTNESS_COMMAND, "level");
                p.set_channel(channel::BRIGHTNESS_STATE, "level");
            }
            Self::Valve => {
                p.set_channel(channel::COMMAND, "");
                p.set_channel(channel::STATE, "");
                p.set_field("state_open", "opened");
                p.set_field("state_closed", "closed");
                p.set_field("payload_open", "open");
                p.set_field("payload_close", "close");
            }
            Self::AirFan => setup_air_fan(p),
        }
    }
}

/// Kinds that aggregate several units of one member type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    /// Air fan whose speeds are separate relays.
    MultiSpeedFan,
}

impl CompositeKind {
    /// Every composite kind, checked in order during classification.
    pub const ALL: &'static [Self] = &[Self::MultiSpeedFan];

    /// Type name of the units this kind aggregates.
    #[must_use]
    pub const fn member_type(self) -> &'static str {
        match self {
            Self::MultiSpeedFan => type_name::AIR_FAN,
        }
    }

    /// Returns the composite that wraps units of `kind`, if any.
    #[must_use]
    pub fn wrapping(kind: &DeviceKind) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|composite| composite.member_type() == kind.type_name())
    }

    /// Component the composite is announced as.
    #[must_use]
    pub const fn entity_class(self) -> EntityClass {
        match self {
            Self::MultiSpeedFan => EntityClass::Fan,
        }
    }

    /// Builds the presentation for a composite of `members` units.
    pub(crate) fn presentation(self, members: usize) -> Presentation {
        let mut p = Presentation::new(self.entity_class());

        match self {
            Self::MultiSpeedFan => {
                setup_air_fan(&mut p);
                p.set_channel(channel::PERCENTAGE_COMMAND, "speed");
                p.set_channel(channel::PERCENTAGE_STATE, "speed");
                p.set_field("speed_range_min", 1);
                p.set_field("speed_range_max", members);
            }
        }

        p
    }
}

fn setup_on_off(p: &mut Presentation) {
    p.set_field("payload_on", "on");
    p.set_field("payload_off", "off");
}

fn setup_measurement(p: &mut Presentation, device_class: &str, unit: &str) {
    p.set_field("state_class", "measurement");
    p.set_field("device_class", device_class);
    p.set_field("unit_of_measurement", unit);
}

fn setup_motion(p: &mut Presentation) {
    p.set_field("device_class", "motion");
    setup_on_off(p);
}

fn setup_lamp(p: &mut Presentation) {
    p.set_channel(channel::COMMAND, "state");
    p.set_channel(channel::STATE, "state");
    setup_on_off(p);
}

fn setup_air_fan(p: &mut Presentation) {
    p.set_channel(channel::COMMAND, "state");
    p.set_channel(channel::STATE, "state");
    setup_on_off(p);
}

fn setup_heating_valve(p: &mut Presentation, automations: &[String]) {
    p.remove_channel(channel::STATE);
    p.set_channel(channel::MODE_COMMAND, "mode");
    p.set_channel(channel::MODE_STATE, "mode");
    p.set_channel(channel::PRESET_COMMAND, "preset");
    p.set_channel(channel::PRESET_STATE, "preset");
    p.set_channel(channel::TEMPERATURE_COMMAND, "temperature");
    p.set_channel(channel::TEMPERATURE_STATE, "temperature");
    p.set_channel(channel::CURRENT_TEMPERATURE, "current_temperature");
    p.set_field("modes", vec!["off", "heat"]);
    p.set_field("preset_modes", automations.to_vec());
    p.set_field("temp_step", 0.5);
    p.set_field("min_temp", 15);
    p.set_field("max_temp", 35);
    p.set_field("temperature_unit", "C");
}

fn parse_automations(record: &Map<String, Value>) -> Result<Vec<String>, ValidationError> {
    let list = record
        .get("automations")
        .ok_or(ValidationError::MissingField("automations"))?
        .as_array()
        .ok_or_else(|| ValidationError::InvalidField {
            field: "automations",
            message: "expected a list".to_string(),
        })?;

    let automations = list
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ValidationError::InvalidField {
                    field: "automations",
                    message: format!("expected a string, got {value}"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if automations.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "automations",
            message: "at least one automation is required".to_string(),
        });
    }

    Ok(automations)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::device::presentation::ChannelRole;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn known_sub_type_wins() {
        let r = record(json!({"type": "lamp", "sub-type": "air-fan"}));
        assert_eq!(DeviceKind::effective_type(&r).unwrap(), "air-fan");
    }

    #[test]
    fn unknown_sub_type_falls_back_to_type() {
        let r = record(json!({"type": "lamp", "sub-type": "chandelier"}));
        assert_eq!(DeviceKind::effective_type(&r).unwrap(), "lamp");
    }

    #[test]
    fn missing_type_is_rejected() {
        let r = record(json!({"addr": "1:1"}));
        assert_eq!(
            DeviceKind::effective_type(&r),
            Err(ValidationError::MissingField("type"))
        );
    }

    #[test]
    fn unknown_type_is_generic() {
        let kind = DeviceKind::resolve("virtual", &Map::new()).unwrap();
        assert_eq!(kind, DeviceKind::Generic);
        assert_eq!(kind.entity_class(), EntityClass::Sensor);
    }

    #[test]
    fn lamp_and_script_are_switches() {
        for name in [type_name::LAMP, type_name::SCRIPT] {
            assert_eq!(DeviceKind::resolve(name, &Map::new()).unwrap(), DeviceKind::Switch);
        }
    }

    #[test]
    fn heating_valve_requires_automations() {
        let err = DeviceKind::resolve(type_name::VALVE_HEATING, &Map::new()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("automations"));

        let r = record(json!({"automations": []}));
        assert!(DeviceKind::resolve(type_name::VALVE_HEATING, &r).is_err());
    }

    #[test]
    fn dimmer_extends_lamp_setup() {
        let p = DeviceKind::DimmerLamp.presentation();
        assert_eq!(p.channel_suffix(channel::COMMAND), Some("state"));
        assert_eq!(p.channel_suffix(channel::BRIGHTNESS_COMMAND), Some("level"));
        assert_eq!(p.field("brightness_scale"), Some(&json!(100)));
        assert_eq!(p.payload_on(), "on");
    }

    #[test]
    fn leak_sensor_extends_motion_setup() {
        let p = DeviceKind::LeakSensor.presentation();
        assert_eq!(p.entity_class(), EntityClass::BinarySensor);
        assert_eq!(p.field_str("device_class"), Some("moisture"));
        assert_eq!(p.payload_off(), "off");
    }

    #[test]
    fn heating_valve_has_no_plain_state_channel() {
        let kind = DeviceKind::HeatingValve {
            automations: vec!["home".to_string()],
        };
        let p = kind.presentation();
        assert!(!p.has_channel(channel::STATE));
        assert_eq!(p.field("preset_modes"), Some(&json!(["home"])));

        let commands = p
            .channels()
            .filter(|(_, _, role)| *role == ChannelRole::Command)
            .count();
        assert_eq!(commands, 3);
    }

    #[test]
    fn air_fan_is_wrapped_by_multi_speed_fan() {
        assert_eq!(
            CompositeKind::wrapping(&DeviceKind::AirFan),
            Some(CompositeKind::MultiSpeedFan)
        );
        assert_eq!(CompositeKind::wrapping(&DeviceKind::Switch), None);
    }

    #[test]
    fn multi_speed_range_follows_member_count() {
        let p = CompositeKind::MultiSpeedFan.presentation(3);
        assert_eq!(p.field("speed_range_max"), Some(&json!(3)));
        assert_eq!(p.channel_suffix(channel::PERCENTAGE_STATE), Some("speed"));
    }
}
