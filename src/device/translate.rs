// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Translation rules between hub status and Home Assistant values for single
//! units.

use serde_json::{Map, Value, json};

use crate::error::Error;

use super::kind::{ALWAYS_OFF, DeviceKind};
use super::presentation::{Presentation, channel};
use super::{Rendered, StatusMap};

/// Renders the state channels derivable from `status`.
pub(super) fn render(kind: &DeviceKind, p: &Presentation, status: &StatusMap) -> Rendered {
    match kind {
        DeviceKind::MotionSensor => render_binary(p, status, motion_detected),
        DeviceKind::LeakSensor => render_binary(p, status, leak_detected),
        DeviceKind::DimmerLamp => {
            let mut values = render_state(status);
            if let Some(level) = present(status, "level") {
                values.insert(channel::BRIGHTNESS_STATE.to_string(), level.clone());
            }
            values
        }
        DeviceKind::HeatingValve { .. } => render_heating_valve(status),
        DeviceKind::Generic
        | DeviceKind::TemperatureSensor
        | DeviceKind::HumiditySensor
        | DeviceKind::Switch
        | DeviceKind::Valve
        | DeviceKind::AirFan => render_state(status),
    }
}

/// Translates a command into the status the hub should apply.
pub(super) fn apply(
    kind: &DeviceKind,
    channel: Option<&str>,
    value: &Value,
) -> Result<StatusMap, Error> {
    let mut status = Map::new();

    match kind {
        DeviceKind::DimmerLamp => {
            status.insert(channel.unwrap_or("state").to_string(), value.clone());
        }
        DeviceKind::AirFan => {
            status.insert(channel.unwrap_or("state").to_string(), value.clone());
            status.insert("auto-state".to_string(), Value::Bool(true));
        }
        DeviceKind::HeatingValve { automations } => {
            return apply_heating_valve(automations, channel, value).ok_or_else(|| {
                Error::UnsupportedChannel {
                    kind: kind.type_name(),
                    channel: channel.map(str::to_string),
                }
            });
        }
        DeviceKind::Generic
        | DeviceKind::TemperatureSensor
        | DeviceKind::HumiditySensor
        | DeviceKind::MotionSensor
        | DeviceKind::LeakSensor
        | DeviceKind::Switch
        | DeviceKind::Valve => {
            status.insert("state".to_string(), value.clone());
        }
    }

    Ok(status)
}

/// Returns a status property unless it is absent, null or an empty string.
fn present<'a>(status: &'a StatusMap, key: &str) -> Option<&'a Value> {
    status.get(key).filter(|value| match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn render_state(status: &StatusMap) -> Rendered {
    let mut values = Map::new();
    if let Some(state) = present(status, "state") {
        values.insert(channel::STATE.to_string(), state.clone());
    }
    values
}

fn render_binary(p: &Presentation, status: &StatusMap, detect: fn(&Value) -> bool) -> Rendered {
    let mut values = Map::new();
    if let Some(state) = present(status, "state") {
        let payload = if detect(state) {
            p.payload_on()
        } else {
            p.payload_off()
        };
        values.insert(channel::STATE.to_string(), Value::from(payload));
    }
    values
}

/// The hub reports motion as a detection percentage.
fn motion_detected(state: &Value) -> bool {
    match state {
        Value::Number(n) => n.as_f64().is_some_and(|v| v > 0.0),
        Value::String(s) => s.parse::<f64>().is_ok_and(|v| v > 0.0),
        Value::Bool(b) => *b,
        _ => false,
    }
}

/// The hub reports `ok` while dry; any other value is an alarm.
fn leak_detected(state: &Value) -> bool {
    state.as_str() != Some("ok")
}

fn render_heating_valve(status: &StatusMap) -> Rendered {
    let mut values = Map::new();
    let automation = present(status, "automation");

    // `state=off` alone means the valve is really off; alongside other
    // properties it only means the valve is closed until the room cools down.
    let is_off = automation.and_then(Value::as_str) == Some(ALWAYS_OFF)
        || (status.get("state").and_then(Value::as_str) == Some("off") && status.len() == 1);

    if is_off {
        values.insert(channel::MODE_STATE.to_string(), json!("off"));
        values.insert(channel::PRESET_STATE.to_string(), json!("None"));
    } else if let Some(automation) = automation.filter(|a| is_truthy(a)) {
        values.insert(channel::MODE_STATE.to_string(), json!("heat"));
        values.insert(channel::PRESET_STATE.to_string(), automation.clone());
    }

    // No `target` while the automation is `always-off`.
    for (prop, key) in [
        ("current", channel::CURRENT_TEMPERATURE),
        ("target", channel::TEMPERATURE_STATE),
    ] {
        if let Some(temperature) = present(status, prop).filter(|t| is_truthy(t)) {
            values.insert(key.to_string(), temperature.clone());
        }
    }

    values
}

fn apply_heating_valve(automations: &[String], channel: Option<&str>, value: &Value) -> Option<StatusMap> {
    let status = match (channel?, value.as_str()) {
        ("mode", Some("heat")) => json!({"state": "on", "automation": automations.first()?}),
        ("mode", Some("off")) => json!({"state": "off", "automation": ALWAYS_OFF}),
        ("preset", _) => json!({"state": "on", "automation": value}),
        ("temperature", _) => json!({"target": value}),
        _ => return None,
    };

    match status {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
