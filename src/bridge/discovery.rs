// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Home Assistant MQTT discovery.
//!
//! A device is announced once, with a retained message on
//! `<discovery prefix>/<component>/<unique id>/config`. The payload is the
//! device's presentation with every channel turned into a full topic, plus
//! identity fields:
//!
//! ```json
//! {
//!   "command_topic": "larnitech/388_1/state/set",
//!   "state_topic": "larnitech/388_1/state/state",
//!   "area": "Kitchen",
//!   "name": "Kitchen Ceiling",
//!   "unique_id": "larnitech_388_1",
//!   "object_id": "larnitech_kitchen_ceiling",
//!   "device": {"name": "Larnitech", "model": "Metaforsa 3.plus", ...}
//! }
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::device::{ChannelRole, Device};
use crate::topic::{self, COMMAND_OP, STATE_OP};

/// Name of the hub in the Home Assistant device registry.
pub const HUB_NAME: &str = "Larnitech";

/// Hub model reported to Home Assistant.
pub const HUB_MODEL: &str = "Metaforsa 3.plus";

/// Everything the bridge needs to expose one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    /// Retained discovery topic.
    pub config_topic: String,
    /// Discovery payload.
    pub payload: Map<String, Value>,
    /// Topics Home Assistant sends commands on.
    pub command_topics: Vec<String>,
    /// State channel key to the topic its values are published on.
    pub state_topics: BTreeMap<String, String>,
}

impl Announcement {
    /// Builds the announcement of `device`.
    #[must_use]
    pub fn new(device: &Device, bridge_prefix: &str, discovery_prefix: &str) -> Self {
        let address_id = topic::to_id(device.address());
        let area_id = topic::to_id(device.area());
        let unique_id = format!("{bridge_prefix}_{address_id}");
        let device_prefix = topic::device_prefix(bridge_prefix, device.address());
        let presentation = device.presentation();

        let mut payload = presentation.fields().clone();
        let mut command_topics = Vec::new();
        let mut state_topics = BTreeMap::new();

        for (key, suffix, role) in presentation.channels() {
            let full = match role {
                ChannelRole::Command => {
                    let full = topic::build(&device_prefix, suffix, COMMAND_OP);
                    command_topics.push(full.clone());
                    full
                }
                ChannelRole::State => {
                    let full = topic::build(&device_prefix, suffix, STATE_OP);
                    state_topics.insert(key.to_string(), full.clone());
                    full
                }
            };
            payload.insert(key.to_string(), Value::String(full));
        }

        payload.insert("area".to_string(), json!(device.area()));
        payload.insert(
            "name".to_string(),
            json!(format!("{} {}", device.area(), device.name())),
        );
        payload.insert("unique_id".to_string(), json!(unique_id));
        payload.insert(
            "object_id".to_string(),
            json!(format!(
                "{bridge_prefix}_{area_id}_{}",
                topic::to_id(device.name())
            )),
        );
        payload.insert(
            "device".to_string(),
            json!({
                "name": HUB_NAME,
                "model": HUB_MODEL,
                "identifiers": [format!("mf14_3plus_{area_id}")],
                "suggested_area": device.area(),
            }),
        );

        let config_topic = format!(
            "{discovery_prefix}/{}/{unique_id}/config",
            presentation.entity_class()
        );

        Self {
            config_topic,
            payload,
            command_topics,
            state_topics,
        }
    }

    /// Returns the topic values of a state channel are published on.
    #[must_use]
    pub fn state_topic(&self, channel: &str) -> Option<&str> {
        self.state_topics.get(channel).map(String::as_str)
    }

    /// Serializes the discovery payload.
    #[must_use]
    pub fn payload_json(&self) -> String {
        Value::Object(self.payload.clone()).to_string()
    }
}

/// Encodes a rendered value as an MQTT payload: strings are sent as-is,
/// anything else as JSON text.
#[must_use]
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
