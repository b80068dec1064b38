// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routing of Home Assistant commands to the hub.
//!
//! ```text
//! larnitech/392_1_392_2/speed/set → 2
//!                 ↓
//!       CommandTopic::parse()         id "392_1_392_2", channel "speed"
//!                 ↓
//!   registry.resolve_topic_id()       multi-speed fan
//!                 ↓
//!   device.apply_external_command()   [392:1 off, 392:2 on]
//!                 ↓
//!        queue.push_all()             drained by the session
//! ```
//!
//! The router runs on the pub/sub client's delivery context and never touches
//! the hub connection.

use serde_json::Value;

use crate::error::Error;
use crate::registry::SharedRegistry;
use crate::topic::CommandTopic;

use super::queue::CommandQueue;

/// Turns inbound command messages into queued hub updates.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    prefix: String,
    registry: SharedRegistry,
    queue: CommandQueue,
}

impl CommandRouter {
    /// Creates a router for topics under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>, registry: SharedRegistry, queue: CommandQueue) -> Self {
        Self {
            prefix: prefix.into(),
            registry,
            queue,
        }
    }

    /// Routes one inbound message and returns the number of queued updates.
    ///
    /// Topics outside the bridge's command namespace are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAddress`] if no registered device matches the
    /// topic, or [`Error::UnsupportedChannel`] if the device rejects the
    /// channel.
    pub fn route(&self, topic: &str, payload: &str) -> Result<usize, Error> {
        let Some(command) = CommandTopic::parse(&self.prefix, topic) else {
            tracing::trace!(topic = %topic, "Not a command topic");
            return Ok(0);
        };

        let value = decode_payload(payload);

        let updates = {
            let registry = self.registry.read();
            let device = registry
                .resolve_topic_id(command.address_id)
                .ok_or_else(|| Error::UnknownAddress(command.address_id.to_string()))?;

            tracing::debug!(
                area = %device.area(),
                name = %device.name(),
                channel = ?command.channel,
                value = %value,
                "Command received"
            );

            device
                .apply_external_command(command.channel, &value)?
                .into_updates(device.address())
        };

        let count = updates.len();
        self.queue.push_all(updates);
        Ok(count)
    }

    /// Routes a message, logging instead of returning failures.
    pub fn handle(&self, topic: &str, payload: &str) {
        match self.route(topic, payload) {
            Ok(_) => {}
            Err(Error::UnknownAddress(id)) => {
                tracing::warn!(topic = %topic, id = %id, "Command for unknown device dropped");
            }
            Err(e) => {
                tracing::error!(topic = %topic, payload = %payload, error = %e, "Command dropped");
            }
        }
    }
}

/// Decodes a command payload: JSON numbers and booleans keep their type,
/// anything else is taken as a string.
#[must_use]
pub fn decode_payload(payload: &str) -> Value {
    match serde_json::from_str::<Value>(payload) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(payload.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::classifier::{ClassifyOptions, classify};
    use crate::device::RawDevice;
    use crate::registry::DeviceRegistry;

    fn records() -> Vec<RawDevice> {
        let value = json!([
            {"addr": "388:1", "name": "Ceiling", "area": "Kitchen", "type": "dimmer-lamp",
             "status": {"state": "off", "level": 0}},
            {"addr": "392:1", "name": "Fan", "area": "Bath", "type": "lamp", "sub-type": "air-fan",
             "status": {"state": "on"}},
            {"addr": "392:2", "name": "Fan", "area": "Bath", "type": "lamp", "sub-type": "air-fan",
             "status": {"state": "off"}},
        ]);
        serde_json::from_value(value).unwrap()
    }

    fn router() -> (CommandRouter, CommandQueue) {
        let classification = classify(records(), &ClassifyOptions::new()).unwrap();
        let mut registry = DeviceRegistry::new();
        for device in classification.register {
            registry.add(device).unwrap();
        }
        let queue = CommandQueue::new();
        let router = CommandRouter::new("larnitech", registry.into_shared(), queue.clone());
        (router, queue)
    }

    #[test]
    fn payloads_are_decoded() {
        assert_eq!(decode_payload("42"), json!(42));
        assert_eq!(decode_payload("21.5"), json!(21.5));
        assert_eq!(decode_payload("true"), json!(true));
        assert_eq!(decode_payload("on"), json!("on"));
        assert_eq!(decode_payload("\"quoted\""), json!("\"quoted\""));
    }

    #[test]
    fn dimmer_level_command_is_queued() {
        let (router, queue) = router();
        assert_eq!(router.route("larnitech/388_1/level/set", "55").unwrap(), 1);

        let update = queue.pop().unwrap();
        assert_eq!(update.address, "388:1");
        assert_eq!(update.status["level"], json!(55));
    }

    #[test]
    fn fan_speed_command_queues_off_before_on() {
        let (router, queue) = router();
        assert_eq!(router.route("larnitech/392_1_392_2/speed/set", "2").unwrap(), 2);

        let first = queue.pop().unwrap();
        let second = queue.pop().unwrap();
        assert_eq!((first.address.as_str(), &first.status["state"]), ("392:1", &json!("off")));
        assert_eq!((second.address.as_str(), &second.status["state"]), ("392:2", &json!("on")));
    }

    #[test]
    fn unknown_device_is_a_lookup_miss() {
        let (router, queue) = router();
        let err = router.route("larnitech/999_1/set", "on").unwrap_err();
        assert!(matches!(err, Error::UnknownAddress(_)));
        router.handle("larnitech/999_1/set", "on");
        assert!(queue.is_empty());
    }

    #[test]
    fn foreign_topics_are_ignored() {
        let (router, queue) = router();
        assert_eq!(router.route("homeassistant/status", "online").unwrap(), 0);
        assert_eq!(router.route("larnitech/388_1/state", "on").unwrap(), 0);
        assert!(queue.is_empty());
    }
}
