// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT topic layout used by the bridge.
//!
//! Every device gets a topic namespace derived from its hub address:
//!
//! ```text
//! <prefix>/<address id>/<suffix>/state   value published by the bridge
//! <prefix>/<address id>/<suffix>/set     command sent by Home Assistant
//! ```
//!
//! When a channel has an empty suffix the middle segment is omitted, e.g.
//! `larnitech/388_1/set`.

/// Operation segment of a state topic.
pub const STATE_OP: &str = "state";

/// Operation segment of a command topic.
pub const COMMAND_OP: &str = "set";

/// Turns an arbitrary label into a topic/id-safe token.
///
/// # Examples
///
/// ```
/// use larnitech_bridge::topic::to_id;
///
/// assert_eq!(to_id("388:1"), "388_1");
/// assert_eq!(to_id("Living Room"), "living_room");
/// assert_eq!(to_id("air-fan"), "air_fan");
/// ```
#[must_use]
pub fn to_id(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' | ':' => '_',
            c => c,
        })
        .collect()
}

/// Builds `<prefix>/<suffix>/<op>`, or `<prefix>/<op>` when `suffix` is empty.
#[must_use]
pub fn build(prefix: &str, suffix: &str, op: &str) -> String {
    if suffix.is_empty() {
        format!("{prefix}/{op}")
    } else {
        format!("{prefix}/{suffix}/{op}")
    }
}

/// Topic namespace of a single device.
#[must_use]
pub fn device_prefix(bridge_prefix: &str, address: &str) -> String {
    format!("{bridge_prefix}/{}", to_id(address))
}

/// A parsed inbound command topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTopic<'a> {
    /// The address id segment, e.g. `388_1`.
    pub address_id: &'a str,
    /// The channel suffix, if the command targets a named channel.
    pub channel: Option<&'a str>,
}

impl<'a> CommandTopic<'a> {
    /// Parses `<prefix>/<address id>[/<channel>]/set`.
    ///
    /// Returns `None` for topics outside the bridge namespace or without the
    /// command marker.
    #[must_use]
    pub fn parse(bridge_prefix: &str, topic: &'a str) -> Option<Self> {
        let rest = topic
            .strip_prefix(bridge_prefix)?
            .strip_prefix('/')?
            .strip_suffix(COMMAND_OP)?
            .strip_suffix('/')?;

        let mut parts = rest.split('/');
        let address_id = parts.next().filter(|id| !id.is_empty())?;
        let channel = parts.next();

        Some(Self {
            address_id,
            channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_with_and_without_suffix() {
        assert_eq!(build("larnitech/388_1", "level", "set"), "larnitech/388_1/level/set");
        assert_eq!(build("larnitech/388_1", "", "state"), "larnitech/388_1/state");
    }

    #[test]
    fn device_prefix_uses_address_id() {
        assert_eq!(device_prefix("larnitech", "388:1:388:2"), "larnitech/388_1_388_2");
    }

    #[test]
    fn parse_command_with_channel() {
        let parsed = CommandTopic::parse("larnitech", "larnitech/388_1/speed/set").unwrap();
        assert_eq!(parsed.address_id, "388_1");
        assert_eq!(parsed.channel, Some("speed"));
    }

    #[test]
    fn parse_command_without_channel() {
        let parsed = CommandTopic::parse("larnitech", "larnitech/388_1/set").unwrap();
        assert_eq!(parsed.address_id, "388_1");
        assert_eq!(parsed.channel, None);
    }

    #[test]
    fn parse_rejects_foreign_topics() {
        assert!(CommandTopic::parse("larnitech", "other/388_1/set").is_none());
        assert!(CommandTopic::parse("larnitech", "larnitech/388_1/state").is_none());
        assert!(CommandTopic::parse("larnitech", "larnitechx/388_1/set").is_none());
        assert!(CommandTopic::parse("larnitech", "larnitech/set").is_none());
    }
}
