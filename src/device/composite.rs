// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Composite devices: several sibling units exposed as one entity.
//!
//! # Multi-speed fan
//!
//! Each speed of the fan is a separate relay on the hub. Speeds are ranked by
//! member order, starting at 1, so member order must match the wiring.
//! Members are kept in discovery order unless an explicit order is configured
//! (see [`ClassifyOptions`](crate::classifier::ClassifyOptions)).

use serde_json::{Map, Value};

use crate::error::{Error, ValidationError};

use super::kind::CompositeKind;
use super::presentation::{Presentation, channel};
use super::{Constituent, Device, DeviceStatus, Rendered, StatusUpdate};

impl Device {
    /// Builds a composite from already-constructed member devices.
    ///
    /// The composite address is the member addresses joined with `:`; name,
    /// area and type come from the first member.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if there are fewer than two members, a
    /// member is not of the kind the composite wraps, or members disagree on
    /// area, type or `sub-type`.
    pub fn composite(kind: CompositeKind, members: Vec<Device>) -> Result<Self, ValidationError> {
        if members.len() < 2 {
            return Err(ValidationError::TooFewMembers(members.len()));
        }

        let first = &members[0];
        for member in &members {
            let mismatch = if member.kind.type_name() != kind.member_type() || member.is_composite() {
                Some("kind")
            } else if member.area != first.area {
                Some("area")
            } else if member.type_tag != first.type_tag {
                Some("type")
            } else if member.sub_type() != first.sub_type() {
                Some("sub-type")
            } else {
                None
            };

            if let Some(field) = mismatch {
                return Err(ValidationError::MemberMismatch {
                    address: member.address.clone(),
                    field,
                });
            }
        }

        let mut extra = Map::new();
        if let Some(sub_type) = first.extra.get("sub-type") {
            extra.insert("sub-type".to_string(), sub_type.clone());
        }

        let name = first.name.clone();
        let area = first.area.clone();
        let type_tag = first.type_tag.clone();
        let member_kind = first.kind.clone();
        let presentation = kind.presentation(members.len());

        let constituents: Vec<Constituent> = members
            .into_iter()
            .map(|member| Constituent {
                address: member.address,
                status: match member.status {
                    DeviceStatus::Single(status) => status,
                    DeviceStatus::Composite(_) => Map::new(),
                },
            })
            .collect();

        let address = constituents
            .iter()
            .map(|c| c.address.as_str())
            .collect::<Vec<_>>()
            .join(":");

        Ok(Self {
            address,
            name,
            area,
            type_tag,
            kind: member_kind,
            composite: Some(kind),
            extra,
            presentation,
            status: DeviceStatus::Composite(constituents),
        })
    }
}

pub(super) fn render(kind: CompositeKind, p: &Presentation, members: &[Constituent]) -> Rendered {
    match kind {
        CompositeKind::MultiSpeedFan => render_multi_speed(p, members),
    }
}

pub(super) fn apply(
    kind: CompositeKind,
    p: &Presentation,
    members: &[Constituent],
    channel: Option<&str>,
    value: &Value,
) -> Result<Vec<StatusUpdate>, Error> {
    match kind {
        CompositeKind::MultiSpeedFan => apply_multi_speed(p, members, channel, value)
            .ok_or_else(|| Error::UnsupportedChannel {
                kind: kind.member_type(),
                channel: channel.map(str::to_string),
            }),
    }
}

/// Returns the 1-based rank of the first member that is on.
fn active_speed(p: &Presentation, members: &[Constituent]) -> Option<usize> {
    let on = p.payload_on();
    members
        .iter()
        .position(|member| member.status.get("state").and_then(Value::as_str) == Some(on))
        .map(|index| index + 1)
}

fn render_multi_speed(p: &Presentation, members: &[Constituent]) -> Rendered {
    let speed = active_speed(p, members);
    let state = if speed.is_some() {
        p.payload_on()
    } else {
        p.payload_off()
    };

    let mut values = Map::new();
    values.insert(channel::STATE.to_string(), Value::from(state));
    values.insert(channel::PERCENTAGE_STATE.to_string(), Value::from(speed.unwrap_or(0)));
    values
}

fn apply_multi_speed(
    p: &Presentation,
    members: &[Constituent],
    channel: Option<&str>,
    value: &Value,
) -> Option<Vec<StatusUpdate>> {
    let selected = match channel? {
        "state" if value.as_str() == Some(p.payload_on()) => p
            .field("speed_range_min")
            .and_then(Value::as_u64)
            .unwrap_or(1),
        "state" => 0,
        "speed" => parse_speed(value)?,
        _ => return None,
    };

    let (on, off) = (p.payload_on(), p.payload_off());

    let mut updates: Vec<StatusUpdate> = members
        .iter()
        .zip(1u64..)
        .map(|(member, speed)| {
            let mut status = member.status.clone();
            let state = if speed == selected { on } else { off };
            status.insert("state".to_string(), Value::from(state));
            StatusUpdate {
                address: member.address.clone(),
                status,
            }
        })
        .collect();

    // Every relay must be released before the next one engages: with two
    // speeds on at once the motor windings are shorted.
    updates.sort_by_key(|update| update.status.get("state").and_then(Value::as_str) != Some(off));

    Some(updates)
}

fn parse_speed(value: &Value) -> Option<u64> {
    let speed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if speed.is_finite() && speed >= 0.0 {
        // Truncation is intended: speeds are small positive integers.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(speed.round() as u64)
    } else {
        None
    }
}
