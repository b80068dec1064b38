// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device model.
//!
//! A [`Device`] normalizes one hub record into a uniform entity. Everything
//! except the status is fixed at construction:
//!
//! - identity: address, name, area, vendor type and unrecognized fields
//! - [`DeviceKind`]: the per-kind translation rules
//! - [`Presentation`]: discovery metadata derived from the kind
//!
//! The status is only changed through [`Device::set_status`].
//!
//! # Examples
//!
//! ```
//! use larnitech_bridge::device::Device;
//! use serde_json::json;
//!
//! let mut lamp = Device::from_value(&json!({
//!     "addr": "388:1",
//!     "name": "Ceiling",
//!     "area": "Kitchen",
//!     "type": "dimmer-lamp",
//!     "status": {"state": "off", "level": 0},
//! }))?;
//!
//! lamp.set_status(
//!     json!({"state": "on", "level": 80}).as_object().unwrap().clone(),
//!     "388:1",
//! )?;
//!
//! let values = lamp.render_external();
//! assert_eq!(values["state_topic"], json!("on"));
//! assert_eq!(values["brightness_state_topic"], json!(80));
//! # Ok::<(), larnitech_bridge::ValidationError>(())
//! ```

mod composite;
pub mod kind;
pub mod presentation;
mod translate;

pub use kind::{CompositeKind, DeviceKind};
pub use presentation::{ChannelRole, EntityClass, Presentation};

use serde_json::{Map, Value};

use crate::error::{Error, ValidationError};

/// Vendor-shaped status of a single unit.
pub type StatusMap = Map<String, Value>;

/// A raw device record, as returned by the hub.
pub type RawDevice = Map<String, Value>;

/// Values to publish, keyed by state channel.
pub type Rendered = Map<String, Value>;

/// Record fields the device model reads itself.
const IDENTITY_FIELDS: &[&str] = &["addr", "name", "area", "type", "status"];

/// One unit of a composite device.
#[derive(Debug, Clone, PartialEq)]
pub struct Constituent {
    /// Hub address of the unit.
    pub address: String,
    /// Last known status of the unit.
    pub status: StatusMap,
}

/// Current state of a device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceStatus {
    /// Status of a single unit.
    Single(StatusMap),
    /// Status of every unit of a composite, in rank order.
    Composite(Vec<Constituent>),
}

/// A status change to send to the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Target hub address.
    pub address: String,
    /// Properties to set.
    pub status: StatusMap,
}

/// Result of translating a Home Assistant command.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// A status for the address the command was sent to.
    Single(StatusMap),
    /// Statuses for several units, in the order they must be applied.
    Many(Vec<StatusUpdate>),
}

impl Translation {
    /// Flattens into an ordered list of updates; `address` is the target of
    /// a [`Translation::Single`].
    #[must_use]
    pub fn into_updates(self, address: &str) -> Vec<StatusUpdate> {
        match self {
            Self::Single(status) => vec![StatusUpdate {
                address: address.to_string(),
                status,
            }],
            Self::Many(updates) => updates,
        }
    }
}

/// A hub device, possibly aggregating several units.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    address: String,
    name: String,
    area: String,
    type_tag: String,
    kind: DeviceKind,
    composite: Option<CompositeKind>,
    extra: Map<String, Value>,
    presentation: Presentation,
    status: DeviceStatus,
}

impl Device {
    /// Builds a device from a hub record.
    ///
    /// The kind is selected from the record's `sub-type` (when it is a known
    /// type name) or `type`. Fields the model does not read are kept in
    /// [`extra`](Self::extra).
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if `addr`, `name`, `area`, `type` or
    /// `status` is missing, or a field required by the kind is missing.
    pub fn from_record(record: &RawDevice) -> Result<Self, ValidationError> {
        let type_name = DeviceKind::effective_type(record)?;
        let kind = DeviceKind::resolve(type_name, record)?;

        let address = required_str(record, "addr")?;
        let name = required_str(record, "name")?;
        let area = required_str(record, "area")?;
        let type_tag = required_str(record, "type")?;
        let status = match record.get("status") {
            Some(Value::Object(status)) => status.clone(),
            Some(other) => {
                return Err(ValidationError::InvalidField {
                    field: "status",
                    message: format!("expected an object, got {other}"),
                });
            }
            None => return Err(ValidationError::MissingField("status")),
        };

        let consumed = kind.consumed_fields();
        let extra = record
            .iter()
            .filter(|(key, _)| {
                !IDENTITY_FIELDS.contains(&key.as_str()) && !consumed.contains(&key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let presentation = kind.presentation();

        Ok(Self {
            address,
            name,
            area,
            type_tag,
            kind,
            composite: None,
            extra,
            presentation,
            status: DeviceStatus::Single(status),
        })
    }

    /// Builds a device from a JSON value holding a hub record.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the value is not an object or the
    /// record is invalid.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let record = value.as_object().ok_or_else(|| ValidationError::InvalidField {
            field: "record",
            message: "expected an object".to_string(),
        })?;
        Self::from_record(record)
    }

    /// Returns the hub address (or joined member addresses for a composite).
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the area name as reported by the hub.
    #[must_use]
    pub fn area(&self) -> &str {
        &self.area
    }

    /// Returns the vendor `type` of the record.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Returns the vendor `sub-type`, if any.
    #[must_use]
    pub fn sub_type(&self) -> Option<&str> {
        self.extra.get("sub-type").and_then(Value::as_str)
    }

    /// Returns the kind of the device (of its members, for a composite).
    #[must_use]
    pub fn kind(&self) -> &DeviceKind {
        &self.kind
    }

    /// Returns the composite kind, if the device aggregates several units.
    #[must_use]
    pub fn composite_kind(&self) -> Option<CompositeKind> {
        self.composite
    }

    /// Returns `true` for composite devices.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.composite.is_some()
    }

    /// Returns record fields the model does not interpret.
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns the discovery metadata.
    #[must_use]
    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    /// Returns every hub address the device is made of.
    #[must_use]
    pub fn constituents(&self) -> Vec<&str> {
        match &self.status {
            DeviceStatus::Single(_) => vec![self.address.as_str()],
            DeviceStatus::Composite(members) => {
                members.iter().map(|m| m.address.as_str()).collect()
            }
        }
    }

    /// Applies a status reported by the hub.
    ///
    /// A single device replaces its status; a composite merges the properties
    /// into the member at `address`, leaving the other members untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ForeignAddress`] if `address` is not the
    /// device's own address (or one of its members').
    pub fn set_status(&mut self, status: StatusMap, address: &str) -> Result<(), ValidationError> {
        let foreign = || ValidationError::ForeignAddress {
            device: self.address.clone(),
            address: address.to_string(),
        };

        match &mut self.status {
            DeviceStatus::Single(current) => {
                if address != self.address {
                    return Err(foreign());
                }
                *current = status;
            }
            DeviceStatus::Composite(members) => {
                let member = members
                    .iter_mut()
                    .find(|m| m.address == address)
                    .ok_or_else(foreign)?;
                member.status.extend(status);
            }
        }

        Ok(())
    }

    /// Renders the values Home Assistant should see.
    ///
    /// Only channels derivable from the current status are present; every
    /// key is a state channel of the presentation.
    #[must_use]
    pub fn render_external(&self) -> Rendered {
        let values = match (&self.status, self.composite) {
            (DeviceStatus::Composite(members), Some(kind)) => {
                composite::render(kind, &self.presentation, members)
            }
            (DeviceStatus::Single(status), _) => {
                translate::render(&self.kind, &self.presentation, status)
            }
            (DeviceStatus::Composite(_), None) => Map::new(),
        };

        debug_assert!(
            values
                .keys()
                .all(|key| ChannelRole::of(key) == ChannelRole::State),
            "rendered a command channel: {values:?}"
        );

        values
    }

    /// Translates a command from Home Assistant into hub status updates.
    ///
    /// `channel` is the topic suffix the command arrived on (`None` for the
    /// bare command topic).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedChannel`] if the kind does not accept
    /// commands on `channel`.
    pub fn apply_external_command(
        &self,
        channel: Option<&str>,
        value: &Value,
    ) -> Result<Translation, Error> {
        match (&self.status, self.composite) {
            (DeviceStatus::Composite(members), Some(kind)) => {
                composite::apply(kind, &self.presentation, members, channel, value)
                    .map(Translation::Many)
            }
            _ => translate::apply(&self.kind, channel, value).map(Translation::Single),
        }
    }
}

/// Reads a string field, accepting numbers the hub sends for addresses.
pub(crate) fn required_str(record: &RawDevice, field: &'static str) -> Result<String, ValidationError> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ValidationError::InvalidField {
            field,
            message: format!("expected a string, got {other}"),
        }),
        None => Err(ValidationError::MissingField(field)),
    }
}
