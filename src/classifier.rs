// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Partitioning of the hub's device list.
//!
//! [`classify`] turns the raw records returned by `get-devices` into the
//! devices to register and the records to ignore. Units of a kind that has a
//! composite wrapper are grouped per area: two or more siblings become one
//! composite device, a lone unit stays a plain device.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::device::{CompositeKind, Device, DeviceKind, RawDevice, required_str};
use crate::error::ValidationError;

/// Exclusion filters and grouping options.
#[derive(Debug, Clone, Default)]
pub struct ClassifyOptions {
    /// Addresses to ignore.
    pub ignored_addrs: HashSet<String>,
    /// Effective type names to ignore.
    pub ignored_types: HashSet<String>,
    /// Areas to ignore, compared case-insensitively.
    pub ignored_areas: HashSet<String>,
    /// Explicit composite member order. Listed addresses come first, in list
    /// order; unlisted members follow in discovery order.
    pub constituent_order: Vec<String>,
}

impl ClassifyOptions {
    /// Creates options that keep every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignores the given addresses.
    #[must_use]
    pub fn ignore_addrs<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_addrs.extend(addrs.into_iter().map(Into::into));
        self
    }

    /// Ignores the given type names.
    #[must_use]
    pub fn ignore_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Ignores the given areas.
    #[must_use]
    pub fn ignore_areas<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_areas
            .extend(areas.into_iter().map(|a| a.into().to_lowercase()));
        self
    }

    /// Sets the explicit composite member order.
    #[must_use]
    pub fn constituent_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constituent_order = order.into_iter().map(Into::into).collect();
        self
    }

    fn is_ignored(&self, record: &RawDevice) -> Result<bool, ValidationError> {
        let type_name = DeviceKind::effective_type(record)?;
        let addr = required_str(record, "addr").unwrap_or_default();
        let area = record
            .get("area")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();

        Ok(self.ignored_types.contains(type_name)
            || self.ignored_addrs.contains(&addr)
            || self.ignored_areas.iter().any(|a| a.to_lowercase() == area))
    }

    fn order_members(&self, members: &mut [Device]) {
        if self.constituent_order.is_empty() {
            return;
        }
        let rank = |device: &Device| {
            self.constituent_order
                .iter()
                .position(|addr| addr == device.address())
                .unwrap_or(usize::MAX)
        };
        members.sort_by_key(rank);
    }
}

/// Result of [`classify`].
#[derive(Debug, Default)]
pub struct Classification {
    /// Devices to register, in discovery order of their first unit.
    pub register: Vec<Device>,
    /// Records excluded by the filters.
    pub ignore: Vec<RawDevice>,
}

impl Classification {
    /// Number of hub units the registered devices cover.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.register.iter().map(|d| d.constituents().len()).sum()
    }
}

enum Slot {
    Plain(Device),
    Group(CompositeKind, String),
}

/// Splits hub records into devices to register and records to ignore.
///
/// Every input record ends up either in [`Classification::ignore`] or as (a
/// part of) exactly one device in [`Classification::register`].
///
/// # Errors
///
/// Returns a [`ValidationError`] if a kept record is malformed or two kept
/// records share an address.
pub fn classify(
    records: Vec<RawDevice>,
    options: &ClassifyOptions,
) -> Result<Classification, ValidationError> {
    let mut classification = Classification::default();
    let mut seen = HashSet::new();
    let mut slots = Vec::new();
    let mut groups: HashMap<(CompositeKind, String), Vec<Device>> = HashMap::new();

    for record in records {
        if options.is_ignored(&record)? {
            tracing::debug!(
                address = ?record.get("addr"),
                kind = ?record.get("type"),
                "Ignoring device"
            );
            classification.ignore.push(record);
            continue;
        }

        let device = Device::from_record(&record)?;
        if !seen.insert(device.address().to_string()) {
            return Err(ValidationError::DuplicateAddress(device.address().to_string()));
        }

        match CompositeKind::wrapping(device.kind()) {
            Some(wrapper) => {
                let key = (wrapper, device.area().to_string());
                let members = groups.entry(key.clone()).or_default();
                if members.is_empty() {
                    slots.push(Slot::Group(key.0, key.1));
                }
                members.push(device);
            }
            None => slots.push(Slot::Plain(device)),
        }
    }

    for slot in slots {
        match slot {
            Slot::Plain(device) => classification.register.push(device),
            Slot::Group(wrapper, area) => {
                let mut members = groups.remove(&(wrapper, area)).unwrap_or_default();
                if members.len() == 1 {
                    classification.register.extend(members);
                } else {
                    options.order_members(&mut members);
                    classification
                        .register
                        .push(Device::composite(wrapper, members)?);
                }
            }
        }
    }

    Ok(classification)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(addr: &str, area: &str, kind: &str, sub_type: Option<&str>) -> RawDevice {
        let mut value = json!({
            "addr": addr,
            "name": format!("Device {addr}"),
            "area": area,
            "type": kind,
            "status": {"state": "off"},
        });
        if let Some(sub_type) = sub_type {
            value["sub-type"] = json!(sub_type);
        }
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn fan(addr: &str, area: &str) -> RawDevice {
        record(addr, area, "lamp", Some("air-fan"))
    }

    fn addresses(classification: &Classification) -> Vec<&str> {
        classification.register.iter().map(Device::address).collect()
    }

    #[test]
    fn partition_is_complete() {
        let records = vec![
            record("1:1", "Kitchen", "lamp", None),
            record("1:2", "Garage", "lamp", None),
            record("1:3", "Kitchen", "script", None),
            record("1:4", "Kitchen", "temperature-sensor", None),
            fan("2:1", "Bathroom"),
            fan("2:2", "Bathroom"),
            fan("2:3", "Hall"),
        ];
        let total = records.len();
        let options = ClassifyOptions::new()
            .ignore_areas(["garage"])
            .ignore_types(["script"]);

        let classification = classify(records, &options).unwrap();
        assert_eq!(classification.ignore.len(), 2);
        assert_eq!(
            classification.unit_count() + classification.ignore.len(),
            total
        );
    }

    #[test]
    fn siblings_become_composite_lone_unit_stays_plain() {
        let records = vec![
            fan("2:1", "Bathroom"),
            record("1:1", "Kitchen", "lamp", None),
            fan("2:2", "Bathroom"),
            fan("2:3", "Hall"),
        ];
        let classification = classify(records, &ClassifyOptions::new()).unwrap();

        assert_eq!(addresses(&classification), vec!["2:1:2:2", "1:1", "2:3"]);
        assert!(classification.register[0].is_composite());
        assert!(!classification.register[2].is_composite());
    }

    #[test]
    fn area_filter_is_case_insensitive() {
        let records = vec![record("1:1", "Garage", "lamp", None)];
        let options = ClassifyOptions::new().ignore_areas(["GARAGE"]);
        let classification = classify(records, &options).unwrap();
        assert!(classification.register.is_empty());
        assert_eq!(classification.ignore.len(), 1);
    }

    #[test]
    fn type_filter_uses_effective_type() {
        let records = vec![fan("2:1", "Bathroom"), record("1:1", "Kitchen", "lamp", None)];
        let options = ClassifyOptions::new().ignore_types(["air-fan"]);
        let classification = classify(records, &options).unwrap();
        assert_eq!(addresses(&classification), vec!["1:1"]);
    }

    #[test]
    fn address_filter() {
        let records = vec![record("1:1", "Kitchen", "lamp", None)];
        let options = ClassifyOptions::new().ignore_addrs(["1:1"]);
        assert!(classify(records, &options).unwrap().register.is_empty());
    }

    #[test]
    fn address_filter_matches_numeric_addresses() {
        let mut numeric = record("1:1", "Kitchen", "lamp", None);
        numeric.insert("addr".to_string(), json!(17));
        let records = vec![numeric, record("1:2", "Kitchen", "lamp", None)];

        let options = ClassifyOptions::new().ignore_addrs(["17"]);
        let classification = classify(records, &options).unwrap();
        assert_eq!(addresses(&classification), vec!["1:2"]);
        assert_eq!(classification.ignore.len(), 1);
    }

    #[test]
    fn duplicate_address_is_an_error() {
        let records = vec![
            record("1:1", "Kitchen", "lamp", None),
            record("1:1", "Hall", "lamp", None),
        ];
        let err = classify(records, &ClassifyOptions::new()).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateAddress("1:1".to_string()));
    }

    #[test]
    fn malformed_record_is_an_error() {
        let mut bad = record("1:1", "Kitchen", "lamp", None);
        bad.remove("name");
        assert!(classify(vec![bad], &ClassifyOptions::new()).is_err());
    }

    #[test]
    fn unknown_type_is_registered_as_generic() {
        let records = vec![record("9:1", "Attic", "co2-sensor", None)];
        let classification = classify(records, &ClassifyOptions::new()).unwrap();
        assert_eq!(classification.register[0].kind(), &DeviceKind::Generic);
    }

    #[test]
    fn explicit_order_overrides_discovery_order() {
        let records = vec![
            fan("2:1", "Bathroom"),
            fan("2:2", "Bathroom"),
            fan("2:3", "Bathroom"),
        ];
        let options = ClassifyOptions::new().constituent_order(["2:3", "2:1"]);
        let classification = classify(records, &options).unwrap();
        assert_eq!(
            classification.register[0].constituents(),
            vec!["2:3", "2:1", "2:2"]
        );
    }
}
