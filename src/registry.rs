// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of live devices.
//!
//! The [`DeviceRegistry`] owns every registered [`Device`] and resolves hub
//! addresses to them:
//!
//! ```text
//! "392:2" ──alias──► "392:1:392:2:392:3" ──primary──► Device (multi-speed fan)
//! "388:1" ─────────────────────────────────primary──► Device (lamp)
//! ```
//!
//! Entries are added once after discovery and never removed during a session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::device::Device;
use crate::error::ValidationError;
use crate::topic;

/// A registry shared between the session and the command router.
pub type SharedRegistry = Arc<RwLock<DeviceRegistry>>;

/// Address-indexed set of devices.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    /// Devices in insertion order.
    devices: Vec<Device>,
    /// Primary address to position in `devices`.
    primary: HashMap<String, usize>,
    /// Constituent address to the owning composite's primary address.
    alias: HashMap<String, String>,
    /// Topic id of every primary and constituent address to the primary address.
    topic_ids: HashMap<String, String>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the registry for sharing.
    #[must_use]
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Registers a device.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateAddress`] if the device's address,
    /// or one of its constituents, is already registered. The registry is left
    /// unchanged in that case.
    pub fn add(&mut self, device: Device) -> Result<(), ValidationError> {
        let primary = device.address().to_string();

        if self.resolve(&primary).is_some() {
            return Err(ValidationError::DuplicateAddress(primary));
        }
        for constituent in device.constituents() {
            if self.resolve(constituent).is_some() {
                return Err(ValidationError::DuplicateAddress(constituent.to_string()));
            }
        }

        if device.is_composite() {
            for constituent in device.constituents() {
                self.alias.insert(constituent.to_string(), primary.clone());
                self.topic_ids
                    .insert(topic::to_id(constituent), primary.clone());
            }
        }
        self.topic_ids.insert(topic::to_id(&primary), primary.clone());

        tracing::debug!(address = %primary, name = %device.name(), "Registering device");
        self.primary.insert(primary, self.devices.len());
        self.devices.push(device);

        Ok(())
    }

    fn position(&self, address: &str) -> Option<usize> {
        let primary = self.alias.get(address).map_or(address, String::as_str);
        self.primary.get(primary).copied()
    }

    /// Resolves a primary or constituent address to its device.
    #[must_use]
    pub fn resolve(&self, address: &str) -> Option<&Device> {
        self.position(address).map(|index| &self.devices[index])
    }

    /// Mutable variant of [`resolve`](Self::resolve).
    pub fn resolve_mut(&mut self, address: &str) -> Option<&mut Device> {
        self.position(address).map(|index| &mut self.devices[index])
    }

    /// Resolves the address id segment of a topic to its device.
    ///
    /// Ids are lossy (`388:1` and `388 1` share an id), so the index built at
    /// registration is consulted first; failing that, `_` is read back as `:`.
    #[must_use]
    pub fn resolve_topic_id(&self, id: &str) -> Option<&Device> {
        match self.topic_ids.get(id) {
            Some(primary) => self.resolve(primary),
            None => self.resolve(&id.replace('_', ":")),
        }
    }

    /// Iterates over devices in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Returns the number of registered devices (a composite counts once).
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no device is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Returns every hub address backing a registered device, in insertion
    /// order.
    #[must_use]
    pub fn constituent_addresses(&self) -> Vec<String> {
        self.devices
            .iter()
            .flat_map(Device::constituents)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::device::CompositeKind;

    fn device(addr: &str, sub_type: &str) -> Device {
        Device::from_value(&json!({
            "addr": addr,
            "name": "Fan",
            "area": "Bathroom",
            "type": "lamp",
            "sub-type": sub_type,
            "status": {"state": "off"},
        }))
        .unwrap()
    }

    fn fan() -> Device {
        Device::composite(
            CompositeKind::MultiSpeedFan,
            vec![device("392:1", "air-fan"), device("392:2", "air-fan")],
        )
        .unwrap()
    }

    #[test]
    fn alias_resolves_to_owning_composite() {
        let mut registry = DeviceRegistry::new();
        registry.add(fan()).unwrap();

        let by_primary = registry.resolve("392:1:392:2").unwrap();
        let by_alias = registry.resolve("392:2").unwrap();
        assert!(std::ptr::eq(by_primary, by_alias));
        assert!(registry.resolve("392:3").is_none());
    }

    #[test]
    fn plain_device_resolves_by_address() {
        let mut registry = DeviceRegistry::new();
        registry.add(device("388:1", "")).unwrap();
        assert_eq!(registry.resolve("388:1").unwrap().address(), "388:1");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = DeviceRegistry::new();
        registry.add(fan()).unwrap();

        let err = registry.add(device("392:2", "")).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateAddress("392:2".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let mut registry = DeviceRegistry::new();
        for addr in ["5:1", "3:1", "4:1"] {
            registry.add(device(addr, "")).unwrap();
        }
        let order: Vec<_> = registry.iter().map(Device::address).collect();
        assert_eq!(order, vec!["5:1", "3:1", "4:1"]);
    }

    #[test]
    fn topic_ids_resolve() {
        let mut registry = DeviceRegistry::new();
        registry.add(fan()).unwrap();
        registry.add(device("388:1", "")).unwrap();

        assert_eq!(
            registry.resolve_topic_id("392_1_392_2").unwrap().address(),
            "392:1:392:2"
        );
        assert_eq!(registry.resolve_topic_id("388_1").unwrap().address(), "388:1");
        assert!(registry.resolve_topic_id("999_1").is_none());
    }

    #[test]
    fn constituent_addresses_flatten_composites() {
        let mut registry = DeviceRegistry::new();
        registry.add(device("388:1", "")).unwrap();
        registry.add(fan()).unwrap();
        assert_eq!(
            registry.constituent_addresses(),
            vec!["388:1", "392:1", "392:2"]
        );
    }
}
