// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub API messages.
//!
//! Every frame is a JSON object. Requests name themselves with a `request`
//! key, responses echo the request name in `response`, and unsolicited
//! notifications carry an `event` key:
//!
//! ```text
//! → {"request": "status-subscribe", "addr": ["388:1", "392:1"]}
//! ← {"response": "status-subscribe", "found": 2, "subscribed": 2, "devices": [...]}
//! ← {"event": "statuses", "devices": [{"addr": "388:1", "status": {"state": "on"}}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::{RawDevice, StatusMap, StatusUpdate};
use crate::error::ProtocolError;

/// Request names.
pub mod request {
    /// Authenticate with the API key.
    pub const AUTHORIZE: &str = "authorize";
    /// List every device with its status.
    pub const GET_DEVICES: &str = "get-devices";
    /// Subscribe to status changes.
    pub const STATUS_SUBSCRIBE: &str = "status-subscribe";
    /// Change the status of a device.
    pub const STATUS_SET: &str = "status-set";
}

/// Event name of status notifications.
pub const STATUSES_EVENT: &str = "statuses";

/// A request sent to the hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "request", rename_all = "kebab-case")]
pub enum HubRequest {
    /// `authorize`
    Authorize {
        /// The API key.
        key: String,
    },
    /// `get-devices`
    GetDevices {
        /// Level of status detail; the bridge always asks for `detailed`.
        status: String,
    },
    /// `status-subscribe`
    StatusSubscribe {
        /// Addresses to watch.
        addr: Vec<String>,
    },
    /// `status-set`
    StatusSet {
        /// Target address.
        addr: String,
        /// Properties to set.
        status: StatusMap,
    },
}

impl HubRequest {
    /// Builds an `authorize` request.
    #[must_use]
    pub fn authorize(key: impl Into<String>) -> Self {
        Self::Authorize { key: key.into() }
    }

    /// Builds a `get-devices` request asking for detailed statuses.
    #[must_use]
    pub fn get_devices() -> Self {
        Self::GetDevices {
            status: "detailed".to_string(),
        }
    }

    /// Builds a `status-subscribe` request.
    #[must_use]
    pub fn status_subscribe(addr: Vec<String>) -> Self {
        Self::StatusSubscribe { addr }
    }

    /// Returns the request name, which is also the name of its response.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authorize { .. } => request::AUTHORIZE,
            Self::GetDevices { .. } => request::GET_DEVICES,
            Self::StatusSubscribe { .. } => request::STATUS_SUBSCRIBE,
            Self::StatusSet { .. } => request::STATUS_SET,
        }
    }

    /// Returns the target address of a `status-set` request.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::StatusSet { addr, .. } => Some(addr),
            _ => None,
        }
    }

    /// Serializes the request to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

impl From<StatusUpdate> for HubRequest {
    fn from(update: StatusUpdate) -> Self {
        Self::StatusSet {
            addr: update.address,
            status: update.status,
        }
    }
}

/// A frame received from the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Reply to a request, named after it.
    Response {
        /// Request name.
        name: String,
        /// Whole frame.
        body: Map<String, Value>,
    },
    /// Unsolicited notification.
    Event {
        /// Event name.
        name: String,
        /// Whole frame.
        body: Map<String, Value>,
    },
    /// Anything else.
    Unknown(Value),
}

impl HubMessage {
    /// Classifies a decoded frame.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(body) = value else {
            return Self::Unknown(value);
        };

        let response = body.get("response").and_then(Value::as_str).map(str::to_string);
        let event = body.get("event").and_then(Value::as_str).map(str::to_string);

        match (response, event) {
            (Some(name), _) => Self::Response { name, body },
            (None, Some(name)) => Self::Event { name, body },
            (None, None) => Self::Unknown(Value::Object(body)),
        }
    }

    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the frame is not valid JSON.
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        Ok(Self::from_value(serde_json::from_str(frame)?))
    }

    /// Returns the response name, if this is a response.
    #[must_use]
    pub fn response_name(&self) -> Option<&str> {
        match self {
            Self::Response { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Decodes the body of a response to `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedResponse`] if the message is not
    /// the response to `request`, or [`ProtocolError::Json`] if its body does
    /// not have the expected shape.
    pub fn into_response<T>(self, request: &'static str) -> Result<T, ProtocolError>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self {
            Self::Response { name, body } if name == request => {
                Ok(serde_json::from_value(Value::Object(body))?)
            }
            other => Err(ProtocolError::UnexpectedResponse {
                expected: request,
                actual: other.describe(),
            }),
        }
    }

    /// Short human-readable form for logs and errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Response { name, .. } => format!("response {name}"),
            Self::Event { name, .. } => format!("event {name}"),
            Self::Unknown(value) => value.to_string(),
        }
    }
}

/// Response to `authorize`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeResponse {
    /// `success` when the key was accepted.
    pub result: String,
}

impl AuthorizeResponse {
    /// Returns `true` if the key was accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == "success"
    }
}

/// Response to `get-devices`.
#[derive(Debug, Clone, Deserialize)]
pub struct DevicesResponse {
    /// Raw device records.
    pub devices: Vec<RawDevice>,
    /// Number of devices the hub knows about.
    #[serde(default)]
    pub found: Option<usize>,
}

/// Response to `status-subscribe`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeResponse {
    /// Number of requested addresses the hub knows.
    pub found: usize,
    /// Number of addresses now watched.
    pub subscribed: usize,
}

/// One entry of a `status-set` response.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSetResult {
    /// Target address.
    pub addr: String,
    /// Whether the hub applied the status.
    #[serde(default)]
    pub success: bool,
    /// Remaining fields, kept for logging.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Response to `status-set`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSetResponse {
    /// Per-address results.
    #[serde(default)]
    pub devices: Vec<StatusSetResult>,
}

/// One entry of a `statuses` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEntry {
    /// Reporting address.
    pub addr: String,
    /// New status properties.
    pub status: StatusMap,
}

/// A `statuses` event.
///
/// Entries are kept raw so that one malformed entry does not hide the others;
/// decode them with [`entries`](Self::entries).
#[derive(Debug, Clone, Deserialize)]
pub struct StatusesEvent {
    /// Changed devices.
    pub devices: Vec<Value>,
}

impl StatusesEvent {
    /// Decodes a `statuses` event body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the body does not have the expected
    /// shape.
    pub fn from_body(body: Map<String, Value>) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_value(Value::Object(body))?)
    }

    /// Decodes every entry on its own, pairing failures with the raw entry.
    pub fn entries(self) -> impl Iterator<Item = Result<StatusEntry, (Value, ProtocolError)>> {
        self.devices.into_iter().map(|raw| {
            StatusEntry::deserialize(&raw).map_err(move |e| (raw, ProtocolError::Json(e)))
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn requests_are_tagged_by_name() {
        let value = serde_json::to_value(HubRequest::authorize("secret")).unwrap();
        assert_eq!(value, json!({"request": "authorize", "key": "secret"}));

        let value = serde_json::to_value(HubRequest::get_devices()).unwrap();
        assert_eq!(value, json!({"request": "get-devices", "status": "detailed"}));

        let value =
            serde_json::to_value(HubRequest::status_subscribe(vec!["1:1".to_string()])).unwrap();
        assert_eq!(value, json!({"request": "status-subscribe", "addr": ["1:1"]}));
    }

    #[test]
    fn status_set_from_update() {
        let update = StatusUpdate {
            address: "388:1".to_string(),
            status: json!({"state": "on"}).as_object().unwrap().clone(),
        };
        let request = HubRequest::from(update);
        assert_eq!(request.name(), "status-set");
        assert_eq!(request.address(), Some("388:1"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"request": "status-set", "addr": "388:1", "status": {"state": "on"}})
        );
    }

    #[test]
    fn frames_are_classified() {
        let msg = HubMessage::parse(r#"{"response": "authorize", "result": "success"}"#).unwrap();
        assert_eq!(msg.response_name(), Some("authorize"));

        let msg = HubMessage::parse(r#"{"event": "statuses", "devices": []}"#).unwrap();
        assert!(matches!(msg, HubMessage::Event { ref name, .. } if name == "statuses"));

        let msg = HubMessage::parse(r#"{"hello": 1}"#).unwrap();
        assert!(matches!(msg, HubMessage::Unknown(_)));

        assert!(HubMessage::parse("not json").is_err());
    }

    #[test]
    fn response_is_correlated_by_name() {
        let msg = HubMessage::from_value(json!({"response": "status-subscribe", "found": 5, "subscribed": 4}));
        let response: SubscribeResponse = msg.into_response(request::STATUS_SUBSCRIBE).unwrap();
        assert_eq!((response.found, response.subscribed), (5, 4));

        let msg = HubMessage::from_value(json!({"event": "statuses", "devices": []}));
        let err = msg.into_response::<AuthorizeResponse>(request::AUTHORIZE).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedResponse { expected: "authorize", .. }));
    }

    #[test]
    fn statuses_entries_decode_independently() {
        let event = StatusesEvent::from_body(
            json!({"devices": [
                {"addr": "388:1", "status": {"state": "on"}},
                {"addr": "388:2", "status": "on"},
                {"addr": "388:3"},
            ]})
            .as_object()
            .unwrap()
            .clone(),
        )
        .unwrap();

        let entries: Vec<_> = event.entries().collect();
        assert_eq!(entries.len(), 3);
        let first = entries[0].as_ref().unwrap();
        assert_eq!(first.addr, "388:1");
        assert_eq!(first.status["state"], json!("on"));

        let (raw, err) = entries[1].as_ref().unwrap_err();
        assert_eq!(raw["addr"], json!("388:2"));
        assert!(matches!(err, ProtocolError::Json(_)));
        assert!(entries[2].is_err());
    }

    #[test]
    fn status_set_results_keep_details() {
        let msg = HubMessage::from_value(json!({
            "response": "status-set",
            "devices": [{"addr": "388:1", "success": false, "error": "busy"}],
        }));
        let response: StatusSetResponse = msg.into_response(request::STATUS_SET).unwrap();
        assert!(!response.devices[0].success);
        assert_eq!(response.devices[0].details["error"], json!("busy"));
    }
}
