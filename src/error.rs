// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the bridge.
//!
//! The hierarchy mirrors how failures are handled at runtime:
//!
//! - [`ValidationError`]: a malformed device record or an inconsistent
//!   composite group. Raised while building devices.
//! - [`ProtocolError`]: a failure of the hub session or of one of the
//!   transports. Fatal to the running session.
//! - [`ConfigError`]: the configuration could not be loaded or is incomplete.
//!
//! Lookup misses and unexpected messages are not errors: they are logged and
//! dropped by the session.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A device record or group failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The hub session or a transport failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The configuration is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// No registered device owns the given address.
    #[error("unknown device address: {0}")]
    UnknownAddress(String),

    /// A device received a command on a channel its kind does not handle.
    #[error("{kind} does not accept commands on channel {channel:?}")]
    UnsupportedChannel {
        /// The vendor type name of the device.
        kind: &'static str,
        /// The channel the command was addressed to.
        channel: Option<String>,
    },
}

/// Errors raised while turning vendor records into devices.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent from the record.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape.
    #[error("invalid field {field}: {message}")]
    InvalidField {
        /// The offending field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A status update targeted an address the device does not own.
    #[error("address {address} does not belong to device {device}")]
    ForeignAddress {
        /// The device that received the update.
        device: String,
        /// The address carried by the update.
        address: String,
    },

    /// A composite was requested with fewer than two members.
    #[error("a composite device needs at least 2 members, got {0}")]
    TooFewMembers(usize),

    /// Composite members disagree on a field that must be shared.
    #[error("composite member {address} differs on {field}")]
    MemberMismatch {
        /// The member that does not match the first one.
        address: String,
        /// The field that differs.
        field: &'static str,
    },

    /// Two devices in the same discovery result claim the same address.
    #[error("duplicate device address: {0}")]
    DuplicateAddress(String),
}

/// Errors related to the hub session and the transports.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client failure.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// WebSocket failure.
    #[cfg(feature = "ws")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// A peer address is missing or malformed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Connecting to a peer failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The hub closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The hub rejected the API key.
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    /// A correlated request got a response for another request.
    #[error("expected response to {expected}, got {actual}")]
    UnexpectedResponse {
        /// The request that was sent.
        expected: &'static str,
        /// What came back instead.
        actual: String,
    },

    /// The hub did not subscribe to every requested address.
    #[error("subscribed to {subscribed} of {requested} addresses ({found} found)")]
    SubscriptionMismatch {
        /// Number of addresses sent in the request.
        requested: usize,
        /// Number of addresses the hub found.
        found: usize,
        /// Number of addresses the hub subscribed to.
        subscribed: usize,
    },

    /// A frame could not be decoded or encoded as JSON.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors related to loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required setting is missing or empty.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = ValidationError::MissingField("addr");
        assert_eq!(err.to_string(), "missing required field: addr");
    }

    #[test]
    fn error_from_validation_error() {
        let err: Error = ValidationError::TooFewMembers(1).into();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::TooFewMembers(1))
        ));
    }

    #[test]
    fn subscription_mismatch_display() {
        let err = ProtocolError::SubscriptionMismatch {
            requested: 5,
            found: 5,
            subscribed: 4,
        };
        assert_eq!(err.to_string(), "subscribed to 4 of 5 addresses (5 found)");
    }

    #[test]
    fn unsupported_channel_display() {
        let err = Error::UnsupportedChannel {
            kind: "valve-heating",
            channel: Some("speed".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "valve-heating does not accept commands on channel Some(\"speed\")"
        );
    }
}
