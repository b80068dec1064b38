// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transports used by the bridge.
//!
//! The session talks to two peers through two traits:
//!
//! - [`HubConnection`]: the duplex JSON connection to the hub. The session is
//!   its only reader and only writer.
//! - [`Publisher`]: the pub/sub client used to reach Home Assistant.
//!
//! # Implementations
//!
//! - [`WsConnection`]: WebSocket hub connection (feature `ws`)
//! - [`MqttTransport`]: MQTT publisher (feature `mqtt`)

pub mod message;
#[cfg(feature = "mqtt")]
mod mqtt;
#[cfg(feature = "ws")]
mod websocket;

pub use message::{HubMessage, HubRequest};
#[cfg(feature = "mqtt")]
pub use mqtt::{MessageHandler, MqttTransport, MqttTransportBuilder};
#[cfg(feature = "ws")]
pub use websocket::WsConnection;

use crate::error::ProtocolError;

/// Duplex connection to the hub.
#[allow(async_fn_in_trait)]
pub trait HubConnection {
    /// Sends one request frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the frame cannot be written.
    async fn send(&mut self, request: &HubRequest) -> Result<(), ProtocolError>;

    /// Waits for the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ConnectionClosed`] when the hub closes the
    /// connection, or another `ProtocolError` if the frame cannot be read or
    /// decoded.
    async fn recv(&mut self) -> Result<HubMessage, ProtocolError>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the close handshake fails.
    async fn close(&mut self) -> Result<(), ProtocolError>;
}

/// Pub/sub client towards Home Assistant.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Subscribes to a command topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the subscription cannot be sent.
    async fn subscribe(&self, topic: &str) -> Result<(), ProtocolError>;

    /// Publishes a payload.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message cannot be sent.
    async fn publish(&self, topic: &str, payload: String, retain: bool)
    -> Result<(), ProtocolError>;

    /// Releases the client.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the disconnect cannot be sent.
    async fn disconnect(&self) -> Result<(), ProtocolError>;
}
