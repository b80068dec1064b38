// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Larnitech Bridge - expose Larnitech hub devices to Home Assistant.
//!
//! The bridge keeps one WebSocket session with the hub and one MQTT
//! connection with the broker Home Assistant listens to:
//!
//! ```text
//!            statuses event                      state topics
//!   Hub  ──────────────────►  Session  ──────────────────────►  MQTT
//!        ◄──────────────────     ▲                               │
//!            status-set          │ CommandQueue                  │ command topics
//!                                └──────── CommandRouter ◄───────┘
//! ```
//!
//! # Supported Devices
//!
//! - Temperature, humidity, motion and leak sensors
//! - Lamps, dimmable lamps and scripts
//! - Valves and heating valves (as thermostats)
//! - Air fans; several air fans in one area become one multi-speed fan
//! - Anything else is exposed as a plain sensor
//!
//! # Quick Start
//!
//! ```no_run
//! use larnitech_bridge::bridge::{Session, SessionOptions};
//! use larnitech_bridge::protocol::{MqttTransport, WsConnection};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> larnitech_bridge::Result<()> {
//!     let mqtt = MqttTransport::builder().host("192.168.1.50").build().await?;
//!     let hub = WsConnection::connect("ws://192.168.1.10:8080/api").await?;
//!
//!     let mut session = Session::new(SessionOptions::new("api-key"), hub, mqtt.clone());
//!     let router = session.router();
//!     mqtt.set_message_handler(move |topic: &str, payload: &str| router.handle(topic, payload));
//!
//!     session.run(CancellationToken::new()).await
//! }
//! ```
//!
//! # Device Model
//!
//! ```
//! use larnitech_bridge::{ClassifyOptions, DeviceRegistry, classify};
//! use serde_json::json;
//!
//! let records = serde_json::from_value(json!([
//!     {"addr": "392:1", "name": "Fan", "area": "Bath", "type": "lamp",
//!      "sub-type": "air-fan", "status": {"state": "on"}},
//!     {"addr": "392:2", "name": "Fan", "area": "Bath", "type": "lamp",
//!      "sub-type": "air-fan", "status": {"state": "off"}},
//! ]))
//! .unwrap();
//!
//! let classification = classify(records, &ClassifyOptions::new())?;
//! let mut registry = DeviceRegistry::new();
//! for device in classification.register {
//!     registry.add(device)?;
//! }
//!
//! let fan = registry.resolve("392:2").unwrap();
//! assert_eq!(fan.address(), "392:1:392:2");
//! assert_eq!(fan.render_external()["percentage_state_topic"], json!(1));
//! # Ok::<(), larnitech_bridge::ValidationError>(())
//! ```

pub mod bridge;
pub mod classifier;
pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod topic;

pub use bridge::{CommandQueue, CommandRouter, Session, SessionOptions, SessionState};
pub use classifier::{Classification, ClassifyOptions, classify};
pub use config::BridgeConfig;
pub use device::{
    CompositeKind, Device, DeviceKind, DeviceStatus, EntityClass, Presentation, StatusUpdate,
    Translation,
};
pub use error::{ConfigError, Error, ProtocolError, Result, ValidationError};
pub use protocol::{HubConnection, HubMessage, HubRequest, Publisher};
pub use registry::{DeviceRegistry, SharedRegistry};
